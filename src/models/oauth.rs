//! OAuth Models
//!
//! Provider identifiers, normalized federated profiles, and the DTOs for
//! provider API payloads.

use serde::{Deserialize, Serialize};

/// Supported OAuth providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A federated identity normalized across providers
///
/// This is the only shape the account resolver sees; provider-specific
/// payload quirks stay in the OAuth service.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub provider: OAuthProvider,
    pub is_verified: bool,
}

/// Google userinfo endpoint payload
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// GitHub authenticated-user payload
///
/// `email` is frequently null (private emails), in which case the email
/// list endpoint is consulted.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One entry of GitHub's /user/emails list
#[derive(Debug, Clone, Deserialize)]
pub struct GithubEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

/// Query parameters delivered to the provider callback endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!(OAuthProvider::Google.as_str(), "google");
        assert_eq!(OAuthProvider::Github.as_str(), "github");
    }

    #[test]
    fn test_github_user_with_null_email() {
        let user: GithubUser = serde_json::from_str(
            r#"{"login": "octocat", "name": "The Octocat", "email": null, "avatar_url": "https://example.com/a.png"}"#,
        )
        .unwrap();

        assert_eq!(user.login, "octocat");
        assert!(user.email.is_none());
    }

    #[test]
    fn test_github_email_list_entry() {
        let emails: Vec<GithubEmail> = serde_json::from_str(
            r#"[{"email": "octo@example.com", "primary": true, "verified": true},
                {"email": "alt@example.com", "primary": false, "verified": false}]"#,
        )
        .unwrap();

        assert_eq!(emails.len(), 2);
        assert!(emails[0].primary);
        assert_eq!(emails[0].email, "octo@example.com");
    }
}

//! OAuth Service
//!
//! Google and GitHub federated login: authorization-code exchange,
//! profile fetch, mapping of federated identities onto local accounts,
//! and the one-time-code bridge that hands tokens to the frontend after
//! a provider callback.

use std::sync::Arc;
use std::time::Duration;

use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client as HttpClient;

use crate::config::OAuthConfig;
use crate::models::oauth::{GithubEmail, GithubUser, GoogleUserInfo};
use crate::models::{Account, NewAccount, OAuthProfile, OAuthProvider};
use crate::service::login_exchange::{LoginExchangeCache, LoginGrant};
use crate::service::session::SessionService;
use crate::storage::AccountStore;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::normalize_email;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

/// OAuth login service for the supported providers
pub struct OAuthService {
    accounts: Arc<dyn AccountStore>,
    sessions: SessionService,
    exchange: Arc<LoginExchangeCache>,
    http: HttpClient,
    google: Option<BasicClient>,
    github: Option<BasicClient>,
    frontend_redirect_url: String,
}

impl OAuthService {
    pub fn new(
        config: &OAuthConfig,
        accounts: Arc<dyn AccountStore>,
        sessions: SessionService,
        exchange: Arc<LoginExchangeCache>,
    ) -> AppResult<Self> {
        let google = match (&config.google_client_id, &config.google_client_secret) {
            (Some(id), Some(secret)) => Some(build_client(
                id,
                secret,
                GOOGLE_AUTH_URL,
                GOOGLE_TOKEN_URL,
                config.google_redirect_uri.as_deref(),
            )?),
            _ => None,
        };
        let github = match (&config.github_client_id, &config.github_client_secret) {
            (Some(id), Some(secret)) => Some(build_client(
                id,
                secret,
                GITHUB_AUTH_URL,
                GITHUB_TOKEN_URL,
                config.github_redirect_uri.as_deref(),
            )?),
            _ => None,
        };

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            accounts,
            sessions,
            exchange,
            http,
            google,
            github,
            frontend_redirect_url: config.frontend_redirect_url.clone(),
        })
    }

    fn client(&self, provider: OAuthProvider) -> AppResult<&BasicClient> {
        let client = match provider {
            OAuthProvider::Google => self.google.as_ref(),
            OAuthProvider::Github => self.github.as_ref(),
        };
        client.ok_or_else(|| {
            AppError::BadRequest(format!("{} login is not configured", provider))
        })
    }

    /// Build the provider authorization URL the client is redirected to
    pub fn authorize_url(&self, provider: OAuthProvider) -> AppResult<String> {
        let client = self.client(provider)?;
        let request = client.authorize_url(CsrfToken::new_random);
        let (url, _csrf) = match provider {
            OAuthProvider::Google => request
                .add_scope(Scope::new("email".to_string()))
                .add_scope(Scope::new("profile".to_string()))
                .url(),
            OAuthProvider::Github => request
                .add_scope(Scope::new("user:email".to_string()))
                .url(),
        };
        Ok(url.to_string())
    }

    /// Complete a provider callback: exchange the authorization code,
    /// fetch the profile, resolve the local account, and park the issued
    /// tokens under a one-time login code
    ///
    /// Returns the frontend redirect URL carrying that code.
    pub async fn handle_callback(
        &self,
        provider: OAuthProvider,
        code: String,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> AppResult<String> {
        let client = self.client(provider)?;
        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                log::debug!("{} code exchange failed: {}", provider, e);
                AppError::BadRequest("Invalid authorization code".to_string())
            })?;
        let access_token = token.access_token().secret();

        let profile = match provider {
            OAuthProvider::Google => self.fetch_google_profile(access_token).await?,
            OAuthProvider::Github => self.fetch_github_profile(access_token).await?,
        };

        let account = self.resolve(profile).await?;
        let tokens = self
            .sessions
            .issue_token_pair(&account, user_agent, ip_address)
            .await?;
        let login_code = self.exchange.stash(account, tokens);

        let separator = if self.frontend_redirect_url.contains('?') {
            '&'
        } else {
            '?'
        };
        Ok(format!(
            "{}{}code={}",
            self.frontend_redirect_url, separator, login_code
        ))
    }

    /// Trade a one-time login code for the parked account and tokens
    pub fn exchange_code(&self, code: &str) -> AppResult<LoginGrant> {
        self.exchange
            .take(code)
            .ok_or_else(|| AppError::BadRequest("Invalid or expired login code".to_string()))
    }

    /// Map a federated identity onto a local account
    ///
    /// Lookup is by canonical email, so the same address arriving from
    /// two providers collapses to one account. An existing account is
    /// returned as-is; otherwise a verified, passwordless account is
    /// created.
    pub async fn resolve(&self, profile: OAuthProfile) -> AppResult<Account> {
        let email = normalize_email(&profile.email);

        if let Some(existing) = self.accounts.find_by_email(&email).await? {
            return Ok(existing);
        }

        self.accounts
            .create(NewAccount {
                full_name: profile.display_name,
                email,
                phone: None,
                password_hash: None,
                is_verified: true,
                verification_token: None,
                provider: Some(profile.provider.as_str().to_string()),
                last_login_at: Some(chrono::Utc::now()),
            })
            .await
    }

    async fn fetch_google_profile(&self, access_token: &str) -> AppResult<OAuthProfile> {
        let info: GoogleUserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Google userinfo request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Internal(format!("Google userinfo request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Google userinfo payload invalid: {}", e)))?;

        Ok(OAuthProfile {
            display_name: info.name.unwrap_or_else(|| info.email.clone()),
            email: info.email,
            avatar_url: info.picture,
            provider: OAuthProvider::Google,
            is_verified: info.verified_email,
        })
    }

    async fn fetch_github_profile(&self, access_token: &str) -> AppResult<OAuthProfile> {
        let user: GithubUser = self
            .http
            .get(GITHUB_USER_URL)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, "auth-service")
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("GitHub user request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Internal(format!("GitHub user request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("GitHub user payload invalid: {}", e)))?;

        // Profiles with a private email need the email list endpoint
        let email = match user.email {
            Some(email) => email,
            None => {
                let emails: Vec<GithubEmail> = self
                    .http
                    .get(GITHUB_EMAILS_URL)
                    .bearer_auth(access_token)
                    .header(reqwest::header::USER_AGENT, "auth-service")
                    .send()
                    .await
                    .map_err(|e| {
                        AppError::Internal(format!("GitHub emails request failed: {}", e))
                    })?
                    .error_for_status()
                    .map_err(|e| {
                        AppError::Internal(format!("GitHub emails request failed: {}", e))
                    })?
                    .json()
                    .await
                    .map_err(|e| {
                        AppError::Internal(format!("GitHub emails payload invalid: {}", e))
                    })?;

                pick_github_email(emails).ok_or_else(|| {
                    AppError::BadRequest(
                        "Unable to obtain an email address from GitHub".to_string(),
                    )
                })?
            }
        };

        Ok(OAuthProfile {
            display_name: user.name.unwrap_or(user.login),
            email,
            avatar_url: user.avatar_url,
            provider: OAuthProvider::Github,
            is_verified: true,
        })
    }
}

fn build_client(
    client_id: &str,
    client_secret: &str,
    auth_url: &str,
    token_url: &str,
    redirect_uri: Option<&str>,
) -> AppResult<BasicClient> {
    let mut client = BasicClient::new(
        ClientId::new(client_id.to_string()),
        Some(ClientSecret::new(client_secret.to_string())),
        AuthUrl::new(auth_url.to_string())
            .map_err(|e| AppError::Internal(format!("Invalid auth URL: {}", e)))?,
        Some(
            TokenUrl::new(token_url.to_string())
                .map_err(|e| AppError::Internal(format!("Invalid token URL: {}", e)))?,
        ),
    );
    if let Some(redirect_uri) = redirect_uri {
        client = client.set_redirect_uri(
            RedirectUrl::new(redirect_uri.to_string())
                .map_err(|e| AppError::Internal(format!("Invalid redirect URI: {}", e)))?,
        );
    }
    Ok(client)
}

/// Select the primary email from GitHub's list, falling back to the
/// first entry
fn pick_github_email(emails: Vec<GithubEmail>) -> Option<String> {
    emails
        .iter()
        .find(|e| e.primary)
        .or_else(|| emails.first())
        .map(|e| e.email.clone())
}

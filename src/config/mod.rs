//! Configuration Module
//!
//! Centralized configuration for the service: server, database, JWT,
//! lockout policy, email, and OAuth settings. Loaded from the
//! environment at process start and immutable thereafter.

use crate::utils::error::{AppError, AppResult};

/// Environment variable helpers
pub mod env {
    use std::env;

    /// Get environment variable as string with default
    pub fn get_string(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get environment variable as boolean with default
    pub fn get_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u16 with default
    pub fn get_u16(key: &str, default: u16) -> u16 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u32 with default
    pub fn get_u32(key: &str, default: u32) -> u32 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as i64 with default
    pub fn get_i64(key: &str, default: i64) -> i64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u64 with default
    pub fn get_u64(key: &str, default: u64) -> u64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// Application configuration combining all service configurations
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub email: Option<EmailConfig>,
    pub oauth: Option<OAuthConfig>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// JWT and session configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Symmetric signing secret for access tokens
    pub secret: String,

    /// Application name, used as both issuer and audience
    pub app_name: String,

    /// Access token lifetime in minutes
    pub access_token_minutes: i64,

    /// Refresh token lifetime in days
    pub refresh_token_days: i64,
}

/// Password and lockout policy configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// bcrypt cost factor for password hashing
    pub bcrypt_cost: u32,

    /// Failed attempts before an account locks
    pub max_failed_attempts: u32,

    /// Lock duration in minutes
    pub lockout_minutes: i64,

    /// Lifetime of the one-time OAuth login-exchange codes, in seconds
    pub login_code_ttl_seconds: i64,
}

/// Email service configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
}

/// OAuth configuration for the supported providers
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_uri: Option<String>,
    pub github_client_id: Option<String>,
    pub github_client_secret: Option<String>,
    pub github_redirect_uri: Option<String>,

    /// Frontend URL that receives the one-time login code after a
    /// provider callback
    pub frontend_redirect_url: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal("JWT_SECRET must be set".to_string()))?;

        let email = if std::env::var("SMTP_HOST").is_ok() {
            Some(EmailConfig {
                smtp_host: env::get_string("SMTP_HOST", "localhost"),
                smtp_port: env::get_u16("SMTP_PORT", 587),
                smtp_username: env::get_string("SMTP_USERNAME", ""),
                smtp_password: env::get_string("SMTP_PASSWORD", ""),
                from_email: env::get_string("FROM_EMAIL", "no-reply@localhost"),
                from_name: env::get_string("FROM_NAME", "Auth Service"),
            })
        } else {
            None
        };

        let oauth = if std::env::var("GOOGLE_CLIENT_ID").is_ok()
            || std::env::var("GITHUB_CLIENT_ID").is_ok()
        {
            Some(OAuthConfig {
                google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
                google_client_secret: std::env::var("GOOGLE_CLIENT_SECRET").ok(),
                google_redirect_uri: std::env::var("GOOGLE_REDIRECT_URI").ok(),
                github_client_id: std::env::var("GITHUB_CLIENT_ID").ok(),
                github_client_secret: std::env::var("GITHUB_CLIENT_SECRET").ok(),
                github_redirect_uri: std::env::var("GITHUB_REDIRECT_URI").ok(),
                frontend_redirect_url: env::get_string(
                    "FRONTEND_REDIRECT_URL",
                    "http://localhost:3000/auth/callback",
                ),
            })
        } else {
            None
        };

        Ok(Self {
            server: ServerConfig {
                host: env::get_string("SERVER_HOST", "0.0.0.0"),
                port: env::get_u16("SERVER_PORT", 8080),
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                app_name: env::get_string("APP_NAME", "auth-service"),
                access_token_minutes: env::get_i64("ACCESS_TOKEN_MINUTES", 15),
                refresh_token_days: env::get_i64("REFRESH_TOKEN_DAYS", 30),
            },
            security: SecurityConfig {
                bcrypt_cost: env::get_u32(
                    "BCRYPT_COST",
                    crate::utils::crypto::DEFAULT_BCRYPT_COST,
                ),
                max_failed_attempts: env::get_u32("MAX_FAILED_ATTEMPTS", 5),
                lockout_minutes: env::get_i64("LOCKOUT_MINUTES", 30),
                login_code_ttl_seconds: env::get_i64("LOGIN_CODE_TTL_SECONDS", 60),
            },
            email,
            oauth,
        })
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> AppResult<()> {
        if self.jwt.secret.len() < 32 {
            return Err(AppError::Internal(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }
        if self.jwt.access_token_minutes <= 0 || self.jwt.refresh_token_days <= 0 {
            return Err(AppError::Internal(
                "Token lifetimes must be positive".to_string(),
            ));
        }
        if self.security.max_failed_attempts == 0 {
            return Err(AppError::Internal(
                "MAX_FAILED_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if !(4..=31).contains(&self.security.bcrypt_cost) {
            return Err(AppError::Internal(
                "BCRYPT_COST must be between 4 and 31".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            jwt: JwtConfig {
                secret: "0123456789abcdef0123456789abcdef".to_string(),
                app_name: "auth-service".to_string(),
                access_token_minutes: 15,
                refresh_token_days: 30,
            },
            security: SecurityConfig {
                bcrypt_cost: 10,
                max_failed_attempts: 5,
                lockout_minutes: 30,
                login_code_ttl_seconds: 60,
            },
            email: None,
            oauth: None,
        }
    }

    #[test]
    fn test_validate_accepts_sane_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = test_config();
        config.jwt.secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = test_config();
        config.security.max_failed_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_bcrypt_cost() {
        let mut config = test_config();
        config.security.bcrypt_cost = 2;
        assert!(config.validate().is_err());
    }
}

//! Request and Response Models
//!
//! Data structures for API request and response payloads with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::account::AccountProfile;
use crate::models::auth::TokenPair;
use crate::utils::validation::{email_validator, name_validator, phone_validator, url_validator};

/// Request payload for registering a new account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Account holder's full name (1-255 characters)
    #[validate(custom(function = "name_validator"))]
    pub full_name: String,

    /// Email address (must be unique and valid format)
    #[validate(custom(function = "email_validator"))]
    pub email: String,

    /// Optional phone number in E.164-like format
    #[validate(custom(function = "phone_validator"))]
    pub phone: Option<String>,

    /// Password (8-128 characters)
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: String,

    /// Frontend URL embedded in the verification email link
    #[validate(custom(function = "url_validator"))]
    pub redirect_url: Option<String>,
}

/// Request payload for confirming an email address
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    /// Plaintext verification token from the email link
    #[validate(length(min = 1, message = "Verification token cannot be empty"))]
    pub token: String,
}

/// Request payload for password login
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = "email_validator"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,
}

/// Request payload for requesting a password-reset email
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(custom(function = "email_validator"))]
    pub email: String,

    /// Frontend URL embedded in the reset email link
    #[validate(custom(function = "url_validator"))]
    pub redirect_url: Option<String>,
}

/// Request payload for resetting a password with a token
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    /// Plaintext reset token from the email link
    #[validate(length(min = 1, message = "Reset token cannot be empty"))]
    pub token: String,

    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub new_password: String,
}

/// Request payload for updating profile fields
///
/// All fields are optional; an empty update is a no-op success.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(custom(function = "name_validator"))]
    pub full_name: Option<String>,

    /// New email address; staged as pending until confirmed
    #[validate(custom(function = "email_validator"))]
    pub email: Option<String>,

    #[validate(custom(function = "phone_validator"))]
    pub phone: Option<String>,

    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: Option<String>,

    /// Frontend URL embedded in the email-change verification link
    #[validate(custom(function = "url_validator"))]
    pub redirect_url: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.password.is_none()
    }
}

/// Query parameters for the login-code exchange endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeCodeRequest {
    pub code: String,
}

/// Response carrying an authenticated account and its token pair
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: AccountProfile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

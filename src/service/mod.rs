//! Business logic: authentication flows, sessions, tokens, OAuth, email

pub mod auth;
pub mod email;
pub mod login_exchange;
pub mod oauth;
pub mod session;
pub mod token;

pub use auth::{AuthService, LoginOutcome};
pub use email::{EmailSender, Mailer, SmtpSender};
pub use login_exchange::{LoginExchangeCache, LoginGrant};
pub use oauth::OAuthService;
pub use session::SessionService;
pub use token::TokenCodec;

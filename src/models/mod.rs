//! Data models and request/response structures

pub mod account;
pub mod auth;
pub mod oauth;
pub mod requests;
pub mod session;
pub mod verification;

pub use account::{Account, AccountPatch, AccountProfile, Lockout, NewAccount, Patch};
pub use auth::{AccessTokenClaims, CurrentUser, TokenPair};
pub use oauth::{OAuthProfile, OAuthProvider};
pub use session::{NewSession, Session};

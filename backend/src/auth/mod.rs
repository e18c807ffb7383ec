//! Bearer-token authentication.
//!
//! This module provides:
//! - `TokenVerifier` with a local JWT implementation and one that asks the
//!   identity provider
//! - `require_auth` middleware that puts the caller's [`AuthUser`] into the
//!   request extensions

use async_trait::async_trait;
use thiserror::Error;

mod jwt;
mod middleware;
mod remote;
pub mod types;

pub use jwt::{create_token, JwtVerifier};
pub use middleware::require_auth;
pub use remote::RemoteVerifier;
pub use types::{AuthUser, Claims};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The identity provider refused the token with its own message
    #[error("{0}")]
    Rejected(String),

    #[error("Authentication failed")]
    Unavailable(String),
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;
}

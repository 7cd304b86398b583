//! Domain service for authentication.
//!
//! Handles credential login, refresh-token exchange, and resolving a bearer
//! access token into the request's [`Caller`].

use thiserror::Error;

use crate::domain::Caller;
use crate::services::tokens::{TokenError, TokenPair};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    #[error("User is inactive")]
    InactiveUser,

    #[error("Token is invalid or expired")]
    InvalidToken(#[from] TokenError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials, records the login time and issues a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for a wrong password, an
    /// unknown email or an inactive account.
    async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError>;

    /// Exchanges a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError>;

    /// Resolves an access token to the calling user and their capabilities.
    async fn authenticate(&self, access_token: &str) -> Result<Caller, AuthError>;
}

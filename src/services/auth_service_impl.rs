//! `SeaORM` implementation of the `AuthService` trait.

use crate::db::Store;
use crate::domain::Caller;
use crate::services::auth_service::{AuthError, AuthService};
use crate::services::tokens::{TokenCodec, TokenPair, TokenType};
use async_trait::async_trait;

pub struct SeaOrmAuthService {
    store: Store,
    tokens: TokenCodec,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, tokens: TokenCodec) -> Self {
        Self { store, tokens }
    }

    async fn active_user(&self, user_id: i32) -> Result<crate::db::User, AuthError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }

        Ok(user)
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = self
            .store
            .verify_user_password(email, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        self.store.record_login(user.id, chrono::Utc::now()).await?;

        let pair = self.tokens.issue_pair(user.id, &user.email)?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok(pair)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.tokens.decode(refresh_token, TokenType::Refresh)?;
        let user = self.active_user(claims.sub).await?;

        Ok(self.tokens.issue(user.id, &user.email, TokenType::Access)?)
    }

    async fn authenticate(&self, access_token: &str) -> Result<Caller, AuthError> {
        let claims = self.tokens.decode(access_token, TokenType::Access)?;
        let user = self.active_user(claims.sub).await?;
        let is_moderator = self.store.is_moderator(user.id).await?;

        Ok(Caller {
            user_id: user.id,
            is_moderator,
        })
    }
}

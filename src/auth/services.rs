use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        claims::Subject,
        dto::{LoginResponse, MessageResponse, PublicUser, TokenPair},
        jwt::TokenIssuer,
        password::PasswordHasher,
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    error::AuthError,
    state::AppState,
};

pub const LOGOUT_MESSAGE: &str = "Выход выполнен успешно";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Login, refresh-token rotation and logout over a per-user session slot.
///
/// A user either has no session (`refresh_token_hash` is `None`) or exactly
/// one, identified by the hash of its live refresh token. Login overwrites
/// the slot, refresh rotates it with a compare-and-set, logout clears it.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.hasher.clone(), state.tokens.clone())
    }
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, hasher: PasswordHasher, tokens: TokenIssuer) -> Self {
        Self {
            users,
            hasher,
            tokens,
        }
    }

    pub async fn register(
        &self,
        email: String,
        password: String,
        name: Option<String>,
    ) -> Result<User, AuthError> {
        let password_hash = self.hasher.hash_async(password).await?;
        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                name,
            })
            .await?;
        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let ok = self
            .hasher
            .verify_async(password.to_string(), user.password_hash.clone())
            .await?;
        if !ok {
            warn!(user_id = user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let subject = Subject {
            user_id: user.id,
            email: user.email.clone(),
        };
        let (pair, refresh_hash) = self.mint(&subject).await?;
        self.users
            .set_refresh_token_hash(user.id, Some(&refresh_hash))
            .await?;

        info!(user_id = user.id, "user logged in");
        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: PublicUser {
                id: user.id,
                email: user.email,
            },
        })
    }

    /// `presented` must already have passed refresh-token verification; this
    /// checks it against the stored slot and rotates it.
    pub async fn refresh_tokens(
        &self,
        user_id: i64,
        presented: &str,
    ) -> Result<TokenPair, AuthError> {
        let user = self.users.find_by_id(user_id).await?;
        let Some((user, stored)) =
            user.and_then(|u| u.refresh_token_hash.clone().map(|h| (u, h)))
        else {
            warn!(user_id, "refresh without active session");
            return Err(AuthError::Unauthorized);
        };

        let matches = self
            .hasher
            .verify_async(presented.to_string(), stored.clone())
            .await?;
        if !matches {
            warn!(user_id, "refresh token does not match session");
            return Err(AuthError::Unauthorized);
        }

        let subject = Subject {
            user_id: user.id,
            email: user.email,
        };
        let (pair, refresh_hash) = self.mint(&subject).await?;

        // Lost race with a concurrent refresh or logout.
        if !self
            .users
            .swap_refresh_token_hash(user.id, &stored, &refresh_hash)
            .await?
        {
            warn!(user_id, "refresh token slot changed during rotation");
            return Err(AuthError::Unauthorized);
        }

        info!(user_id, "tokens refreshed");
        Ok(pair)
    }

    pub async fn logout(&self, user_id: i64) -> Result<MessageResponse, AuthError> {
        self.users.set_refresh_token_hash(user_id, None).await?;
        info!(user_id, "user logged out");
        Ok(MessageResponse {
            message: LOGOUT_MESSAGE.to_string(),
        })
    }

    async fn mint(&self, subject: &Subject) -> Result<(TokenPair, String), AuthError> {
        let access_token = self.tokens.issue_access(subject)?;
        let refresh_token = self.tokens.issue_refresh(subject)?;
        let refresh_hash = self.hasher.hash_async(refresh_token.clone()).await?;
        Ok((
            TokenPair {
                access_token,
                refresh_token,
            },
            refresh_hash,
        ))
    }
}

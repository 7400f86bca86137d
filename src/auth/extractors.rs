use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::{
    auth::{claims::Subject, jwt::{TokenIssuer, TokenKeys}},
    error::{AppError, AuthError},
};

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            warn!("missing Authorization header");
            AuthError::Unauthorized
        })?;

    match header.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => {
            warn!("invalid auth scheme");
            Err(AuthError::Unauthorized)
        }
    }
}

/// Verifies the bearer token against one key set.
fn verify_bearer<'a>(parts: &'a Parts, keys: &TokenKeys) -> Result<(Subject, &'a str), AuthError> {
    let token = bearer_token(parts)?;
    let claims = keys.verify(token).map_err(|e| {
        warn!(kind = ?keys.kind(), "invalid or expired token");
        e
    })?;
    Ok((claims.subject(), token))
}

/// Caller authenticated by an access token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Subject);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenIssuer: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let issuer = TokenIssuer::from_ref(state);
        let (subject, _) = verify_bearer(parts, issuer.access())?;
        Ok(AuthUser(subject))
    }
}

/// Caller presenting a refresh token. Carries the raw token so the session
/// slot can be checked; this guard does not look at storage.
#[derive(Debug, Clone)]
pub struct RefreshUser {
    pub subject: Subject,
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for RefreshUser
where
    S: Send + Sync,
    TokenIssuer: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let issuer = TokenIssuer::from_ref(state);
        let (subject, token) = verify_bearer(parts, issuer.refresh())?;
        Ok(RefreshUser {
            subject,
            token: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::test_issuer;
    use axum::http::Request;

    fn parts(auth: Option<&str>) -> Parts {
        let mut req = Request::builder().uri("/");
        if let Some(v) = auth {
            req = req.header(AUTHORIZATION, v);
        }
        req.body(()).unwrap().into_parts().0
    }

    fn subject() -> Subject {
        Subject {
            user_id: 7,
            email: "g@x.com".into(),
        }
    }

    #[tokio::test]
    async fn access_guard_accepts_access_token() {
        let issuer = test_issuer();
        let token = issuer.issue_access(&subject()).unwrap();
        let mut p = parts(Some(&format!("Bearer {token}")));
        let AuthUser(s) = AuthUser::from_request_parts(&mut p, &issuer).await.unwrap();
        assert_eq!(s, subject());
    }

    #[tokio::test]
    async fn access_guard_rejects_refresh_token() {
        let issuer = test_issuer();
        let token = issuer.issue_refresh(&subject()).unwrap();
        let mut p = parts(Some(&format!("Bearer {token}")));
        assert!(AuthUser::from_request_parts(&mut p, &issuer).await.is_err());
    }

    #[tokio::test]
    async fn refresh_guard_keeps_raw_token() {
        let issuer = test_issuer();
        let token = issuer.issue_refresh(&subject()).unwrap();
        let mut p = parts(Some(&format!("bearer {token}")));
        let user = RefreshUser::from_request_parts(&mut p, &issuer).await.unwrap();
        assert_eq!(user.token, token);
        assert_eq!(user.subject, subject());
    }

    #[tokio::test]
    async fn missing_or_malformed_header() {
        let issuer = test_issuer();
        for header in [None, Some("Basic abc"), Some("Bearer"), Some("Bearer   ")] {
            let mut p = parts(header);
            let err = RefreshUser::from_request_parts(&mut p, &issuer).await.unwrap_err();
            assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
        }
    }
}

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::claims::{Claims, Subject, TokenKind},
    config::JwtConfig,
    error::AuthError,
    state::AppState,
};

/// Signing and verification material for one kind of token.
///
/// Access and refresh tokens are two instances of this type, each with its
/// own secret and lifetime, so a token only ever verifies against the keys
/// that minted it.
#[derive(Clone)]
pub struct TokenKeys {
    kind: TokenKind,
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(kind: TokenKind, secret: &str, ttl: Duration, issuer: &str, audience: &str) -> Self {
        Self {
            kind,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn sign(&self, subject: &Subject) -> anyhow::Result<String> {
        self.sign_at(subject, OffsetDateTime::now_utc())
    }

    fn sign_at(&self, subject: &Subject, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now + self.ttl;
        let claims = Claims {
            sub: subject.user_id,
            email: subject.email.clone(),
            iat: now.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: self.kind,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = subject.user_id, kind = ?self.kind, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, kind = ?self.kind, "jwt rejected");
            AuthError::InvalidToken
        })?;

        if data.claims.kind != self.kind {
            warn!(expected = ?self.kind, got = ?data.claims.kind, "jwt kind mismatch");
            return Err(AuthError::InvalidToken);
        }
        debug!(user_id = data.claims.sub, kind = ?self.kind, "jwt verified");
        Ok(data.claims)
    }
}

/// Mints and checks both token kinds.
#[derive(Clone)]
pub struct TokenIssuer {
    access: TokenKeys,
    refresh: TokenKeys,
}

impl TokenIssuer {
    pub fn new(access: TokenKeys, refresh: TokenKeys) -> Self {
        Self { access, refresh }
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access: TokenKeys::new(
                TokenKind::Access,
                &cfg.access_secret,
                Duration::minutes(cfg.access_ttl_minutes),
                &cfg.issuer,
                &cfg.audience,
            ),
            refresh: TokenKeys::new(
                TokenKind::Refresh,
                &cfg.refresh_secret,
                Duration::minutes(cfg.refresh_ttl_minutes),
                &cfg.issuer,
                &cfg.audience,
            ),
        }
    }

    pub fn access(&self) -> &TokenKeys {
        &self.access
    }

    pub fn refresh(&self) -> &TokenKeys {
        &self.refresh
    }

    pub fn issue_access(&self, subject: &Subject) -> anyhow::Result<String> {
        self.access.sign(subject)
    }

    pub fn issue_refresh(&self, subject: &Subject) -> anyhow::Result<String> {
        self.refresh.sign(subject)
    }

    pub fn verify_access(&self, token: &str) -> Result<Subject, AuthError> {
        self.access.verify(token).map(|c| c.subject())
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Subject, AuthError> {
        self.refresh.verify(token).map(|c| c.subject())
    }
}

impl FromRef<AppState> for TokenIssuer {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

#[cfg(test)]
pub(crate) fn test_issuer() -> TokenIssuer {
    TokenIssuer::new(
        TokenKeys::new(TokenKind::Access, "access-secret", Duration::minutes(5), "iss", "aud"),
        TokenKeys::new(TokenKind::Refresh, "refresh-secret", Duration::minutes(60), "iss", "aud"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> Subject {
        Subject {
            user_id: 42,
            email: "a@x.com".into(),
        }
    }

    #[test]
    fn access_round_trip() {
        let issuer = test_issuer();
        let token = issuer.issue_access(&subject()).expect("sign access");
        assert_eq!(issuer.verify_access(&token).expect("verify"), subject());
    }

    #[test]
    fn refresh_round_trip() {
        let issuer = test_issuer();
        let token = issuer.issue_refresh(&subject()).expect("sign refresh");
        assert_eq!(issuer.verify_refresh(&token).expect("verify"), subject());
    }

    #[test]
    fn access_token_fails_refresh_verification() {
        let issuer = test_issuer();
        let token = issuer.issue_access(&subject()).unwrap();
        assert!(matches!(
            issuer.verify_refresh(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn refresh_token_fails_access_verification() {
        let issuer = test_issuer();
        let token = issuer.issue_refresh(&subject()).unwrap();
        assert!(matches!(
            issuer.verify_access(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn kind_is_checked_even_with_a_shared_secret() {
        let access = TokenKeys::new(TokenKind::Access, "same", Duration::minutes(5), "iss", "aud");
        let refresh = TokenKeys::new(TokenKind::Refresh, "same", Duration::minutes(5), "iss", "aud");
        let token = access.sign(&subject()).unwrap();
        assert!(matches!(refresh.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let issuer = test_issuer();
        let two_hours_ago = OffsetDateTime::now_utc() - Duration::hours(2);
        let access = issuer.access().sign_at(&subject(), two_hours_ago).unwrap();
        let refresh = issuer.refresh().sign_at(&subject(), two_hours_ago).unwrap();
        assert!(matches!(issuer.verify_access(&access), Err(AuthError::InvalidToken)));
        assert!(matches!(issuer.verify_refresh(&refresh), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let good = TokenKeys::new(TokenKind::Access, "s", Duration::minutes(5), "iss", "aud");
        let other = TokenKeys::new(TokenKind::Access, "s", Duration::minutes(5), "iss", "other");
        let token = good.sign(&subject()).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let issuer = test_issuer();
        assert!(matches!(
            issuer.verify_access("not-a-jwt"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn consecutive_tokens_differ() {
        let issuer = test_issuer();
        let a = issuer.issue_refresh(&subject()).unwrap();
        let b = issuer.issue_refresh(&subject()).unwrap();
        assert_ne!(a, b);
    }
}

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_secret: String,
    pub refresh_ttl_minutes: i64,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    /// Argon2 iteration count.
    pub cost: u32,
    pub memory_kib: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't have to touch
    /// the process environment.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| get(key).with_context(|| format!("{key} is not set"));
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt = JwtConfig {
            access_secret: required("JWT_ACCESS_SECRET")?,
            access_ttl_minutes: or("JWT_ACCESS_TTL_MINUTES", "60")
                .parse()
                .context("JWT_ACCESS_TTL_MINUTES must be an integer")?,
            refresh_secret: required("JWT_REFRESH_SECRET")?,
            refresh_ttl_minutes: or("JWT_REFRESH_TTL_MINUTES", "10080")
                .parse()
                .context("JWT_REFRESH_TTL_MINUTES must be an integer")?,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "spellbook".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "spellbook-users".into()),
        };
        anyhow::ensure!(
            jwt.access_secret != jwt.refresh_secret,
            "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ"
        );
        anyhow::ensure!(
            jwt.access_ttl_minutes > 0 && jwt.refresh_ttl_minutes > 0,
            "token lifetimes must be positive"
        );

        let password = PasswordConfig {
            cost: or("PASSWORD_HASH_COST", "2")
                .parse()
                .context("PASSWORD_HASH_COST must be an integer")?,
            memory_kib: or("PASSWORD_HASH_MEMORY_KIB", "19456")
                .parse()
                .context("PASSWORD_HASH_MEMORY_KIB must be an integer")?,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: or("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be an integer")?,
            jwt,
            password,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: or("APP_PORT", "3000")
                .parse()
                .context("APP_PORT must be a port number")?,
        })
    }
}

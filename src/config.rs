use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2 cost parameters. `cost` is the iteration count.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub cost: u32,
    pub memory_kib: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            cost: argon2::Params::DEFAULT_T_COST,
            memory_kib: argon2::Params::DEFAULT_M_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Falls back to the in-memory store when unset.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let bind_addr = format!(
            "{}:{}",
            std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
        );
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "todo-api".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "todo-api-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60 * 24 * 7),
        };
        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            cost: env_parse("PASSWORD_HASH_COST").unwrap_or(defaults.cost),
            memory_kib: env_parse("PASSWORD_HASH_MEMORY_KIB").unwrap_or(defaults.memory_kib),
        };
        Ok(Self {
            database_url,
            bind_addr,
            jwt,
            password,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

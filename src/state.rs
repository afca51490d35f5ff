use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::storage::{MemoryStore, PgStore, TodoStore, UserStore};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub todos: Arc<dyn TodoStore>,
    pub auth: AuthService,
}

impl AppState {
    /// Connects to Postgres and runs migrations when a database URL is
    /// configured, otherwise keeps everything in memory.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, todos): (Arc<dyn UserStore>, Arc<dyn TodoStore>) =
            match config.database_url.as_deref() {
                Some(url) => {
                    let db = sqlx::postgres::PgPoolOptions::new()
                        .max_connections(10)
                        .connect(url)
                        .await
                        .context("connect to database")?;
                    let store = Arc::new(PgStore::new(db));
                    sqlx::migrate!("./migrations")
                        .run(store.pool())
                        .await
                        .context("run migrations")?;
                    let users: Arc<dyn UserStore> = store.clone();
                    let todos: Arc<dyn TodoStore> = store;
                    (users, todos)
                }
                None => {
                    tracing::warn!("DATABASE_URL not set; using in-memory store");
                    let store = Arc::new(MemoryStore::new());
                    let users: Arc<dyn UserStore> = store.clone();
                    let todos: Arc<dyn TodoStore> = store;
                    (users, todos)
                }
            };

        Self::from_parts(config, users, todos)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        todos: Arc<dyn TodoStore>,
    ) -> anyhow::Result<Self> {
        let auth = AuthService::new(&config, users)?;
        Ok(Self {
            config,
            todos,
            auth,
        })
    }

    #[cfg(test)]
    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: None,
            bind_addr: "127.0.0.1:0".into(),
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            password: crate::config::PasswordConfig {
                cost: 1,
                memory_kib: 1024,
            },
        }
    }

    /// Memory-backed state with cheap hashing.
    #[cfg(test)]
    pub fn fake() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(Arc::new(Self::test_config()), store.clone(), store)
            .expect("fake state builds")
    }
}

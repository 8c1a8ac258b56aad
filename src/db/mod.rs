//! Database connection pool and the storage availability handle.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Storage capability decided once at startup.
///
/// `None` means the process runs in webhook-only mode: writes become no-ops
/// and reads come back empty. Handlers never re-probe the database.
#[derive(Debug, Clone, Default)]
pub struct Storage(Option<PgPool>);

impl Storage {
    pub fn connected(pool: PgPool) -> Self {
        Self(Some(pool))
    }

    pub fn unavailable() -> Self {
        Self(None)
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.0.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.0.is_some()
    }
}

/// Connect and migrate, falling back to [`Storage::unavailable`] on any failure.
pub async fn connect_storage(database_url: Option<&str>, max_connections: u32) -> Storage {
    let Some(url) = database_url else {
        tracing::warn!("DATABASE_URL not set, running in webhook-only mode");
        return Storage::unavailable();
    };

    let pool = match create_pool(url, max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "Database connection failed, running in webhook-only mode");
            return Storage::unavailable();
        }
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::warn!(error = %e, "Database migrations failed, running in webhook-only mode");
        return Storage::unavailable();
    }

    tracing::info!("Database connected successfully");
    Storage::connected(pool)
}

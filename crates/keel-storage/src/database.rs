use async_trait::async_trait;
use keel_config::DatabaseConfig;
use keel_core::{DatabaseFailure, HealthCheck, StorageError};
use secrecy::ExposeSecret;
use sqlx::{
    PgPool,
    postgres::{PgDatabaseError, PgPoolOptions},
};

/// PostgreSQL connection pool
///
/// Connections are opened on demand, so a database that is down at startup
/// only shows up as failing health checks and storage errors.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a lazily connecting pool
    ///
    /// # Errors
    ///
    /// Returns an error if the connection URL cannot be parsed
    pub fn connect_lazy(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_lazy(config.url.expose_secret())
            .map_err(|e| anyhow::anyhow!("invalid database configuration: {e}"))?;

        tracing::debug!(max_connections = config.max_connections, "database pool created");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run a trivial statement to prove the database answers
    ///
    /// # Errors
    ///
    /// Returns the classified failure when no connection can be used
    pub async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.storage()?;
        Ok(())
    }

    /// Close every connection, waiting for checked-out ones to return
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }
}

#[async_trait]
impl HealthCheck for Database {
    async fn check(&self) -> anyhow::Result<()> {
        self.ping().await?;
        Ok(())
    }
}

/// Convert a driver error into the storage error taxonomy
///
/// Keeps the SQLSTATE code with whatever table, column and constraint the
/// server reported; a missing row becomes [`StorageError::NoRows`].
pub fn classify(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::RowNotFound => StorageError::NoRows,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            let mut failure = DatabaseFailure::new(code, db.message());

            if let Some(table) = db.table() {
                failure = failure.with_table(table);
            }
            if let Some(constraint) = db.constraint() {
                failure = failure.with_constraint(constraint);
            }
            if let Some(pg) = db.try_downcast_ref::<PgDatabaseError>()
                && let Some(column) = pg.column()
            {
                failure = failure.with_column(column);
            }

            StorageError::Database(failure)
        }
        other => {
            tracing::debug!(error = %other, "database unavailable");
            StorageError::Unavailable(other.to_string())
        }
    }
}

/// `?`-friendly conversion of sqlx results
pub trait StorageResultExt<T> {
    /// Classify the error side of a sqlx result
    ///
    /// # Errors
    ///
    /// Returns the classified [`StorageError`]
    fn storage(self) -> Result<T, StorageError>;
}

impl<T> StorageResultExt<T> for Result<T, sqlx::Error> {
    fn storage(self) -> Result<T, StorageError> {
        self.map_err(classify)
    }
}

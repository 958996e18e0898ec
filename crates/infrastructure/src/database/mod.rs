pub mod mapping;
pub mod sqlite_worker_registry;

pub use sqlite_worker_registry::SqliteWorkerRegistry;

use std::time::Duration;

use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::info;
use watchtower_core::{DatabaseConfig, WatchtowerResult};

pub type DbPool = Pool<Sqlite>;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS watchtower_workers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        worker_id TEXT NOT NULL UNIQUE,
        supervisor TEXT NOT NULL,
        queue TEXT NOT NULL,
        pid INTEGER,
        status TEXT NOT NULL DEFAULT 'running',
        started_at INTEGER NOT NULL,
        last_heartbeat INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_watchtower_workers_supervisor_status ON watchtower_workers (supervisor, status)",
    "CREATE INDEX IF NOT EXISTS idx_watchtower_workers_status_heartbeat ON watchtower_workers (status, last_heartbeat)",
];

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> WatchtowerResult<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 建表与索引，可重复执行
    pub async fn migrate(&self) -> WatchtowerResult<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Worker注册表迁移完成");
        Ok(())
    }

    pub async fn health_check(&self) -> WatchtowerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

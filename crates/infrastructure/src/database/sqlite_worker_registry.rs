use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteArguments;
use sqlx::query::Query;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::{WorkerRecord, WorkerRegistry, WorkerStatus};

use super::mapping::MappingHelpers;

const SELECT_COLUMNS: &str =
    "SELECT worker_id, supervisor, queue, pid, status, started_at, last_heartbeat FROM watchtower_workers";

/// SQLite Worker注册表实现
pub struct SqliteWorkerRegistry {
    pool: SqlitePool,
}

impl SqliteWorkerRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn status_placeholders(statuses: &[WorkerStatus]) -> String {
        vec!["?"; statuses.len()].join(", ")
    }

    fn bind_statuses<'q>(
        mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
        statuses: &[WorkerStatus],
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        for status in statuses {
            query = query.bind(status.as_str());
        }
        query
    }

    async fn fetch_records<'a>(
        &self,
        query: Query<'a, Sqlite, SqliteArguments<'a>>,
    ) -> WatchtowerResult<Vec<WorkerRecord>> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(MappingHelpers::row_to_worker_record).collect()
    }
}

#[async_trait]
impl WorkerRegistry for SqliteWorkerRegistry {
    async fn upsert(&self, record: &WorkerRecord) -> WatchtowerResult<()> {
        let now = MappingHelpers::to_millis(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO watchtower_workers
                (worker_id, supervisor, queue, pid, status, started_at, last_heartbeat, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(worker_id) DO UPDATE SET
                supervisor = excluded.supervisor,
                queue = excluded.queue,
                pid = COALESCE(excluded.pid, watchtower_workers.pid),
                status = excluded.status,
                started_at = excluded.started_at,
                last_heartbeat = excluded.last_heartbeat,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.worker_id)
        .bind(&record.supervisor)
        .bind(&record.queue)
        .bind(MappingHelpers::pid_to_db(record.pid))
        .bind(record.status.as_str())
        .bind(MappingHelpers::to_millis(record.started_at))
        .bind(record.last_heartbeat.map(MappingHelpers::to_millis))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!("写入Worker记录: {} ({})", record.worker_id, record.status);
        Ok(())
    }

    async fn find_by_id(&self, worker_id: &str) -> WatchtowerResult<Option<WorkerRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE worker_id = ?");
        let row = sqlx::query(&sql)
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(MappingHelpers::row_to_worker_record)
            .transpose()
    }

    async fn list(&self) -> WatchtowerResult<Vec<WorkerRecord>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY started_at DESC, id DESC");
        self.fetch_records(sqlx::query(&sql)).await
    }

    async fn list_by_status(&self, statuses: &[WorkerStatus]) -> WatchtowerResult<Vec<WorkerRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{SELECT_COLUMNS} WHERE status IN ({}) ORDER BY started_at DESC, id DESC",
            Self::status_placeholders(statuses)
        );
        self.fetch_records(Self::bind_statuses(sqlx::query(&sql), statuses))
            .await
    }

    async fn list_for_supervisor(
        &self,
        supervisor: &str,
        statuses: &[WorkerStatus],
    ) -> WatchtowerResult<Vec<WorkerRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{SELECT_COLUMNS} WHERE supervisor = ? AND status IN ({}) ORDER BY started_at ASC, id ASC",
            Self::status_placeholders(statuses)
        );
        let query = sqlx::query(&sql).bind(supervisor);
        self.fetch_records(Self::bind_statuses(query, statuses)).await
    }

    async fn list_stale(
        &self,
        threshold_seconds: i64,
        statuses: &[WorkerStatus],
    ) -> WatchtowerResult<Vec<WorkerRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let cutoff = MappingHelpers::to_millis(Utc::now() - Duration::seconds(threshold_seconds));
        let sql = format!(
            "{SELECT_COLUMNS} WHERE status IN ({}) AND (last_heartbeat IS NULL OR last_heartbeat < ?) ORDER BY started_at ASC, id ASC",
            Self::status_placeholders(statuses)
        );
        let query = Self::bind_statuses(sqlx::query(&sql), statuses).bind(cutoff);
        self.fetch_records(query).await
    }

    async fn update_status(&self, worker_id: &str, status: WorkerStatus) -> WatchtowerResult<()> {
        let result = sqlx::query(
            "UPDATE watchtower_workers SET status = ?, updated_at = ? WHERE worker_id = ?",
        )
        .bind(status.as_str())
        .bind(MappingHelpers::to_millis(Utc::now()))
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WatchtowerError::worker_not_found(worker_id));
        }
        Ok(())
    }

    async fn update_heartbeat(&self, worker_id: &str, at: DateTime<Utc>) -> WatchtowerResult<()> {
        let millis = MappingHelpers::to_millis(at);
        let result = sqlx::query(
            "UPDATE watchtower_workers SET last_heartbeat = ?, updated_at = ? WHERE worker_id = ?",
        )
        .bind(millis)
        .bind(millis)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WatchtowerError::worker_not_found(worker_id));
        }
        Ok(())
    }

    async fn prune_stopped(&self, older_than: DateTime<Utc>) -> WatchtowerResult<u64> {
        let result = sqlx::query(
            "DELETE FROM watchtower_workers WHERE status = ? AND COALESCE(last_heartbeat, started_at) < ?",
        )
        .bind(WorkerStatus::Stopped.as_str())
        .bind(MappingHelpers::to_millis(older_than))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

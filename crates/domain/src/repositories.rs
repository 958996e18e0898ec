//! 领域仓储抽象

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use watchtower_core::WatchtowerResult;

use crate::entities::{WorkerRecord, WorkerStatus};

/// Worker注册表
///
/// 每个写操作都是单键的upsert/update，不需要跨键事务。
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    /// 按worker_id创建或覆盖记录
    async fn upsert(&self, record: &WorkerRecord) -> WatchtowerResult<()>;

    async fn find_by_id(&self, worker_id: &str) -> WatchtowerResult<Option<WorkerRecord>>;

    /// 全部记录，按启动时间倒序
    async fn list(&self) -> WatchtowerResult<Vec<WorkerRecord>>;

    async fn list_by_status(&self, statuses: &[WorkerStatus]) -> WatchtowerResult<Vec<WorkerRecord>>;

    async fn list_for_supervisor(
        &self,
        supervisor: &str,
        statuses: &[WorkerStatus],
    ) -> WatchtowerResult<Vec<WorkerRecord>>;

    /// 心跳为空或早于 now - threshold 的记录
    async fn list_stale(
        &self,
        threshold_seconds: i64,
        statuses: &[WorkerStatus],
    ) -> WatchtowerResult<Vec<WorkerRecord>>;

    /// 记录不存在时返回 WorkerNotFound
    async fn update_status(&self, worker_id: &str, status: WorkerStatus) -> WatchtowerResult<()>;

    async fn update_heartbeat(&self, worker_id: &str, at: DateTime<Utc>) -> WatchtowerResult<()>;

    /// 删除最后活动时间早于 older_than 的已停止记录
    async fn prune_stopped(&self, older_than: DateTime<Utc>) -> WatchtowerResult<u64>;
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::{WorkerRecord, WorkerRegistry, WorkerStatus};

/// Worker对注册表的全部写操作
///
/// 每次写入都受 `write_timeout` 约束；失败只记录日志，不会阻塞主循环。
pub struct HeartbeatManager {
    worker_id: String,
    registry: Arc<dyn WorkerRegistry>,
    write_timeout: Duration,
}

impl HeartbeatManager {
    pub fn new(worker_id: String, registry: Arc<dyn WorkerRegistry>, write_timeout: Duration) -> Self {
        Self {
            worker_id,
            registry,
            write_timeout,
        }
    }

    async fn bounded<F>(&self, action: &str, write: F) -> bool
    where
        F: Future<Output = WatchtowerResult<()>>,
    {
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) if e.is_transient() => {
                warn!(worker_id = %self.worker_id, "注册表{}失败，下一轮重试: {}", action, e);
                false
            }
            Ok(Err(e)) => {
                error!(worker_id = %self.worker_id, "注册表{}失败: {}", action, e);
                false
            }
            Err(_) => {
                let e = WatchtowerError::Internal(format!(
                    "注册表{action}超时({}ms)",
                    self.write_timeout.as_millis()
                ));
                warn!(worker_id = %self.worker_id, "{}", e);
                false
            }
        }
    }

    /// 启动时登记自身记录
    pub async fn register(&self, record: &WorkerRecord) -> bool {
        self.bounded("登记", self.registry.upsert(record)).await
    }

    pub async fn beat(&self) -> bool {
        let ok = self
            .bounded("心跳", self.registry.update_heartbeat(&self.worker_id, Utc::now()))
            .await;
        if ok {
            debug!(worker_id = %self.worker_id, "心跳已发送");
        }
        ok
    }

    pub async fn update_status(&self, status: WorkerStatus) -> bool {
        self.bounded("状态更新", self.registry.update_status(&self.worker_id, status))
            .await
    }
}

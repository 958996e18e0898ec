use async_trait::async_trait;
use watchtower_core::WatchtowerResult;

use crate::events::JobEvent;
use crate::value_objects::WorkerOptions;

/// 外部任务执行引擎
#[async_trait]
pub trait JobEngine: Send + Sync {
    /// 为指定连接和队列处理至多一个任务单元，最长阻塞 `options.timeout`
    async fn run_next_job(
        &self,
        connection: &str,
        queue: &str,
        options: &WorkerOptions,
    ) -> WatchtowerResult<()>;
}

/// 任务生命周期事件的接收方，自身失败不得影响队列
#[async_trait]
pub trait JobMonitor: Send + Sync {
    async fn record(&self, event: JobEvent);
}

use async_trait::async_trait;
use tracing::{info, warn};
use watchtower_domain::{JobEvent, JobEventKind, JobMonitor};

/// 将任务生命周期事件写入结构化日志
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingJobMonitor;

#[async_trait]
impl JobMonitor for TracingJobMonitor {
    async fn record(&self, event: JobEvent) {
        let queue = event.queue.as_deref().unwrap_or("-");
        match event.kind {
            JobEventKind::Failed => warn!(
                job_id = %event.job_id,
                queue,
                payload = %event.payload,
                "任务执行失败"
            ),
            JobEventKind::RetryRequested => warn!(
                job_id = %event.job_id,
                queue,
                "任务请求重试"
            ),
            kind => info!(
                job_id = %event.job_id,
                queue,
                kind = ?kind,
                "任务事件"
            ),
        }
    }
}

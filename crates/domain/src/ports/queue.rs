use async_trait::async_trait;
use watchtower_core::WatchtowerResult;

/// 通配符队列配置使用的队列发现
#[async_trait]
pub trait QueueInspector: Send + Sync {
    /// 当前存在待处理任务的队列名，按名称排序
    async fn pending_queues(&self) -> WatchtowerResult<Vec<String>>;
}

use std::time::Duration;

use async_trait::async_trait;
use watchtower_core::WatchtowerResult;

/// 共享键值存储，作为每个Worker的单槽邮箱与全局标志位
#[async_trait]
pub trait ControlChannel: Send + Sync {
    async fn get(&self, key: &str) -> WatchtowerResult<Option<String>>;

    /// 写入值，`ttl` 为空时永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> WatchtowerResult<()>;

    async fn delete(&self, key: &str) -> WatchtowerResult<()>;

    async fn expire(&self, key: &str, ttl: Duration) -> WatchtowerResult<()>;

    /// 先读后删；两次操作之间写入的新值会被一并删除
    async fn take(&self, key: &str) -> WatchtowerResult<Option<String>> {
        let value = self.get(key).await?;
        if value.is_some() {
            self.delete(key).await?;
        }
        Ok(value)
    }
}

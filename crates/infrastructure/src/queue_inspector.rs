use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;
use watchtower_core::WatchtowerResult;
use watchtower_domain::QueueInspector;

const SCAN_BATCH: usize = 100;

/// 从完整键名中取出队列名，辅助键返回None
pub fn queue_name_from_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let name = key.strip_prefix(prefix)?.strip_prefix(':')?;
    if name.is_empty() || name.contains(':') {
        return None;
    }
    Some(name)
}

/// 扫描 `<prefix>:*` 列表键发现有待处理任务的队列
///
/// `<prefix>:<queue>:delayed` 等辅助键包含额外的冒号段，会被跳过。
#[derive(Clone)]
pub struct RedisQueueInspector {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisQueueInspector {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    async fn scan_keys(&self) -> WatchtowerResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

#[async_trait]
impl QueueInspector for RedisQueueInspector {
    async fn pending_queues(&self) -> WatchtowerResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut queues = Vec::new();

        for key in self.scan_keys().await? {
            let Some(name) = queue_name_from_key(&self.prefix, &key) else {
                continue;
            };
            let length: redis::RedisResult<u64> =
                redis::cmd("LLEN").arg(&key).query_async(&mut conn).await;
            match length {
                Ok(len) if len > 0 => queues.push(name.to_string()),
                Ok(_) => {}
                Err(e) => debug!("跳过非列表键 {}: {}", key, e),
            }
        }

        queues.sort();
        queues.dedup();
        Ok(queues)
    }
}

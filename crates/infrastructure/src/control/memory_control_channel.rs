use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::ControlChannel;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// 内存控制通道实现
///
/// 只在单进程内可见，用于测试与嵌入式场景；过期语义与Redis一致。
#[derive(Debug, Clone, Default)]
pub struct InMemoryControlChannel {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryControlChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> WatchtowerResult<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|e| WatchtowerError::control_channel(format!("控制通道锁已损坏: {e}")))
    }

    /// 当前未过期的键数量
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|entries| entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ControlChannel for InMemoryControlChannel {
    async fn get(&self, key: &str) -> WatchtowerResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> WatchtowerResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> WatchtowerResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> WatchtowerResult<()> {
        if let Some(entry) = self.lock()?.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn take(&self, key: &str) -> WatchtowerResult<Option<String>> {
        let now = Instant::now();
        Ok(self
            .lock()?
            .remove(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value))
    }
}

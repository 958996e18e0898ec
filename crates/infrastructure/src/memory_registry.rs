use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::{WorkerRecord, WorkerRegistry, WorkerStatus};

/// 内存Worker注册表，供单进程运行与测试使用
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkerRegistry {
    records: Arc<RwLock<HashMap<String, WorkerRecord>>>,
}

impl InMemoryWorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn collect<F>(&self, filter: F) -> Vec<WorkerRecord>
    where
        F: Fn(&WorkerRecord) -> bool,
    {
        let records = self.records.read().await;
        let mut matched: Vec<WorkerRecord> = records.values().filter(|r| filter(r)).cloned().collect();
        matched.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.worker_id.cmp(&b.worker_id)));
        matched
    }
}

#[async_trait]
impl WorkerRegistry for InMemoryWorkerRegistry {
    async fn upsert(&self, record: &WorkerRecord) -> WatchtowerResult<()> {
        let mut records = self.records.write().await;
        let mut record = record.clone();
        if record.pid.is_none() {
            record.pid = records.get(&record.worker_id).and_then(|existing| existing.pid);
        }
        records.insert(record.worker_id.clone(), record);
        Ok(())
    }

    async fn find_by_id(&self, worker_id: &str) -> WatchtowerResult<Option<WorkerRecord>> {
        Ok(self.records.read().await.get(worker_id).cloned())
    }

    async fn list(&self) -> WatchtowerResult<Vec<WorkerRecord>> {
        let mut all = self.collect(|_| true).await;
        all.reverse();
        Ok(all)
    }

    async fn list_by_status(&self, statuses: &[WorkerStatus]) -> WatchtowerResult<Vec<WorkerRecord>> {
        let mut matched = self.collect(|r| statuses.contains(&r.status)).await;
        matched.reverse();
        Ok(matched)
    }

    async fn list_for_supervisor(
        &self,
        supervisor: &str,
        statuses: &[WorkerStatus],
    ) -> WatchtowerResult<Vec<WorkerRecord>> {
        Ok(self
            .collect(|r| r.supervisor == supervisor && statuses.contains(&r.status))
            .await)
    }

    async fn list_stale(
        &self,
        threshold_seconds: i64,
        statuses: &[WorkerStatus],
    ) -> WatchtowerResult<Vec<WorkerRecord>> {
        let now = Utc::now();
        Ok(self
            .collect(|r| statuses.contains(&r.status) && r.is_stale(threshold_seconds, now))
            .await)
    }

    async fn update_status(&self, worker_id: &str, status: WorkerStatus) -> WatchtowerResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(worker_id)
            .ok_or_else(|| WatchtowerError::worker_not_found(worker_id))?;
        record.status = status;
        Ok(())
    }

    async fn update_heartbeat(&self, worker_id: &str, at: DateTime<Utc>) -> WatchtowerResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(worker_id)
            .ok_or_else(|| WatchtowerError::worker_not_found(worker_id))?;
        record.last_heartbeat = Some(at);
        Ok(())
    }

    async fn prune_stopped(&self, older_than: DateTime<Utc>) -> WatchtowerResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| {
            r.status != WorkerStatus::Stopped || r.last_heartbeat.unwrap_or(r.started_at) >= older_than
        });
        Ok((before - records.len()) as u64)
    }
}

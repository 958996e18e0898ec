//! Test data builders

use chrono::{DateTime, Duration, Utc};
use watchtower_domain::{WorkerRecord, WorkerStatus};

/// Builder for WorkerRecord with running/now defaults
pub struct WorkerRecordBuilder {
    record: WorkerRecord,
}

impl WorkerRecordBuilder {
    pub fn new(worker_id: &str) -> Self {
        Self {
            record: WorkerRecord::new(worker_id, "default", "default"),
        }
    }

    pub fn with_supervisor(mut self, supervisor: &str) -> Self {
        self.record.supervisor = supervisor.to_string();
        self
    }

    pub fn with_queue(mut self, queue: &str) -> Self {
        self.record.queue = queue.to_string();
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.record.pid = Some(pid);
        self
    }

    pub fn without_pid(mut self) -> Self {
        self.record.pid = None;
        self
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn paused(self) -> Self {
        self.with_status(WorkerStatus::Paused)
    }

    pub fn stopped(self) -> Self {
        self.with_status(WorkerStatus::Stopped)
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.record.started_at = at;
        self
    }

    pub fn with_heartbeat(mut self, at: DateTime<Utc>) -> Self {
        self.record.last_heartbeat = Some(at);
        self
    }

    /// 心跳早于当前时间 `seconds` 秒
    pub fn heartbeat_seconds_ago(mut self, seconds: i64) -> Self {
        self.record.last_heartbeat = Some(Utc::now() - Duration::seconds(seconds));
        self
    }

    pub fn without_heartbeat(mut self) -> Self {
        self.record.last_heartbeat = None;
        self
    }

    pub fn build(self) -> WorkerRecord {
        self.record
    }
}

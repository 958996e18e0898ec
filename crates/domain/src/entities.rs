use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use watchtower_core::WatchtowerError;

/// Worker状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Running,
    Paused,
    Stopped,
    /// 正常的重启退出，Supervisor应当补位而不是视为崩溃
    Restarting,
}

impl WorkerStatus {
    /// Supervisor计数时视为存活的状态
    pub const ACTIVE: [WorkerStatus; 2] = [WorkerStatus::Running, WorkerStatus::Paused];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Running => "running",
            WorkerStatus::Paused => "paused",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Restarting => "restarting",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, WorkerStatus::Running | WorkerStatus::Paused)
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerStatus {
    type Err = WatchtowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(WorkerStatus::Running),
            "paused" => Ok(WorkerStatus::Paused),
            "stopped" => Ok(WorkerStatus::Stopped),
            "restarting" => Ok(WorkerStatus::Restarting),
            other => Err(WatchtowerError::Serialization(format!(
                "无效的Worker状态: {other}"
            ))),
        }
    }
}

/// Worker注册记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerRecord {
    pub worker_id: String,
    /// 所属Supervisor配置名称
    pub supervisor: String,
    /// 单个队列名，或以逗号连接的多个队列
    pub queue: String,
    /// 进程确认启动后才有值
    pub pid: Option<u32>,
    pub status: WorkerStatus,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl WorkerRecord {
    /// 创建一条运行中的记录，启动时间与心跳均为当前时间
    pub fn new(worker_id: impl Into<String>, supervisor: impl Into<String>, queue: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            worker_id: worker_id.into(),
            supervisor: supervisor.into(),
            queue: queue.into(),
            pid: None,
            status: WorkerStatus::Running,
            started_at: now,
            last_heartbeat: Some(now),
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// 心跳为空或早于阈值即视为陈旧
    pub fn is_stale(&self, threshold_seconds: i64, now: DateTime<Utc>) -> bool {
        match self.last_heartbeat {
            None => true,
            Some(heartbeat) => heartbeat < now - Duration::seconds(threshold_seconds),
        }
    }

    /// 最近一次心跳在阈值内
    pub fn is_healthy(&self, threshold_seconds: i64, now: DateTime<Utc>) -> bool {
        match self.last_heartbeat {
            None => false,
            Some(heartbeat) => (now - heartbeat).num_seconds() <= threshold_seconds,
        }
    }

    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        now - self.started_at
    }
}

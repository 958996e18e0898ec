use std::time::Duration;

use serde::{Deserialize, Serialize};
use watchtower_core::SupervisorConfig;

/// 启动Worker时传递给运行时的选项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerOptions {
    pub supervisor: String,
    pub connection: String,
    pub tries: u32,
    /// 单个任务的最长执行时间（秒）
    pub timeout: u64,
    /// 内存上限（MB）
    pub memory: u64,
    pub sleep: u64,
    pub rest: u64,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            supervisor: "default".to_string(),
            connection: "redis".to_string(),
            tries: 3,
            timeout: 60,
            memory: 128,
            sleep: 3,
            rest: 0,
        }
    }
}

impl WorkerOptions {
    /// 由Supervisor配置派生每个Worker的任务默认值
    pub fn from_supervisor(name: &str, config: &SupervisorConfig) -> Self {
        Self {
            supervisor: name.to_string(),
            connection: config.connection.clone(),
            tries: config.tries,
            timeout: config.timeout,
            memory: config.memory,
            sleep: config.sleep,
            rest: config.rest,
        }
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// 进程启动描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLaunchSpec {
    pub worker_id: String,
    pub queue: String,
    pub options: WorkerOptions,
}

/// 多个队列合并为一个Worker的组合队列分配
pub fn composite_queue(queues: &[String]) -> String {
    queues.join(",")
}

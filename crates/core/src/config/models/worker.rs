use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Worker运行时与控制通道相关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRuntimeConfig {
    /// Worker与Supervisor的轮询间隔（秒）
    pub poll_interval_seconds: u64,
    /// 控制命令的过期时间（秒）
    pub command_ttl_seconds: u64,
    /// 心跳超过该时长视为陈旧（秒）
    pub stale_threshold_seconds: i64,
    /// 启动进程后等待其上报PID的时间（毫秒）
    pub startup_grace_ms: u64,
    /// 单次注册表写入的最长等待时间（毫秒）
    pub registry_timeout_ms: u64,
    /// Supervisor状态日志的最小输出间隔（秒）
    pub status_interval_seconds: u64,
    /// 交给外部队列运行时执行一个任务单元的命令模板
    pub job_command: Vec<String>,
    /// 队列在Redis中的键前缀，用于通配符队列发现
    pub queue_key_prefix: String,
}

impl Default for WorkerRuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 3,
            command_ttl_seconds: 300,
            stale_threshold_seconds: 60,
            startup_grace_ms: 100,
            registry_timeout_ms: 5000,
            status_interval_seconds: 30,
            job_command: [
                "php",
                "artisan",
                "queue:work",
                "{connection}",
                "--queue={queue}",
                "--once",
                "--tries={tries}",
                "--timeout={timeout}",
                "--memory={memory}",
                "--sleep={sleep}",
                "--rest={rest}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            queue_key_prefix: "queues".to_string(),
        }
    }
}

impl WorkerRuntimeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_seconds == 0 {
            return Err(anyhow::anyhow!("轮询间隔必须大于0"));
        }

        if self.command_ttl_seconds == 0 {
            return Err(anyhow::anyhow!("控制命令过期时间必须大于0"));
        }

        if self.stale_threshold_seconds <= 0 {
            return Err(anyhow::anyhow!("陈旧阈值必须大于0"));
        }

        if self.registry_timeout_ms == 0 {
            return Err(anyhow::anyhow!("注册表写入超时必须大于0"));
        }

        if self.job_command.is_empty() || self.job_command[0].is_empty() {
            return Err(anyhow::anyhow!("任务执行命令不能为空"));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn command_ttl(&self) -> Duration {
        Duration::from_secs(self.command_ttl_seconds)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_seconds)
    }
}

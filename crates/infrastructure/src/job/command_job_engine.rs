//! 通过外部命令处理单个任务
//!
//! 命令模板中的占位符在每次调用时替换；命令stdout中的JSON行被解析为任务事件。

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::{JobEngine, JobEvent, JobMonitor, WorkerOptions};

pub struct CommandJobEngine {
    template: Vec<String>,
    worker_id: String,
    monitor: Arc<dyn JobMonitor>,
}

impl CommandJobEngine {
    pub fn new(
        template: Vec<String>,
        worker_id: impl Into<String>,
        monitor: Arc<dyn JobMonitor>,
    ) -> WatchtowerResult<Self> {
        if template.is_empty() {
            return Err(WatchtowerError::config_error("任务命令模板不能为空"));
        }
        Ok(Self {
            template,
            worker_id: worker_id.into(),
            monitor,
        })
    }

    /// 替换模板中的占位符
    pub fn render(&self, connection: &str, queue: &str, options: &WorkerOptions) -> Vec<String> {
        let replacements = [
            ("{connection}", connection.to_string()),
            ("{queue}", queue.to_string()),
            ("{tries}", options.tries.to_string()),
            ("{timeout}", options.timeout.to_string()),
            ("{memory}", options.memory.to_string()),
            ("{sleep}", options.sleep.to_string()),
            ("{rest}", options.rest.to_string()),
            ("{worker_id}", self.worker_id.clone()),
        ];

        self.template
            .iter()
            .map(|part| {
                replacements
                    .iter()
                    .fold(part.clone(), |acc, (placeholder, value)| {
                        acc.replace(placeholder, value)
                    })
            })
            .collect()
    }
}

#[async_trait]
impl JobEngine for CommandJobEngine {
    async fn run_next_job(
        &self,
        connection: &str,
        queue: &str,
        options: &WorkerOptions,
    ) -> WatchtowerResult<()> {
        let argv = self.render(connection, queue, options);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| WatchtowerError::config_error("任务命令模板不能为空"))?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| WatchtowerError::job_execution(format!("启动任务命令失败: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WatchtowerError::job_execution("无法获取stdout"))?;
        let monitor = Arc::clone(&self.monitor);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match JobEvent::parse_line(&line) {
                    Some(event) => monitor.record(event).await,
                    None if !line.trim().is_empty() => debug!("任务输出: {}", line),
                    None => {}
                }
            }
        });

        let outcome = match tokio::time::timeout(options.timeout_duration(), child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(WatchtowerError::job_execution(format!(
                "任务命令退出异常: {status}"
            ))),
            Ok(Err(e)) => Err(WatchtowerError::job_execution(format!(
                "等待任务命令失败: {e}"
            ))),
            Err(_) => {
                warn!(
                    "任务命令超时，终止进程: queue={}, timeout={}s",
                    queue, options.timeout
                );
                if let Err(e) = child.kill().await {
                    warn!("终止任务命令失败: {}", e);
                }
                // 孙进程可能仍持有stdout，不再等待读到EOF
                reader.abort();
                Err(WatchtowerError::ExecutionTimeout)
            }
        };

        match reader.await {
            Err(e) if !e.is_cancelled() => debug!("任务输出读取任务异常结束: {}", e),
            _ => {}
        }
        outcome
    }
}

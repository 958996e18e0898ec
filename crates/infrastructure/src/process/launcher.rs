use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::{ProcessLauncher, ProcessProbe, WorkerLaunchSpec};

/// Worker子命令的参数列表
pub fn worker_args(spec: &WorkerLaunchSpec) -> Vec<String> {
    let options = &spec.options;
    vec![
        "worker".to_string(),
        spec.queue.clone(),
        "--worker-id".to_string(),
        spec.worker_id.clone(),
        "--supervisor".to_string(),
        options.supervisor.clone(),
        "--connection".to_string(),
        options.connection.clone(),
        "--tries".to_string(),
        options.tries.to_string(),
        "--timeout".to_string(),
        options.timeout.to_string(),
        "--memory".to_string(),
        options.memory.to_string(),
        "--sleep".to_string(),
        options.sleep.to_string(),
        "--rest".to_string(),
        options.rest.to_string(),
    ]
}

/// 以子进程方式启动Worker运行时
///
/// 持有子进程句柄以便回收已退出的进程。
///
/// 默认子进程继承stderr；只有常驻的Supervisor应开启转发，
/// 否则启动方退出后管道读端关闭，Worker写stderr时会收到SIGPIPE。
pub struct CommandProcessLauncher {
    program: PathBuf,
    base_args: Vec<String>,
    probe: Arc<dyn ProcessProbe>,
    startup_grace: Duration,
    forward_stderr: bool,
    children: Arc<Mutex<HashMap<u32, Child>>>,
}

impl CommandProcessLauncher {
    pub fn new(
        program: impl Into<PathBuf>,
        base_args: Vec<String>,
        probe: Arc<dyn ProcessProbe>,
        startup_grace: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            base_args,
            probe,
            startup_grace,
            forward_stderr: false,
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 将Worker的stderr逐行转发到本进程日志
    pub fn with_stderr_forwarding(mut self, enabled: bool) -> Self {
        self.forward_stderr = enabled;
        self
    }

    /// 使用当前可执行文件启动Worker，`config_path` 会原样传递给子进程
    pub fn current_exe(
        config_path: Option<&str>,
        probe: Arc<dyn ProcessProbe>,
        startup_grace: Duration,
    ) -> WatchtowerResult<Self> {
        let program = std::env::current_exe()
            .map_err(|e| WatchtowerError::ProcessSpawn(format!("无法定位当前可执行文件: {e}")))?;
        let base_args = config_path
            .map(|path| vec!["--config".to_string(), path.to_string()])
            .unwrap_or_default();
        Ok(Self::new(program, base_args, probe, startup_grace))
    }

    fn forward_stderr(worker_id: String, child: &mut Child) {
        let Some(stderr) = child.stderr.take() else {
            return;
        };
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if !line.trim().is_empty() => {
                        error!(worker_id = %worker_id, "Worker stderr: {}", line);
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(e) => {
                        debug!(worker_id = %worker_id, "读取Worker stderr失败: {}", e);
                        break;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl ProcessLauncher for CommandProcessLauncher {
    async fn spawn(&self, spec: &WorkerLaunchSpec) -> WatchtowerResult<Option<u32>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args);
        cmd.args(worker_args(spec));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        if self.forward_stderr {
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stderr(Stdio::inherit());
        }

        let mut child = cmd.spawn().map_err(|e| {
            WatchtowerError::ProcessSpawn(format!(
                "启动Worker进程失败: worker_id={}, error={e}",
                spec.worker_id
            ))
        })?;

        let pid = child.id();
        if self.forward_stderr {
            Self::forward_stderr(spec.worker_id.clone(), &mut child);
        }

        tokio::time::sleep(self.startup_grace).await;

        match child.try_wait() {
            Ok(Some(status)) => {
                warn!(
                    "Worker进程启动后立即退出: worker_id={}, pid={:?}, status={}",
                    spec.worker_id, pid, status
                );
                return Ok(pid);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("检查Worker进程状态失败: worker_id={}, error={}", spec.worker_id, e);
            }
        }

        info!(
            "Worker进程已启动: worker_id={}, queue={}, pid={:?}",
            spec.worker_id, spec.queue, pid
        );

        if let Some(pid) = pid {
            self.children.lock().await.insert(pid, child);
        }
        Ok(pid)
    }

    async fn is_running(&self, pid: Option<u32>) -> bool {
        let Some(pid) = pid else {
            return false;
        };

        {
            let mut children = self.children.lock().await;
            if let Some(child) = children.get_mut(&pid) {
                match child.try_wait() {
                    Ok(None) => return true,
                    Ok(Some(status)) => {
                        debug!("回收已退出的Worker进程: pid={}, status={}", pid, status);
                        children.remove(&pid);
                        return false;
                    }
                    Err(e) => {
                        debug!("检查子进程状态失败: pid={}, error={}", pid, e);
                        children.remove(&pid);
                    }
                }
            }
        }

        self.probe.is_alive(Some(pid)).await
    }
}

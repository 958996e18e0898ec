use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::{
    CommandMailbox, ControlCommand, JobEngine, MemoryProbe, WorkerLaunchSpec, WorkerRecord,
    WorkerRegistry, WorkerStatus,
};

use super::heartbeat_manager::HeartbeatManager;
use super::state_machine::{transition, RuntimeState, StopReason};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// 单个Worker进程的主循环
///
/// 每轮依次：读取命令 → 暂停子循环 → 心跳 → 执行一个任务单元 → 内存检查。
/// 命令只在轮次边界生效，执行中的任务不会被打断。
pub struct WorkerRuntime {
    spec: WorkerLaunchSpec,
    pid: Option<u32>,
    state: RuntimeState,
    mailbox: CommandMailbox,
    heartbeat: HeartbeatManager,
    engine: Arc<dyn JobEngine>,
    memory_probe: Option<Arc<dyn MemoryProbe>>,
    poll_interval: Duration,
    shutdown_rx: Option<broadcast::Receiver<()>>,
    booted_at: Option<DateTime<Utc>>,
    started_after_restart: bool,
}

pub struct WorkerRuntimeBuilder {
    spec: WorkerLaunchSpec,
    registry: Arc<dyn WorkerRegistry>,
    mailbox: CommandMailbox,
    engine: Arc<dyn JobEngine>,
    memory_probe: Option<Arc<dyn MemoryProbe>>,
    pid: Option<u32>,
    poll_interval: Duration,
    registry_timeout: Duration,
    shutdown_rx: Option<broadcast::Receiver<()>>,
}

impl WorkerRuntimeBuilder {
    pub fn new(
        spec: WorkerLaunchSpec,
        registry: Arc<dyn WorkerRegistry>,
        mailbox: CommandMailbox,
        engine: Arc<dyn JobEngine>,
    ) -> Self {
        Self {
            spec,
            registry,
            mailbox,
            engine,
            memory_probe: None,
            pid: Some(std::process::id()),
            poll_interval: Duration::from_secs(3),
            registry_timeout: Duration::from_secs(5),
            shutdown_rx: None,
        }
    }

    pub fn memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory_probe = Some(probe);
        self
    }

    /// 登记到注册表的进程ID，默认为当前进程
    pub fn pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn registry_timeout(mut self, registry_timeout: Duration) -> Self {
        self.registry_timeout = registry_timeout;
        self
    }

    pub fn shutdown(mut self, shutdown_rx: broadcast::Receiver<()>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    pub fn build(self) -> WatchtowerResult<WorkerRuntime> {
        if self.spec.worker_id.is_empty() {
            return Err(WatchtowerError::config_error("worker_id不能为空"));
        }
        if self.spec.queue.is_empty() {
            return Err(WatchtowerError::config_error("队列不能为空"));
        }

        let heartbeat = HeartbeatManager::new(
            self.spec.worker_id.clone(),
            self.registry,
            self.registry_timeout,
        );
        Ok(WorkerRuntime {
            spec: self.spec,
            pid: self.pid,
            state: RuntimeState::Starting,
            mailbox: self.mailbox,
            heartbeat,
            engine: self.engine,
            memory_probe: self.memory_probe,
            poll_interval: self.poll_interval,
            shutdown_rx: self.shutdown_rx,
            booted_at: None,
            started_after_restart: false,
        })
    }
}

impl WorkerRuntime {
    pub fn builder(
        spec: WorkerLaunchSpec,
        registry: Arc<dyn WorkerRegistry>,
        mailbox: CommandMailbox,
        engine: Arc<dyn JobEngine>,
    ) -> WorkerRuntimeBuilder {
        WorkerRuntimeBuilder::new(spec, registry, mailbox, engine)
    }

    pub fn worker_id(&self) -> &str {
        &self.spec.worker_id
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// 本进程是否在最近一次全量重启请求之后启动
    pub fn started_after_restart(&self) -> bool {
        self.started_after_restart
    }

    /// 运行直到停止，返回停止原因
    pub async fn run(&mut self) -> WatchtowerResult<StopReason> {
        self.boot().await;

        while !self.state.is_stopping() {
            self.check_shutdown_signal();
            self.poll_commands().await;

            if self.state.is_paused() {
                self.wait_while_paused().await;
                continue;
            }

            if self.state.stop_reason().is_some_and(|r| r.is_immediate()) {
                break;
            }

            self.heartbeat.beat().await;
            self.run_one_job().await;
            self.check_memory();
        }

        Ok(self.finish().await)
    }

    async fn boot(&mut self) {
        let now = Utc::now();
        self.booted_at = Some(now);

        info!(
            worker_id = %self.spec.worker_id,
            queue = %self.spec.queue,
            supervisor = %self.spec.options.supervisor,
            "启动Worker"
        );

        let record = WorkerRecord {
            worker_id: self.spec.worker_id.clone(),
            supervisor: self.spec.options.supervisor.clone(),
            queue: self.spec.queue.clone(),
            pid: self.pid,
            status: WorkerStatus::Running,
            started_at: now,
            last_heartbeat: Some(now),
        };
        self.heartbeat.register(&record).await;

        match self.mailbox.restart_at().await {
            Ok(Some(restart_at)) => {
                self.started_after_restart = now >= restart_at;
                info!(
                    worker_id = %self.spec.worker_id,
                    "最近一次全量重启请求: {}，本进程{}该请求之后启动",
                    restart_at,
                    if self.started_after_restart { "在" } else { "不在" }
                );
            }
            Ok(None) => {}
            Err(e) if e.is_transient() => {
                warn!(worker_id = %self.spec.worker_id, "读取重启时间失败: {}", e)
            }
            Err(e) => error!(worker_id = %self.spec.worker_id, "读取重启时间失败: {}", e),
        }

        self.state = RuntimeState::Running;
    }

    fn check_shutdown_signal(&mut self) {
        let Some(rx) = self.shutdown_rx.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(()) | Err(TryRecvError::Lagged(_)) => {
                info!(worker_id = %self.spec.worker_id, "收到关闭信号");
                self.state = RuntimeState::Stopping(StopReason::Shutdown);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {}
        }
    }

    async fn poll_commands(&mut self) {
        let command = match self.mailbox.take(&self.spec.worker_id).await {
            Ok(Some(command)) => command,
            Ok(None) => return,
            Err(WatchtowerError::InvalidCommand(token)) => {
                warn!(worker_id = %self.spec.worker_id, "忽略无法识别的命令: {}", token);
                return;
            }
            Err(e) if e.is_transient() => {
                warn!(worker_id = %self.spec.worker_id, "读取控制命令失败，下一轮重试: {}", e);
                return;
            }
            Err(e) => {
                error!(worker_id = %self.spec.worker_id, "读取控制命令失败: {}", e);
                return;
            }
        };

        self.apply_command(command).await;
    }

    async fn apply_command(&mut self, command: ControlCommand) {
        info!(worker_id = %self.spec.worker_id, "收到{}命令", command);
        metrics::counter!("watchtower_worker_commands_received_total", "command" => command.as_str())
            .increment(1);

        let result = transition(self.state, command);
        debug!(
            worker_id = %self.spec.worker_id,
            "状态转移: {} -> {}",
            self.state,
            result.next
        );
        self.state = result.next;

        if let Some(status) = result.status {
            self.heartbeat.update_status(status).await;
        }
    }

    async fn wait_while_paused(&mut self) {
        while self.state.is_paused() {
            tokio::time::sleep(self.poll_interval).await;
            self.check_shutdown_signal();
            if self.state.is_stopping() {
                break;
            }
            self.poll_commands().await;
            self.heartbeat.beat().await;
        }
    }

    async fn run_one_job(&self) {
        let options = &self.spec.options;
        let job = self
            .engine
            .run_next_job(&options.connection, &self.spec.queue, options);

        match tokio::time::timeout(options.timeout_duration(), job).await {
            Ok(Ok(())) => {
                metrics::counter!("watchtower_worker_job_runs_total", "result" => "ok").increment(1);
            }
            Ok(Err(e)) => {
                metrics::counter!("watchtower_worker_job_runs_total", "result" => "error").increment(1);
                error!(
                    worker_id = %self.spec.worker_id,
                    queue = %self.spec.queue,
                    "处理任务出错: {}",
                    e
                );
                if options.sleep > 0 {
                    tokio::time::sleep(Duration::from_secs(options.sleep)).await;
                }
            }
            Err(_) => {
                metrics::counter!("watchtower_worker_job_runs_total", "result" => "timeout").increment(1);
                error!(
                    worker_id = %self.spec.worker_id,
                    queue = %self.spec.queue,
                    "处理任务出错: {}",
                    WatchtowerError::ExecutionTimeout
                );
            }
        }
    }

    fn check_memory(&mut self) {
        if self.state.is_stopping() {
            return;
        }
        let Some(bytes) = self.memory_probe.as_ref().and_then(|p| p.resident_bytes()) else {
            return;
        };
        let used_mb = bytes / BYTES_PER_MB;
        if used_mb >= self.spec.options.memory {
            info!(
                worker_id = %self.spec.worker_id,
                "内存超过上限({}MB >= {}MB)，停止Worker",
                used_mb,
                self.spec.options.memory
            );
            self.state = RuntimeState::Stopping(StopReason::MemoryLimit);
        }
    }

    async fn finish(&mut self) -> StopReason {
        let reason = self.state.stop_reason().unwrap_or(StopReason::Requested);
        self.state = RuntimeState::Stopped(reason);

        self.heartbeat.update_status(WorkerStatus::Stopped).await;
        if let Err(e) = self.mailbox.clear(&self.spec.worker_id).await {
            warn!(worker_id = %self.spec.worker_id, "清理残留命令失败: {}", e);
        }

        let uptime = self
            .booted_at
            .map(|at| (Utc::now() - at).num_seconds())
            .unwrap_or(0);
        info!(
            worker_id = %self.spec.worker_id,
            "Worker已停止: reason={:?}, uptime={}s",
            reason,
            uptime
        );
        reason
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{error, info, warn};
use watchtower_core::{SupervisorConfig, WatchtowerResult, WorkerRuntimeConfig};
use watchtower_domain::{QueueInspector, WorkerOptions};

use crate::queue_assignment::{plan_assignments, resolve_queues};
use crate::worker_manager::WorkerManager;

/// 调和循环的时间参数
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub poll_interval: Duration,
    pub stale_threshold_seconds: i64,
    pub status_interval: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            stale_threshold_seconds: 60,
            status_interval: Duration::from_secs(30),
        }
    }
}

impl From<&WorkerRuntimeConfig> for SupervisorSettings {
    fn from(config: &WorkerRuntimeConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            stale_threshold_seconds: config.stale_threshold_seconds,
            status_interval: config.status_interval(),
        }
    }
}

/// 调和循环自身持有的可变状态
#[derive(Debug, Default)]
pub struct SupervisorState {
    pub last_status_at: Option<Instant>,
    pub passes: u64,
}

impl SupervisorState {
    /// 距上次输出超过 `interval` 时返回true并记录本次时间
    pub fn status_due(&mut self, now: Instant, interval: Duration) -> bool {
        match self.last_status_at {
            Some(last) if now.duration_since(last) < interval => false,
            _ => {
                self.last_status_at = Some(now);
                true
            }
        }
    }
}

/// 一轮调和的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub queues: Vec<String>,
    pub stale_repaired: usize,
    /// 本轮开始时处于running/paused的Worker数
    pub active_before: usize,
    pub started: Vec<String>,
    pub dead: Vec<String>,
    pub replaced: Vec<String>,
}

impl PassReport {
    pub fn active_after(&self) -> usize {
        self.active_before + self.started.len() + self.replaced.len() - self.dead.len()
    }
}

/// 单个Supervisor配置的调和循环
///
/// 只维护 `min_processes` 下限；`max_processes` 不参与任何决策。
pub struct Supervisor {
    name: String,
    config: SupervisorConfig,
    options: WorkerOptions,
    manager: Arc<WorkerManager>,
    inspector: Option<Arc<dyn QueueInspector>>,
    settings: SupervisorSettings,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(
        name: impl Into<String>,
        config: SupervisorConfig,
        manager: Arc<WorkerManager>,
        settings: SupervisorSettings,
    ) -> Self {
        let name = name.into();
        let options = WorkerOptions::from_supervisor(&name, &config);
        Self {
            name,
            config,
            options,
            manager,
            inspector: None,
            settings,
            state: SupervisorState::default(),
        }
    }

    /// 通配符队列配置使用的队列发现
    pub fn with_inspector(mut self, inspector: Arc<dyn QueueInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// 运行直到收到终止标志或关闭信号，退出前停止全部Worker
    ///
    /// 返回退出时被停止的Worker数量。
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> WatchtowerResult<usize> {
        info!(
            supervisor = %self.name,
            queue = %self.config.queue,
            "启动Supervisor, min_processes={}, max_processes={}",
            self.config.min_processes,
            self.config.max_processes
        );

        loop {
            match self.manager.take_terminate_request().await {
                Ok(true) => {
                    info!(supervisor = %self.name, "收到终止标志");
                    break;
                }
                Ok(false) => {}
                Err(e) if e.is_transient() => {
                    warn!(supervisor = %self.name, "读取终止标志失败，下一轮重试: {}", e)
                }
                Err(e) => error!(supervisor = %self.name, "读取终止标志失败: {}", e),
            }

            match self.supervise().await {
                Ok(report) => {
                    self.state.passes += 1;
                    self.emit_status(&report);
                }
                Err(e) if e.is_transient() => {
                    warn!(supervisor = %self.name, "Supervisor调和出错，下一轮重试: {}", e)
                }
                Err(e) => error!(supervisor = %self.name, "Supervisor调和出错: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = shutdown_rx.recv() => {
                    info!(supervisor = %self.name, "收到关闭信号");
                    break;
                }
            }
        }

        info!(supervisor = %self.name, "Supervisor正在退出");
        self.manager.terminate_all_workers().await
    }

    /// 执行一轮调和
    pub async fn supervise(&self) -> WatchtowerResult<PassReport> {
        let mut report = PassReport {
            queues: resolve_queues(&self.config.queue, self.inspector.as_deref()).await,
            ..PassReport::default()
        };

        report.stale_repaired = self
            .manager
            .cleanup_stale_workers(self.settings.stale_threshold_seconds)
            .await?;
        if report.stale_repaired > 0 {
            warn!(supervisor = %self.name, "已修复 {} 个过期Worker", report.stale_repaired);
        }

        let workers = self.manager.active_workers(&self.name).await?;
        report.active_before = workers.len();
        let min = self.config.min_processes;

        if workers.len() < min {
            let to_start = min - workers.len();
            info!(supervisor = %self.name, "启动 {} 个Worker以满足最小数量", to_start);
            for queue in plan_assignments(self.config.balance, &report.queues, to_start) {
                let worker_id = self.manager.start_worker(&queue, &self.options).await?;
                report.started.push(worker_id);
            }
        }

        let mut alive = workers.len();
        for worker in &workers {
            if self.manager.is_process_running(worker.pid).await {
                continue;
            }

            warn!(
                supervisor = %self.name,
                worker_id = %worker.worker_id,
                "Worker进程已不存在，标记为stopped"
            );
            self.manager.mark_stopped(&worker.worker_id).await?;
            report.dead.push(worker.worker_id.clone());
            alive -= 1;

            if alive <= min {
                let worker_id = self.manager.start_worker(&worker.queue, &self.options).await?;
                info!(
                    supervisor = %self.name,
                    worker_id = %worker_id,
                    queue = %worker.queue,
                    "已在原队列上启动替补Worker"
                );
                metrics::counter!("watchtower_workers_replaced_total", "supervisor" => self.name.clone())
                    .increment(1);
                report.replaced.push(worker_id);
                alive += 1;
            }
        }

        metrics::gauge!("watchtower_active_workers", "supervisor" => self.name.clone())
            .set(report.active_after() as f64);
        Ok(report)
    }

    fn emit_status(&mut self, report: &PassReport) {
        if self
            .state
            .status_due(Instant::now(), self.settings.status_interval)
        {
            info!(
                supervisor = %self.name,
                "[{}] Active workers: {}",
                self.name,
                report.active_after()
            );
        }
    }
}

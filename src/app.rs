use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use redis::aio::ConnectionManager;
use tracing::info;
use watchtower_core::AppConfig;
use watchtower_domain::{
    CommandMailbox, ControlKeys, WorkerLaunchSpec, WorkerOptions, WorkerRecord, WorkerRegistry,
};
use watchtower_infrastructure::{
    connect_redis, CommandJobEngine, CommandProcessLauncher, DatabaseManager,
    PlatformProcessProbe, ProcessMemoryProbe, RedisControlChannel, RedisQueueInspector,
    SqliteWorkerRegistry, TracingJobMonitor,
};
use watchtower_supervisor::{Supervisor, SupervisorSettings, WorkerManager};
use watchtower_worker::{StopReason, WorkerRuntime};

use crate::shutdown::ShutdownManager;

/// 应用装配：按子命令组装注册表、控制通道、启动器等组件
pub struct Application {
    config: AppConfig,
    config_path: Option<String>,
}

impl Application {
    pub fn new(config: AppConfig, config_path: Option<String>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    async fn registry(&self) -> Result<Arc<dyn WorkerRegistry>> {
        let database = DatabaseManager::new(&self.config.database)
            .await
            .context("连接Worker注册表数据库失败")?;
        database.migrate().await.context("数据库迁移失败")?;
        Ok(Arc::new(SqliteWorkerRegistry::new(database.pool().clone())))
    }

    async fn redis(&self) -> Result<ConnectionManager> {
        connect_redis(&self.config.redis)
            .await
            .context("连接Redis失败")
    }

    fn mailbox(&self, conn: ConnectionManager) -> CommandMailbox {
        CommandMailbox::new(
            Arc::new(RedisControlChannel::new(conn)),
            ControlKeys::new(self.config.redis.key_prefix.clone()),
            self.config.worker.command_ttl(),
        )
    }

    /// `forward_stderr` 只应由常驻进程开启，一次性命令退出后管道会断开
    async fn worker_manager(
        &self,
        conn: ConnectionManager,
        forward_stderr: bool,
    ) -> Result<Arc<WorkerManager>> {
        let registry = self.registry().await?;
        let launcher = CommandProcessLauncher::current_exe(
            self.config_path.as_deref(),
            Arc::new(PlatformProcessProbe::default()),
            self.config.worker.startup_grace(),
        )?
        .with_stderr_forwarding(forward_stderr);
        Ok(Arc::new(WorkerManager::new(
            registry,
            Arc::new(launcher),
            self.mailbox(conn),
        )))
    }

    /// Supervisor配置存在时以其派生选项，否则使用默认选项
    pub fn worker_options(&self, supervisor: &str) -> WorkerOptions {
        match self.config.supervisor(supervisor) {
            Ok(config) => WorkerOptions::from_supervisor(supervisor, config),
            Err(_) => WorkerOptions {
                supervisor: supervisor.to_string(),
                ..WorkerOptions::default()
            },
        }
    }

    /// 运行Supervisor直到终止标志或关闭信号
    pub async fn run_supervisor(&self, name: &str, shutdown: &ShutdownManager) -> Result<usize> {
        let supervisor_config = self.config.supervisor(name)?.clone();
        let conn = self.redis().await?;
        let manager = self.worker_manager(conn.clone(), true).await?;
        let inspector =
            RedisQueueInspector::new(conn, self.config.worker.queue_key_prefix.clone());

        let mut supervisor = Supervisor::new(
            name,
            supervisor_config,
            manager,
            SupervisorSettings::from(&self.config.worker),
        )
        .with_inspector(Arc::new(inspector));

        let stopped = supervisor.run(shutdown.subscribe().await).await?;
        info!(supervisor = %name, "Supervisor已退出，停止了 {} 个Worker", stopped);
        Ok(stopped)
    }

    /// 在当前进程中运行一个Worker
    pub async fn run_worker(
        &self,
        worker_id: String,
        queue: &str,
        options: WorkerOptions,
        shutdown: &ShutdownManager,
    ) -> Result<StopReason> {
        let registry = self.registry().await?;
        let mailbox = self.mailbox(self.redis().await?);
        let engine = CommandJobEngine::new(
            self.config.worker.job_command.clone(),
            worker_id.clone(),
            Arc::new(TracingJobMonitor),
        )?;

        let spec = WorkerLaunchSpec {
            worker_id,
            queue: queue.to_string(),
            options,
        };
        let mut runtime = WorkerRuntime::builder(spec, registry, mailbox, Arc::new(engine))
            .memory_probe(Arc::new(ProcessMemoryProbe))
            .poll_interval(self.config.worker.poll_interval())
            .registry_timeout(self.config.worker.registry_timeout())
            .shutdown(shutdown.subscribe().await)
            .build()?;

        Ok(runtime.run().await?)
    }

    pub async fn start(&self, queue: &str, supervisor: &str) -> Result<String> {
        let manager = self.worker_manager(self.redis().await?, false).await?;
        let options = self.worker_options(supervisor);
        Ok(manager.start_worker(queue, &options).await?)
    }

    pub async fn stop(&self, worker_id: &str) -> Result<()> {
        let manager = self.worker_manager(self.redis().await?, false).await?;
        Ok(manager.stop_worker(worker_id).await?)
    }

    pub async fn pause(&self, worker_id: &str) -> Result<()> {
        let manager = self.worker_manager(self.redis().await?, false).await?;
        Ok(manager.pause_worker(worker_id).await?)
    }

    pub async fn resume(&self, worker_id: &str) -> Result<()> {
        let manager = self.worker_manager(self.redis().await?, false).await?;
        Ok(manager.resume_worker(worker_id).await?)
    }

    pub async fn list(&self) -> Result<Vec<WorkerRecord>> {
        Ok(self.registry().await?.list().await?)
    }

    pub async fn cleanup(&self, threshold_seconds: Option<i64>) -> Result<usize> {
        let threshold =
            threshold_seconds.unwrap_or(self.config.worker.stale_threshold_seconds);
        let manager = self.worker_manager(self.redis().await?, false).await?;
        Ok(manager.cleanup_stale_workers(threshold).await?)
    }

    pub async fn restart(&self, queue: Option<&str>, force: bool) -> Result<usize> {
        let manager = self.worker_manager(self.redis().await?, false).await?;
        Ok(manager.restart_workers(queue, force).await?)
    }

    pub async fn terminate(&self) -> Result<()> {
        let mailbox = self.mailbox(self.redis().await?);
        Ok(mailbox.request_terminate().await?)
    }

    pub async fn prune(&self, older_than_hours: i64) -> Result<u64> {
        let cutoff = Utc::now() - ChronoDuration::hours(older_than_hours);
        Ok(self.registry().await?.prune_stopped(cutoff).await?)
    }
}

/// 以表格形式输出Worker列表
pub fn print_workers(workers: &[WorkerRecord], now: DateTime<Utc>) {
    if workers.is_empty() {
        println!("没有找到Worker");
        return;
    }

    println!(
        "{:<36} {:<12} {:<20} {:<10} {:<8} {:<20} {:<10}",
        "ID", "Supervisor", "队列", "状态", "PID", "最后心跳", "运行时长"
    );
    println!("{}", "-".repeat(122));

    for worker in workers {
        let pid = worker
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let heartbeat = worker
            .last_heartbeat
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36} {:<12} {:<20} {:<10} {:<8} {:<20} {:<10}",
            worker.worker_id,
            worker.supervisor,
            worker.queue,
            worker.status.as_str(),
            pid,
            heartbeat,
            format_uptime(worker.uptime(now)),
        );
    }
}

/// 运行时长格式化为 `1h 2m 3s`
pub fn format_uptime(uptime: ChronoDuration) -> String {
    let total = uptime.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

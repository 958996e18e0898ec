use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::{
    CommandMailbox, ControlCommand, ProcessLauncher, WorkerLaunchSpec, WorkerOptions,
    WorkerRecord, WorkerRegistry, WorkerStatus,
};

/// Worker生命周期管理
///
/// 命令下发后立即乐观更新注册表状态，不等待Worker确认；
/// 实际状态在一个轮询周期内与之收敛。
pub struct WorkerManager {
    registry: Arc<dyn WorkerRegistry>,
    launcher: Arc<dyn ProcessLauncher>,
    mailbox: CommandMailbox,
}

impl WorkerManager {
    pub fn new(
        registry: Arc<dyn WorkerRegistry>,
        launcher: Arc<dyn ProcessLauncher>,
        mailbox: CommandMailbox,
    ) -> Self {
        Self {
            registry,
            launcher,
            mailbox,
        }
    }

    /// 启动一个Worker进程并登记，返回新的worker_id
    ///
    /// 进程启动失败不单独报告：记录以空pid写入，之后由过期清理修复。
    pub async fn start_worker(&self, queue: &str, options: &WorkerOptions) -> WatchtowerResult<String> {
        let worker_id = Uuid::new_v4().to_string();
        let spec = WorkerLaunchSpec {
            worker_id: worker_id.clone(),
            queue: queue.to_string(),
            options: options.clone(),
        };

        let pid = match self.launcher.spawn(&spec).await {
            Ok(pid) => pid,
            Err(e) => {
                error!(worker_id = %worker_id, queue, "启动Worker进程失败: {}", e);
                None
            }
        };

        let record = WorkerRecord::new(&worker_id, &options.supervisor, queue).with_pid(pid);
        self.registry.upsert(&record).await?;

        metrics::counter!("watchtower_workers_started_total", "supervisor" => options.supervisor.clone())
            .increment(1);
        info!(
            worker_id = %worker_id,
            queue,
            supervisor = %options.supervisor,
            "已启动Worker, pid={:?}",
            pid
        );
        Ok(worker_id)
    }

    async fn send_command(
        &self,
        worker_id: &str,
        command: ControlCommand,
        status: WorkerStatus,
    ) -> WatchtowerResult<()> {
        let record = self
            .registry
            .find_by_id(worker_id)
            .await?
            .ok_or_else(|| WatchtowerError::worker_not_found(worker_id))?;

        // stopped/restarting 是终态方向，不能被乐观状态写回 running/paused
        if !record.is_active() {
            if command == ControlCommand::Stop {
                debug!(worker_id, status = %record.status.as_str(), "Worker已不在运行，忽略停止命令");
                return Ok(());
            }
            return Err(WatchtowerError::invalid_worker_state(
                worker_id,
                record.status.as_str(),
            ));
        }

        self.mailbox.send(worker_id, command).await?;
        self.registry.update_status(worker_id, status).await?;

        metrics::counter!("watchtower_commands_sent_total", "command" => command.as_str()).increment(1);
        debug!(worker_id, "已发送{}命令", command);
        Ok(())
    }

    pub async fn stop_worker(&self, worker_id: &str) -> WatchtowerResult<()> {
        self.send_command(worker_id, ControlCommand::Stop, WorkerStatus::Stopped)
            .await
    }

    pub async fn pause_worker(&self, worker_id: &str) -> WatchtowerResult<()> {
        self.send_command(worker_id, ControlCommand::Pause, WorkerStatus::Paused)
            .await
    }

    pub async fn resume_worker(&self, worker_id: &str) -> WatchtowerResult<()> {
        self.send_command(worker_id, ControlCommand::Resume, WorkerStatus::Running)
            .await
    }

    /// 对运行中的Worker发送重启（`force` 时为终止）命令，可按队列精确过滤
    ///
    /// 有命令发出时记录全局重启时间，返回收到命令的Worker数量。
    pub async fn restart_workers(&self, queue: Option<&str>, force: bool) -> WatchtowerResult<usize> {
        let command = if force {
            ControlCommand::Terminate
        } else {
            ControlCommand::Restart
        };

        let targets: Vec<WorkerRecord> = self
            .registry
            .list_by_status(&[WorkerStatus::Running])
            .await?
            .into_iter()
            .filter(|w| queue.map_or(true, |q| w.queue == q))
            .collect();

        if targets.is_empty() {
            info!("没有匹配的运行中Worker");
            return Ok(0);
        }

        for worker in &targets {
            self.mailbox.send(&worker.worker_id, command).await?;
            info!(worker_id = %worker.worker_id, queue = %worker.queue, "已发送{}命令", command);
        }
        self.mailbox.set_restart_at(Utc::now()).await?;

        metrics::counter!("watchtower_commands_sent_total", "command" => command.as_str())
            .increment(targets.len() as u64);
        Ok(targets.len())
    }

    /// 全部记录，按启动时间倒序
    pub async fn list_workers(&self) -> WatchtowerResult<Vec<WorkerRecord>> {
        self.registry.list().await
    }

    pub async fn running_workers(&self) -> WatchtowerResult<Vec<WorkerRecord>> {
        self.registry.list_by_status(&[WorkerStatus::Running]).await
    }

    /// 指定Supervisor下处于running/paused的Worker
    pub async fn active_workers(&self, supervisor: &str) -> WatchtowerResult<Vec<WorkerRecord>> {
        self.registry
            .list_for_supervisor(supervisor, &WorkerStatus::ACTIVE)
            .await
    }

    pub async fn is_worker_running(&self, worker_id: &str) -> WatchtowerResult<bool> {
        match self.registry.find_by_id(worker_id).await? {
            Some(record) => Ok(self.is_process_running(record.pid).await),
            None => Ok(false),
        }
    }

    pub async fn is_process_running(&self, pid: Option<u32>) -> bool {
        self.launcher.is_running(pid).await
    }

    pub async fn mark_stopped(&self, worker_id: &str) -> WatchtowerResult<()> {
        self.registry.update_status(worker_id, WorkerStatus::Stopped).await
    }

    /// 将心跳过期且进程已不存在的running/paused记录标记为stopped
    ///
    /// 进程仍存活的记录无论心跳多旧都保持不变。
    pub async fn cleanup_stale_workers(&self, threshold_seconds: i64) -> WatchtowerResult<usize> {
        let stale = self
            .registry
            .list_stale(threshold_seconds, &WorkerStatus::ACTIVE)
            .await?;

        let mut count = 0;
        for worker in stale {
            if self.is_process_running(worker.pid).await {
                debug!(worker_id = %worker.worker_id, "心跳过期但进程仍存活");
                continue;
            }
            match self.mark_stopped(&worker.worker_id).await {
                Ok(()) => count += 1,
                Err(WatchtowerError::WorkerNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        if count > 0 {
            metrics::counter!("watchtower_stale_workers_repaired_total").increment(count as u64);
        }
        Ok(count)
    }

    /// 停止所有running/paused的Worker，单个失败只记录日志
    pub async fn terminate_all_workers(&self) -> WatchtowerResult<usize> {
        let workers = self.registry.list_by_status(&WorkerStatus::ACTIVE).await?;
        let mut stopped = 0;
        for worker in workers {
            match self.stop_worker(&worker.worker_id).await {
                Ok(()) => stopped += 1,
                Err(e) => warn!(worker_id = %worker.worker_id, "停止Worker失败: {}", e),
            }
        }
        info!("已向 {} 个Worker发送停止命令", stopped);
        Ok(stopped)
    }

    /// 请求所有Supervisor退出
    pub async fn request_terminate(&self) -> WatchtowerResult<()> {
        self.mailbox.request_terminate().await
    }

    /// 消费全局终止标志
    pub async fn take_terminate_request(&self) -> WatchtowerResult<bool> {
        self.mailbox.take_terminate().await
    }

    /// 删除最后活动早于 `older_than` 的已停止记录
    pub async fn prune_stopped(&self, older_than: DateTime<Utc>) -> WatchtowerResult<u64> {
        let removed = self.registry.prune_stopped(older_than).await?;
        if removed > 0 {
            info!("已清理 {} 条已停止的Worker记录", removed);
        }
        Ok(removed)
    }
}

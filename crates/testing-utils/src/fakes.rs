//! Hand-written test doubles with observable state

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use watchtower_core::{WatchtowerError, WatchtowerResult};
use watchtower_domain::{
    ControlChannel, JobEngine, MemoryProbe, ProcessLauncher, WorkerLaunchSpec, WorkerOptions,
    WorkerRecord, WorkerRegistry, WorkerStatus,
};

/// 进程启动器替身
///
/// 每次spawn分配递增pid并视为存活；测试可通过 `kill` 模拟进程退出。
#[derive(Debug, Clone)]
pub struct FakeProcessLauncher {
    spawned: Arc<Mutex<Vec<WorkerLaunchSpec>>>,
    alive: Arc<Mutex<HashSet<u32>>>,
    next_pid: Arc<Mutex<u32>>,
    fail_spawns: Arc<AtomicUsize>,
}

impl FakeProcessLauncher {
    pub fn new() -> Self {
        Self {
            spawned: Arc::new(Mutex::new(Vec::new())),
            alive: Arc::new(Mutex::new(HashSet::new())),
            next_pid: Arc::new(Mutex::new(10_000)),
            fail_spawns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 接下来的 `count` 次spawn返回错误
    pub fn fail_next_spawns(&self, count: usize) {
        self.fail_spawns.store(count, Ordering::SeqCst);
    }

    pub fn kill(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }

    pub fn set_alive(&self, pid: u32) {
        self.alive.lock().unwrap().insert(pid);
    }

    pub fn spawned(&self) -> Vec<WorkerLaunchSpec> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }

    pub fn spawned_queues(&self) -> Vec<String> {
        self.spawned().into_iter().map(|spec| spec.queue).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.alive.lock().unwrap().len()
    }
}

impl Default for FakeProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLauncher for FakeProcessLauncher {
    async fn spawn(&self, spec: &WorkerLaunchSpec) -> WatchtowerResult<Option<u32>> {
        let remaining = self.fail_spawns.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_spawns.store(remaining - 1, Ordering::SeqCst);
            return Err(WatchtowerError::ProcessSpawn(format!(
                "fake spawn failure for {}",
                spec.worker_id
            )));
        }

        let pid = {
            let mut next = self.next_pid.lock().unwrap();
            *next += 1;
            *next
        };
        self.spawned.lock().unwrap().push(spec.clone());
        self.alive.lock().unwrap().insert(pid);
        Ok(Some(pid))
    }

    async fn is_running(&self, pid: Option<u32>) -> bool {
        match pid {
            Some(pid) => self.alive.lock().unwrap().contains(&pid),
            None => false,
        }
    }
}

/// 一次任务调用的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCall {
    pub connection: String,
    pub queue: String,
    pub options: WorkerOptions,
}

/// 按脚本依次返回结果的任务引擎，脚本耗尽后返回Ok
#[derive(Debug, Clone, Default)]
pub struct ScriptedJobEngine {
    script: Arc<Mutex<VecDeque<WatchtowerResult<()>>>>,
    calls: Arc<Mutex<Vec<JobCall>>>,
    delay: Option<Duration>,
}

impl ScriptedJobEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用前等待 `delay`，模拟任务执行耗时
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_result(&self, result: WatchtowerResult<()>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<JobCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobEngine for ScriptedJobEngine {
    async fn run_next_job(
        &self,
        connection: &str,
        queue: &str,
        options: &WorkerOptions,
    ) -> WatchtowerResult<()> {
        self.calls.lock().unwrap().push(JobCall {
            connection: connection.to_string(),
            queue: queue.to_string(),
            options: options.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// 返回可调整数值的内存探针
#[derive(Debug, Clone, Default)]
pub struct FakeMemoryProbe {
    bytes: Arc<AtomicU64>,
}

impl FakeMemoryProbe {
    pub fn new(megabytes: u64) -> Self {
        let probe = Self::default();
        probe.set_megabytes(megabytes);
        probe
    }

    pub fn set_megabytes(&self, megabytes: u64) {
        self.bytes.store(megabytes * 1024 * 1024, Ordering::SeqCst);
    }
}

impl MemoryProbe for FakeMemoryProbe {
    fn resident_bytes(&self) -> Option<u64> {
        Some(self.bytes.load(Ordering::SeqCst))
    }
}

/// 剩余失败次数计数，每次消费一次
#[derive(Debug, Clone, Default)]
struct FailureBudget(Arc<AtomicUsize>);

impl FailureBudget {
    fn set(&self, count: usize) {
        self.0.store(count, Ordering::SeqCst);
    }

    fn remaining(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn consume(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// 读操作可注入失败的控制通道，写操作直接透传
#[derive(Clone)]
pub struct FailingControlChannel {
    inner: Arc<dyn ControlChannel>,
    failures: FailureBudget,
}

impl FailingControlChannel {
    pub fn new(inner: Arc<dyn ControlChannel>) -> Self {
        Self {
            inner,
            failures: FailureBudget::default(),
        }
    }

    /// 接下来的 `count` 次读取返回ControlChannel错误
    pub fn fail_next_reads(&self, count: usize) {
        self.failures.set(count);
    }

    pub fn remaining_failures(&self) -> usize {
        self.failures.remaining()
    }

    fn check(&self, key: &str) -> WatchtowerResult<()> {
        if self.failures.consume() {
            return Err(WatchtowerError::control_channel(format!(
                "fake read failure for {key}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlChannel for FailingControlChannel {
    async fn get(&self, key: &str) -> WatchtowerResult<Option<String>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> WatchtowerResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> WatchtowerResult<()> {
        self.inner.delete(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> WatchtowerResult<()> {
        self.inner.expire(key, ttl).await
    }

    async fn take(&self, key: &str) -> WatchtowerResult<Option<String>> {
        self.check(key)?;
        self.inner.take(key).await
    }
}

/// 查询可注入失败的注册表，写操作直接透传
#[derive(Clone)]
pub struct FailingWorkerRegistry {
    inner: Arc<dyn WorkerRegistry>,
    failures: FailureBudget,
}

impl FailingWorkerRegistry {
    pub fn new(inner: Arc<dyn WorkerRegistry>) -> Self {
        Self {
            inner,
            failures: FailureBudget::default(),
        }
    }

    /// 接下来的 `count` 次查询返回Database错误
    pub fn fail_next_reads(&self, count: usize) {
        self.failures.set(count);
    }

    pub fn remaining_failures(&self) -> usize {
        self.failures.remaining()
    }

    fn check(&self) -> WatchtowerResult<()> {
        if self.failures.consume() {
            return Err(WatchtowerError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerRegistry for FailingWorkerRegistry {
    async fn upsert(&self, record: &WorkerRecord) -> WatchtowerResult<()> {
        self.inner.upsert(record).await
    }

    async fn find_by_id(&self, worker_id: &str) -> WatchtowerResult<Option<WorkerRecord>> {
        self.check()?;
        self.inner.find_by_id(worker_id).await
    }

    async fn list(&self) -> WatchtowerResult<Vec<WorkerRecord>> {
        self.check()?;
        self.inner.list().await
    }

    async fn list_by_status(&self, statuses: &[WorkerStatus]) -> WatchtowerResult<Vec<WorkerRecord>> {
        self.check()?;
        self.inner.list_by_status(statuses).await
    }

    async fn list_for_supervisor(
        &self,
        supervisor: &str,
        statuses: &[WorkerStatus],
    ) -> WatchtowerResult<Vec<WorkerRecord>> {
        self.check()?;
        self.inner.list_for_supervisor(supervisor, statuses).await
    }

    async fn list_stale(
        &self,
        threshold_seconds: i64,
        statuses: &[WorkerStatus],
    ) -> WatchtowerResult<Vec<WorkerRecord>> {
        self.check()?;
        self.inner.list_stale(threshold_seconds, statuses).await
    }

    async fn update_status(&self, worker_id: &str, status: WorkerStatus) -> WatchtowerResult<()> {
        self.inner.update_status(worker_id, status).await
    }

    async fn update_heartbeat(&self, worker_id: &str, at: DateTime<Utc>) -> WatchtowerResult<()> {
        self.inner.update_heartbeat(worker_id, at).await
    }

    async fn prune_stopped(&self, older_than: DateTime<Utc>) -> WatchtowerResult<u64> {
        self.inner.prune_stopped(older_than).await
    }
}

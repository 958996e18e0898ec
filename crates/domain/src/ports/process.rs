use async_trait::async_trait;
use watchtower_core::WatchtowerResult;

use crate::value_objects::WorkerLaunchSpec;

/// 进程存活探测，按平台提供实现
///
/// 约定：没有pid即不存活，且探测没有副作用。
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    async fn is_alive(&self, pid: Option<u32>) -> bool;
}

/// 启动运行Worker运行时的操作系统进程
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// 非阻塞启动，返回观察到的pid
    async fn spawn(&self, spec: &WorkerLaunchSpec) -> WatchtowerResult<Option<u32>>;

    async fn is_running(&self, pid: Option<u32>) -> bool;
}

/// 当前进程的内存占用
pub trait MemoryProbe: Send + Sync {
    /// 常驻内存字节数，平台不支持时返回None
    fn resident_bytes(&self) -> Option<u64>;
}

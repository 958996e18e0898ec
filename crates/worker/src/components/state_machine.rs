//! Worker运行时状态机
//!
//! 状态只能沿 Starting → Running ⇄ Paused → Stopping → Stopped 前进。
//! 命令到状态的映射集中在 [`transition`]，对每个组合穷举处理。

use std::fmt;

use watchtower_domain::{ControlCommand, WorkerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 收到stop命令
    Requested,
    /// 收到restart命令，Supervisor会补位
    Restart,
    /// 收到terminate命令，不再执行当前轮次剩余步骤
    Terminate,
    /// 内存超过上限
    MemoryLimit,
    /// 宿主进程收到关闭信号
    Shutdown,
}

impl StopReason {
    /// 是否跳过当前轮次剩余的心跳与任务
    pub fn is_immediate(&self) -> bool {
        matches!(self, StopReason::Terminate | StopReason::Shutdown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Starting,
    Running,
    Paused,
    Stopping(StopReason),
    Stopped(StopReason),
}

impl RuntimeState {
    pub fn is_paused(&self) -> bool {
        matches!(self, RuntimeState::Paused)
    }

    pub fn is_stopping(&self) -> bool {
        matches!(self, RuntimeState::Stopping(_) | RuntimeState::Stopped(_))
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            RuntimeState::Stopping(reason) | RuntimeState::Stopped(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeState::Starting => f.write_str("starting"),
            RuntimeState::Running => f.write_str("running"),
            RuntimeState::Paused => f.write_str("paused"),
            RuntimeState::Stopping(reason) => write!(f, "stopping({reason:?})"),
            RuntimeState::Stopped(reason) => write!(f, "stopped({reason:?})"),
        }
    }
}

/// 一次命令处理的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: RuntimeState,
    /// 需要立即写回注册表的状态
    pub status: Option<WorkerStatus>,
}

impl Transition {
    fn to(next: RuntimeState) -> Self {
        Self { next, status: None }
    }

    fn with_status(next: RuntimeState, status: WorkerStatus) -> Self {
        Self {
            next,
            status: Some(status),
        }
    }
}

/// 命令转移表
pub fn transition(state: RuntimeState, command: ControlCommand) -> Transition {
    use ControlCommand::*;
    use RuntimeState::*;

    match (state, command) {
        (Stopped(_), _) => Transition::to(state),

        (Stopping(_), Terminate) => Transition::to(Stopping(StopReason::Terminate)),
        (Stopping(_), Stop | Pause | Resume | Restart) => Transition::to(state),

        (Starting | Running | Paused, Terminate) => Transition::to(Stopping(StopReason::Terminate)),
        (Starting | Running | Paused, Stop) => Transition::to(Stopping(StopReason::Requested)),
        (Starting | Running | Paused, Restart) => Transition::with_status(
            Stopping(StopReason::Restart),
            WorkerStatus::Restarting,
        ),

        (Starting | Running | Paused, Pause) => Transition::with_status(Paused, WorkerStatus::Paused),
        (Starting | Running | Paused, Resume) => Transition::with_status(Running, WorkerStatus::Running),
    }
}

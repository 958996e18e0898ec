//! Worker运行时
//!
//! 通过轮询控制通道接收命令，在轮次边界完成状态转移。

pub mod components;

pub use components::{
    transition, HeartbeatManager, RuntimeState, StopReason, Transition, WorkerRuntime,
    WorkerRuntimeBuilder,
};

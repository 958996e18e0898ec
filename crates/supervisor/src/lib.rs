//! Worker池监管
//!
//! `WorkerManager` 负责单个Worker的启动、命令下发与注册表修复；
//! `Supervisor` 按配置周期性地把Worker池调和到期望状态。

pub mod queue_assignment;
pub mod supervisor;
pub mod worker_manager;

pub use queue_assignment::{plan_assignments, resolve_queues};
pub use supervisor::{PassReport, Supervisor, SupervisorSettings, SupervisorState};
pub use worker_manager::WorkerManager;

pub mod heartbeat_manager;
pub mod state_machine;
pub mod worker_lifecycle;

pub use heartbeat_manager::HeartbeatManager;
pub use state_machine::{transition, RuntimeState, StopReason, Transition};
pub use worker_lifecycle::{WorkerRuntime, WorkerRuntimeBuilder};

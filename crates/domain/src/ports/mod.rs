pub mod control_channel;
pub mod job_engine;
pub mod process;
pub mod queue;

pub use control_channel::ControlChannel;
pub use job_engine::{JobEngine, JobMonitor};
pub use process::{MemoryProbe, ProcessLauncher, ProcessProbe};
pub use queue::QueueInspector;

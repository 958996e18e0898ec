pub mod command_job_engine;
pub mod tracing_job_monitor;

pub use command_job_engine::CommandJobEngine;
pub use tracing_job_monitor::TracingJobMonitor;

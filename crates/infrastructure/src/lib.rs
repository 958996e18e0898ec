pub mod control;
pub mod database;
pub mod job;
pub mod memory_registry;
pub mod process;
pub mod queue_inspector;
pub mod redis_connection;

pub use control::{InMemoryControlChannel, RedisControlChannel};
pub use database::{DatabaseManager, SqliteWorkerRegistry};
pub use job::{CommandJobEngine, TracingJobMonitor};
pub use memory_registry::InMemoryWorkerRegistry;
pub use process::{CommandProcessLauncher, PlatformProcessProbe, ProcessMemoryProbe};
pub use queue_inspector::RedisQueueInspector;
pub use redis_connection::connect_redis;

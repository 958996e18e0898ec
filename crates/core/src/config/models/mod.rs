pub mod app_config;
pub mod database;
pub mod observability;
pub mod redis;
pub mod supervisor;
pub mod worker;

pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use observability::ObservabilityConfig;
pub use redis::RedisConfig;
pub use supervisor::{BalanceMode, QueueSelector, SupervisorConfig};
pub use worker::WorkerRuntimeConfig;

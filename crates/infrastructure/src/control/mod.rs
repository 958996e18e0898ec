pub mod memory_control_channel;
pub mod redis_control_channel;

pub use memory_control_channel::InMemoryControlChannel;
pub use redis_control_channel::RedisControlChannel;

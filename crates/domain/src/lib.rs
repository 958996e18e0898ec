//! Worker监管领域模型与端口定义
//!
//! 这里只描述数据与接口，具体的存储、控制通道和进程实现位于 infrastructure。

pub mod control;
pub mod entities;
pub mod events;
pub mod ports;
pub mod repositories;
pub mod value_objects;

pub use control::*;
pub use entities::*;
pub use events::*;
pub use ports::*;
pub use repositories::*;
pub use value_objects::*;
pub use watchtower_core::{WatchtowerError, WatchtowerResult};

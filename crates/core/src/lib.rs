pub mod config;
pub mod errors;
pub mod logging;

pub use config::*;
pub use errors::*;
pub use logging::{init_logging, LogFormat, LogLevel};

/// 统一的Result类型
pub type WatchtowerResult<T> = std::result::Result<T, WatchtowerError>;

//! # Watchtower Testing Utils
//!
//! 工作区内共享的测试替身与数据构建器。
//!
//! ```toml
//! [dev-dependencies]
//! watchtower-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! - **Fakes**: 可控制存活状态的进程启动器、按脚本返回结果的任务引擎、固定内存探针，
//!   以及读操作可注入失败的控制通道与注册表包装
//! - **Mocks**: 基于 mockall 的窄接口mock
//! - **Builders**: `WorkerRecord` 构建器

pub mod builders;
pub mod fakes;
pub mod mocks;

pub use builders::*;
pub use fakes::*;
pub use mocks::*;

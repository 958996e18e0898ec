//! Watchtower：队列Worker进程监管
//!
//! 二进制入口只负责解析参数与信号处理，组件装配位于 [`app`]。

pub mod app;
pub mod cli;
pub mod shutdown;

//! 领域层模块
//!
//! 包含通信核心逻辑和客户端接口定义

pub mod services;
pub mod impls;

// 重新导出领域服务
pub use services::*;
pub use impls::*;

//! # 日志记录模块 (Logging Module)
//!
//! ## 业务说明
//! 记录面板运行过程中的连接事件、通讯失败和操作员动作，
//! 为现场故障排查提供依据
//!
//! ## 日志策略
//! - **系统日志**: PLC连接建立、断开、冷却期跳过
//! - **通讯日志**: 变量读写失败（错误台账同步变化）
//! - **操作日志**: 按钮按下/松开、设定值写入
//!
//! ## Rust知识点
//! - **日志宏**: 使用log crate的宏系统
//! - **全局logger**: 通过 `log::set_boxed_logger` 注册自定义实现

pub mod logger_config;
pub mod panel_logger;

pub use logger_config::*;
pub use panel_logger::*;

/// 记录通讯失败日志
#[macro_export]
macro_rules! log_communication_failure {
    ($msg:expr) => {
        log::error!("[通讯失败] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::error!("[通讯失败] {}", format!($msg, $($arg)*));
    };
}

/// 记录用户操作日志
#[macro_export]
macro_rules! log_user_operation {
    ($msg:expr) => {
        log::info!("[用户操作] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::info!("[用户操作] {}", format!($msg, $($arg)*));
    };
}

/// 记录用户配置操作警告
#[macro_export]
macro_rules! log_config_warning {
    ($msg:expr) => {
        log::warn!("[配置警告] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::warn!("[配置警告] {}", format!($msg, $($arg)*));
    };
}

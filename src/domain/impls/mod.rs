//! # 领域层实现模块 (Domain Implementations)
//!
//! ## 核心实现
//! - **通信管理器**: CommunicationManager - 连接、冷却、绑定分派、错误台账
//! - **错误台账**: ErrorLedger - 按变量名记录当前失败状态
//!
//! ## Rust知识点
//! - **trait实现**: impl Trait for Struct语法
//! - **组合模式**: 管理器通过持有客户端trait对象完成I/O

pub mod communication_manager;
pub mod error_ledger;

pub use communication_manager::{raw_key, CommunicationManager, ConnectionState, ConnectionStatus};
pub use error_ledger::ErrorLedger;

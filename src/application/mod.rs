//! 应用层模块 (Application Layer)
//! 负责把面板配置装配到通信管理器上，并驱动轮询循环。

pub mod services;

// 重新导出应用层常用类型，方便上层调用
pub use services::*;

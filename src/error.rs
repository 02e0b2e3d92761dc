// 统一错误类型的顶层入口
pub use crate::utils::error::*;

/// 核心枚举定义模块
pub mod enums;
/// PLC变量值模块
pub mod plc_value;
/// 面板控件绑定模块
pub mod binding;

// 重新导出所有类型，方便其他模块使用
pub use enums::*;
pub use plc_value::*;
pub use binding::*;

//! 基础设施层模块
//!
//! 包含 `IPlcClient` 的具体实现

pub mod modbus_plc_client;
pub mod mock_plc_client;

// 重新导出基础设施组件
pub use modbus_plc_client::*;
pub use mock_plc_client::*;

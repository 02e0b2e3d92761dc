/// HMI面板通信核心库
pub mod models;
pub mod utils;
pub mod error;
pub mod logging;
pub mod domain;
pub mod infrastructure;
pub mod application;

// 重新导出常用类型，方便使用
pub use models::*;
pub use utils::{AppError, AppResult, AppConfig};
pub use domain::{BaseService, CommunicationManager, ConnectionState, ConnectionStatus, IPlcClient, PlcEndpoint};
pub use infrastructure::{MockPlcClient, ModbusTcpPlcClient};
pub use application::PanelService;

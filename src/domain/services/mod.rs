/// 领域服务接口定义模块
///
/// 业务说明：
/// 定义面板通信所依赖的抽象接口，具体实现位于基础设施层
/// 通信管理器只依赖这里的trait，因此可以替换为Modbus客户端或模拟客户端
///
/// Rust知识点：
/// - trait定义抽象接口
/// - async_trait支持异步trait方法

/// PLC客户端接口
///
/// 业务说明：与控制器交互的最小能力集合
/// 支持：连接、符号读写、原始区域读写、释放
pub mod plc_client;

pub use plc_client::*;

use crate::utils::error::AppResult;
use async_trait::async_trait;

/// 基础服务trait，所有服务都应实现
///
/// 业务说明：
/// 定义服务统一的生命周期管理能力
///
/// Rust知识点：
/// - Send + Sync: 确保服务可以在线程间安全共享
/// - &'static str: 静态字符串生命周期
#[async_trait]
pub trait BaseService: Send + Sync {
    /// 服务名称，用于日志记录
    fn service_name(&self) -> &'static str;

    /// 初始化服务
    ///
    /// 业务说明：在服务启动时调用，如建立首次连接
    async fn initialize(&mut self) -> AppResult<()>;

    /// 关闭服务
    ///
    /// 注意事项：
    /// 关闭后服务不再执行任何I/O
    async fn shutdown(&mut self) -> AppResult<()>;

    /// 健康检查
    async fn health_check(&self) -> AppResult<()>;
}

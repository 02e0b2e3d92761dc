//! # PLC客户端接口模块
//!
//! ## 业务作用
//! 抽象出与控制器通讯所需的最小接口：
//! - 建立连接并查询链路状态
//! - 按符号名读写变量
//! - 按（区域组，偏移）读写原始字节
//! - 释放底层资源
//!
//! ## 错误约定
//! - 所有失败都以 `AppError` 返回，调用方不需要区分具体协议
//! - 链路断开后 `is_connected` 必须返回false，通信管理器依赖它判断是否进入冷却
//!
//! ## Rust知识点
//! - **async trait**: 异步trait的定义和使用
//! - **trait对象**: `Box<dyn IPlcClient>` 动态分发
//! - **mockall**: 测试时自动生成 `MockIPlcClient`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::models::{PlcDataType, PlcValue};
use crate::utils::config::PlcConfig;
use crate::utils::error::AppResult;

/// 控制器网络端点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlcEndpoint {
    pub host: String,
    pub port: u16,
}

impl PlcEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Display for PlcEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<&PlcConfig> for PlcEndpoint {
    fn from(config: &PlcConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}

/// PLC客户端trait
///
/// **实现要求**:
/// - 同一时刻只会被通信管理器串行调用，实现内部不需要处理并发请求排队
/// - `connect` 在已连接时应当重新建立链路
/// - 读写失败后链路是否仍然可用，通过 `is_connected` 反映
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IPlcClient: Send + Sync {
    /// 连接到控制器
    async fn connect(&self, endpoint: &PlcEndpoint) -> AppResult<()>;

    /// 链路当前是否可用
    async fn is_connected(&self) -> bool;

    /// 按符号名读取变量
    async fn read_symbol(&self, name: &str, data_type: PlcDataType) -> AppResult<PlcValue>;

    /// 按符号名写入变量
    async fn write_symbol(&self, name: &str, value: &PlcValue) -> AppResult<()>;

    /// 读取原始区域中的字节
    async fn read_raw(&self, group: u32, offset: u32, len: usize) -> AppResult<Vec<u8>>;

    /// 向原始区域写入字节
    async fn write_raw(&self, group: u32, offset: u32, data: &[u8]) -> AppResult<()>;

    /// 释放底层连接，之后不再使用该客户端
    async fn dispose(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        let endpoint = PlcEndpoint::new("192.168.0.10", 502);
        assert_eq!(endpoint.to_string(), "192.168.0.10:502");

        let config = PlcConfig::default();
        let from_config = PlcEndpoint::from(&config);
        assert_eq!(from_config.host, config.host);
        assert_eq!(from_config.port, config.port);
    }
}

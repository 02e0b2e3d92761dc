use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序统一错误类型
/// 用于封装面板通信过程中可能出现的各种错误，提供统一的错误处理机制
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    /// 输入/输出错误
    #[error("IO错误: {message} (Kind: {kind})")]
    IoError { message: String, kind: String },

    /// PLC通信相关错误
    ///
    /// **业务含义**: 在已建立的连接上执行读写时发生的故障
    /// **错误类型**:
    /// - 协议异常（设备拒绝请求、功能码不支持等）
    /// - 传输中断（连接被对端关闭、网络抖动等）
    ///
    /// **错误恢复**:
    /// - 由通信管理器记入错误台账，不向轮询循环抛出
    /// - 下一次成功读写时自动清除
    #[error("PLC通信错误: {message}")]
    PlcCommunicationError { message: String },

    /// 连接建立失败
    #[error("PLC连接失败: {endpoint} - {message}")]
    ConnectionError { endpoint: String, message: String },

    /// 当前未连接（处于冷却期或连接已断开）
    #[error("PLC未连接: {message}")]
    NotConnected { message: String },

    /// 变量符号不存在
    #[error("变量不存在: {symbol}")]
    SymbolNotFound { symbol: String },

    /// 数据类型不匹配
    #[error("数据类型不匹配: {symbol} 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        symbol: String,
        expected: String,
        actual: String,
    },

    /// 用户输入无法转换为变量的目标类型
    #[error("格式错误: 无法将 '{input}' 转换为 {target_type} - {message}")]
    FormatError {
        input: String,
        target_type: String,
        message: String,
    },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    ConfigurationError { message: String },

    /// 验证错误（数据验证失败）
    #[error("验证错误: {message}")]
    ValidationError { message: String },

    /// 超时错误
    #[error("操作超时: {operation} - {message}")]
    TimeoutError {
        operation: String,
        message: String,
    },

    /// 通信管理器已释放
    #[error("通信管理器已释放")]
    Disposed,

    /// JSON序列化/反序列化错误
    #[error("JSON序列化/反序列化错误: {message}")]
    JsonError { message: String },

    /// Mock错误（仅用于测试和仿真）
    #[error("Mock错误: {0}")]
    MockError(String),
}

impl AppError {
    /// 创建IO错误
    pub fn io_error(message: impl Into<String>, kind_str: impl Into<String>) -> Self {
        Self::IoError {
            message: message.into(),
            kind: kind_str.into(),
        }
    }

    /// 创建PLC通信错误
    ///
    /// **业务作用**: 为读写故障创建统一的错误实例
    /// **使用场景**:
    /// - 设备返回协议异常时
    /// - 读写过程中传输中断时
    ///
    /// **Rust知识点**:
    /// - `impl Into<String>`: 泛型约束，接受任何可转换为String的类型
    pub fn plc_communication_error(message: impl Into<String>) -> Self {
        Self::PlcCommunicationError {
            message: message.into(),
        }
    }

    /// 创建连接失败错误
    pub fn connection_error(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionError {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// 创建未连接错误
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected {
            message: message.into(),
        }
    }

    /// 创建变量不存在错误
    pub fn symbol_not_found(symbol: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            symbol: symbol.into(),
        }
    }

    /// 创建类型不匹配错误
    pub fn type_mismatch(
        symbol: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            symbol: symbol.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// 创建格式错误
    pub fn format_error(
        input: impl Into<String>,
        target_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::FormatError {
            input: input.into(),
            target_type: target_type.into(),
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// 创建验证错误
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// 创建超时错误
    pub fn timeout_error(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TimeoutError {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// 创建JSON序列化错误
    pub fn json_error(message: impl Into<String>) -> Self {
        Self::JsonError {
            message: message.into(),
        }
    }

    /// 获取错误的简短描述
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::IoError { .. } => "IO_ERROR",
            AppError::PlcCommunicationError { .. } => "PLC_COMMUNICATION_ERROR",
            AppError::ConnectionError { .. } => "CONNECTION_ERROR",
            AppError::NotConnected { .. } => "NOT_CONNECTED",
            AppError::SymbolNotFound { .. } => "SYMBOL_NOT_FOUND",
            AppError::TypeMismatch { .. } => "TYPE_MISMATCH",
            AppError::FormatError { .. } => "FORMAT_ERROR",
            AppError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::TimeoutError { .. } => "TIMEOUT_ERROR",
            AppError::Disposed => "DISPOSED",
            AppError::JsonError { .. } => "JSON_ERROR",
            AppError::MockError(..) => "MOCK_ERROR",
        }
    }
}

/// 标准 I/O 错误到 AppError 的转换
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError { message: err.to_string(), kind: format!("{:?}", err.kind()) }
    }
}

/// serde_json 错误到 AppError 的转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError { message: err.to_string() }
    }
}

/// 应用程序结果类型别名
pub type AppResult<T> = Result<T, AppError>;

/// tokio_modbus 错误到 AppError 的转换
///
/// **转换逻辑**:
/// - 将tokio_modbus::Error包装为PlcCommunicationError
/// - 保留原始错误信息，便于调试和故障排查
///
/// **Rust知识点**:
/// - `From<T>` trait: 使用`?`操作符时自动调用
impl From<tokio_modbus::Error> for AppError {
    fn from(err: tokio_modbus::Error) -> Self {
        AppError::PlcCommunicationError {
            message: format!("Modbus error: {}", err)
        }
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::{ByteOrder, PlcDataType, StaleDisplayPolicy};
use crate::utils::error::{AppError, AppResult};

/// 提供给 serde 的默认字节顺序（CDAB）
fn default_byte_order() -> ByteOrder {
    ByteOrder::CDAB
}

fn default_string_length() -> u16 {
    80
}

/// 应用程序主配置结构
/// 包含面板运行所需的所有配置信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// PLC连接配置
    pub plc_config: PlcConfig,
    /// 通信管理器配置
    pub comm_config: CommConfig,
    /// 启动时注册的面板控件
    #[serde(default)]
    pub panel_config: PanelConfig,
    /// 日志配置
    pub logging_config: LoggingConfig,
}

/// PLC连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlcConfig {
    /// PLC主机地址
    pub host: String,
    /// PLC端口（面板固定使用本地运行时端口，如851）
    pub port: u16,
    /// 连接超时时间（毫秒）
    pub connect_timeout_ms: u64,
    /// 单次读写超时时间（毫秒）
    pub io_timeout_ms: u64,
    /// Modbus从站ID
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
    /// 字节顺序配置 (ABCD / CDAB / BADC / DCBA)
    #[serde(default = "default_byte_order")]
    pub byte_order: ByteOrder,
    /// Modbus 地址是否使用 0 基
    #[serde(default)]
    pub zero_based_address: bool,
    /// 符号表：变量名 → 地址与类型
    #[serde(default)]
    pub symbols: HashMap<String, SymbolConfig>,
    /// 原始地址区：索引组 → 起始寄存器地址（如 "40001"）
    #[serde(default)]
    pub raw_areas: HashMap<u32, String>,
}

fn default_slave_id() -> u8 {
    1
}

/// 单个符号的映射配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Modbus地址，如 "00001"、"40010"
    pub address: String,
    /// 变量类型
    pub data_type: PlcDataType,
    /// 字符串变量的最大字符数
    #[serde(default = "default_string_length")]
    pub string_length: u16,
}

/// 通信管理器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommConfig {
    /// 连接失败后的冷却时间（毫秒），期间不再尝试连接
    pub reconnect_cooldown_ms: u64,
    /// 外部轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 读取失败时指示灯的显示策略
    #[serde(default)]
    pub stale_display_policy: StaleDisplayPolicy,
    /// 松开写入失败后是否在后续轮询中重试
    #[serde(default = "default_release_retry")]
    pub release_retry: bool,
}

fn default_release_retry() -> bool {
    true
}

/// 面板控件配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelConfig {
    pub controls: Vec<ControlConfig>,
}

/// 单个面板控件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ControlConfig {
    Indicator {
        variable_name: String,
        #[serde(default)]
        on_color: Option<String>,
        #[serde(default)]
        off_color: Option<String>,
    },
    MomentaryButton {
        variable_name: String,
    },
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别 (debug, info, warn, error)
    pub log_level: String,
    /// 日志文件路径
    pub log_file_path: Option<PathBuf>,
    /// 是否启用控制台输出
    pub console_output: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plc_config: PlcConfig::default(),
            comm_config: CommConfig::default(),
            panel_config: PanelConfig::default(),
            logging_config: LoggingConfig::default(),
        }
    }
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 851,
            connect_timeout_ms: 2000,
            io_timeout_ms: 1000,
            slave_id: 1,
            byte_order: ByteOrder::CDAB,
            zero_based_address: false,
            symbols: HashMap::new(),
            raw_areas: HashMap::new(),
        }
    }
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            reconnect_cooldown_ms: 3000,
            poll_interval_ms: 100,
            stale_display_policy: StaleDisplayPolicy::RetainLast,
            release_retry: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file_path: Some(PathBuf::from("logs/hmi_panel.log")),
            console_output: true,
        }
    }
}

/// 配置管理器
/// 负责加载、保存和管理应用程序配置
pub struct ConfigManager {
    config: AppConfig,
    config_file_path: PathBuf,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new(config_file_path: PathBuf) -> Self {
        Self {
            config: AppConfig::default(),
            config_file_path,
        }
    }

    /// 从文件加载配置
    pub async fn load_from_file(&mut self) -> AppResult<()> {
        if !self.config_file_path.exists() {
            // 如果配置文件不存在，创建默认配置文件
            self.save_to_file().await?;
            return Ok(());
        }

        let content = tokio::fs::read_to_string(&self.config_file_path)
            .await
            .map_err(|e| AppError::io_error(format!("读取配置文件失败: {}", e), e.kind().to_string()))?;

        self.config = serde_json::from_str(&content)
            .map_err(|e| AppError::configuration_error(format!("解析配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 将配置保存到文件
    pub async fn save_to_file(&self) -> AppResult<()> {
        if let Some(parent) = self.config_file_path.parent() {
            tokio::fs::create_dir_all(parent).await
                .map_err(|e| AppError::io_error(format!("创建配置目录失败: {}", e), e.kind().to_string()))?;
        }

        let content = serde_json::to_string_pretty(&self.config)
            .map_err(|e| AppError::json_error(format!("序列化配置失败: {}", e)))?;

        tokio::fs::write(&self.config_file_path, content)
            .await
            .map_err(|e| AppError::io_error(format!("写入配置文件失败: {}", e), e.kind().to_string()))?;

        Ok(())
    }

    /// 从环境变量覆盖配置
    pub fn override_from_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// 按键查询覆盖值，解析失败的数值会被忽略
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PLC_HOST") {
            self.config.plc_config.host = host;
        }
        if let Some(port) = lookup("PLC_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.config.plc_config.port = port;
        }
        if let Some(cooldown) = lookup("PLC_COOLDOWN_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.config.comm_config.reconnect_cooldown_ms = cooldown;
        }
        if let Some(interval) = lookup("POLL_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.config.comm_config.poll_interval_ms = interval;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.config.logging_config.log_level = log_level;
        }
    }

    /// 获取配置的只读引用
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取配置的可变引用
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    /// 验证配置的有效性
    pub fn validate_config(&self) -> AppResult<()> {
        let plc = &self.config.plc_config;
        if plc.host.is_empty() {
            return Err(AppError::configuration_error("PLC主机地址不能为空"));
        }

        if plc.port == 0 {
            return Err(AppError::configuration_error("PLC端口号不能为0"));
        }

        if plc.connect_timeout_ms == 0 || plc.io_timeout_ms == 0 {
            return Err(AppError::configuration_error("连接和读写超时必须大于0"));
        }

        if self.config.comm_config.poll_interval_ms == 0 {
            return Err(AppError::configuration_error("轮询间隔必须大于0"));
        }

        for (name, symbol) in &plc.symbols {
            if name.trim().is_empty() {
                return Err(AppError::configuration_error("符号表中存在空变量名"));
            }
            if symbol.address.trim().is_empty() {
                return Err(AppError::configuration_error(format!("变量 {} 未配置地址", name)));
            }
        }

        // 验证日志级别
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        let log_level = self.config.logging_config.log_level.to_lowercase();
        if !valid_log_levels.contains(&log_level.as_str()) {
            return Err(AppError::configuration_error(format!(
                "无效的日志级别: {}，有效值: {:?}",
                self.config.logging_config.log_level, valid_log_levels
            )));
        }

        Ok(())
    }

    /// 重置为默认配置
    pub fn reset_to_default(&mut self) {
        self.config = AppConfig::default();
    }
}

/// 加载配置：读取文件、环境变量覆盖、验证
pub async fn load_config(config_path: Option<PathBuf>) -> AppResult<AppConfig> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from("config/hmi_panel.json"));
    let mut config_manager = ConfigManager::new(config_path);

    config_manager.load_from_file().await?;
    config_manager.override_from_env();
    config_manager.validate_config()?;

    Ok(config_manager.get_config().clone())
}

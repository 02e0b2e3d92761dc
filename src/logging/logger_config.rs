//! 日志配置模块
//!
//! 面板日志的级别与输出目标，由应用配置中的 `logging_config` 转换而来

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::utils::config::LoggingConfig;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 日志输出目标
    pub targets: Vec<LogTarget>,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("无效的日志级别: {}", s)),
        }
    }
}

/// 日志输出目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogTarget {
    Console,
    File { path: PathBuf },
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            targets: vec![LogTarget::Console],
        }
    }
}

impl From<&LoggingConfig> for LoggerConfig {
    fn from(config: &LoggingConfig) -> Self {
        let mut targets = Vec::new();
        if config.console_output {
            targets.push(LogTarget::Console);
        }
        if let Some(path) = &config.log_file_path {
            targets.push(LogTarget::File { path: path.clone() });
        }

        Self {
            // 配置已验证过级别，这里兜底为Info
            level: config.log_level.parse().unwrap_or(LogLevel::Info),
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_logging_config() {
        let logging = LoggingConfig {
            log_level: "DEBUG".to_string(),
            log_file_path: Some(PathBuf::from("logs/panel.log")),
            console_output: false,
        };
        let config = LoggerConfig::from(&logging);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.targets, vec![LogTarget::File { path: PathBuf::from("logs/panel.log") }]);
        assert_eq!(LevelFilter::from(config.level), LevelFilter::Debug);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let logging = LoggingConfig {
            log_level: "loud".to_string(),
            log_file_path: None,
            console_output: true,
        };
        let config = LoggerConfig::from(&logging);
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.targets, vec![LogTarget::Console]);
    }
}

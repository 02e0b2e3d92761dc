//! 面板logger
//!
//! `log::Log` 的实现：控制台按级别分流（错误和警告走stderr），可选追加写入一个日志文件

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Mutex;

use super::logger_config::{LoggerConfig, LogTarget};
use crate::utils::config::LoggingConfig;

pub struct PanelLogger {
    level: LevelFilter,
    console: bool,
    file: Option<Mutex<BufWriter<File>>>,
}

impl PanelLogger {
    /// 按配置打开输出目标；配置了多个文件时只使用第一个
    pub fn open(config: &LoggerConfig) -> std::io::Result<Self> {
        let console = config.targets.iter().any(|t| matches!(t, LogTarget::Console));
        let file = match config.targets.iter().find_map(|t| match t {
            LogTarget::File { path } => Some(path),
            LogTarget::Console => None,
        }) {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Mutex::new(BufWriter::new(file)))
            }
            None => None,
        };

        Ok(Self {
            level: config.level.into(),
            console,
            file,
        })
    }

    /// 注册为全局logger
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

/// 单行日志格式: `[时间] [级别] [目标] - 消息`
fn format_line(record: &Record) -> String {
    format!(
        "[{}] [{}] [{}] - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        record.level(),
        record.target(),
        record.args()
    )
}

impl Log for PanelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record);

        if self.console {
            match record.level() {
                Level::Error => eprintln!("\x1b[31m{}\x1b[0m", line),
                Level::Warn => eprintln!("\x1b[33m{}\x1b[0m", line),
                _ => println!("{}", line),
            }
        }

        if let Some(file) = &self.file {
            let mut writer = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
                eprintln!("写入日志文件失败: {}", e);
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
        if let Some(file) = &self.file {
            let _ = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).flush();
        }
    }
}

/// 按应用配置初始化全局logger
pub fn init_logger(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    PanelLogger::open(&LoggerConfig::from(config))?.install()?;
    Ok(())
}

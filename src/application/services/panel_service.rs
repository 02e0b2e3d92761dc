//! # 面板服务
//!
//! ## 业务作用
//! - 按配置创建指示灯和点动按钮，并登记到通信管理器
//! - 以固定间隔驱动 `poll`，在错误台账变化时输出日志
//! - 处理操作员输入：文本先转换为变量类型，格式错误直接返回给操作员
//!
//! 界面层（或无头运行的可执行程序）只需要持有 `PanelService`。

use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::impls::CommunicationManager;
use crate::models::{BindingId, ControlBinding, Indicator, MomentaryButton, PlcDataType, PlcValue};
use crate::utils::config::{AppConfig, ControlConfig};
use crate::utils::error::{AppError, AppResult};
use crate::{log_config_warning, log_user_operation};

/// 错误台账的一次变化
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorChange {
    /// 新进入台账的变量
    pub added: Vec<String>,
    /// 已恢复的变量
    pub cleared: Vec<String>,
}

impl ErrorChange {
    /// 比较两次台账快照（均为升序）
    pub fn between(previous: &[String], current: &[String]) -> Self {
        Self {
            added: current.iter().filter(|n| !previous.contains(n)).cloned().collect(),
            cleared: previous.iter().filter(|n| !current.contains(n)).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.cleared.is_empty()
    }
}

/// 面板服务
pub struct PanelService {
    manager: Arc<CommunicationManager>,
    indicators: Vec<(BindingId, Arc<Indicator>)>,
    /// 变量名 → 按钮标识
    buttons: HashMap<String, BindingId>,
    poll_interval: Duration,
}

impl PanelService {
    /// 按配置创建所有控件并登记
    pub async fn from_config(manager: Arc<CommunicationManager>, config: &AppConfig) -> Self {
        let mut service = Self {
            manager,
            indicators: Vec::new(),
            buttons: HashMap::new(),
            poll_interval: Duration::from_millis(config.comm_config.poll_interval_ms.max(1)),
        };

        for control in &config.panel_config.controls {
            match control {
                ControlConfig::Indicator { variable_name, on_color, off_color } => {
                    if variable_name.trim().is_empty() {
                        log_config_warning!("指示灯未配置变量名，轮询时将跳过");
                    }
                    let mut indicator = Indicator::new(variable_name.clone());
                    if on_color.is_some() || off_color.is_some() {
                        indicator = Indicator::with_colors(
                            variable_name.clone(),
                            on_color.clone().unwrap_or_else(|| indicator.on_color().to_string()),
                            off_color.clone().unwrap_or_else(|| indicator.off_color().to_string()),
                        );
                    }
                    service.add_indicator(Arc::new(indicator)).await;
                }
                ControlConfig::MomentaryButton { variable_name } => {
                    if variable_name.trim().is_empty() {
                        log_config_warning!("按钮未配置变量名，按下和松开将被忽略");
                    }
                    service.add_button(Arc::new(MomentaryButton::new(variable_name.clone()))).await;
                }
            }
        }

        info!(
            "✅ 面板控件登记完成: 指示灯 {} 个, 按钮 {} 个",
            service.indicators.len(),
            service.buttons.len()
        );
        service
    }

    pub async fn add_indicator(&mut self, indicator: Arc<Indicator>) -> Option<BindingId> {
        let id = self.manager.register(ControlBinding::from(indicator.clone())).await?;
        self.indicators.push((id, indicator));
        Some(id)
    }

    pub async fn add_button(&mut self, button: Arc<MomentaryButton>) -> Option<BindingId> {
        let name = button.variable_name().to_string();
        let id = self.manager.register(ControlBinding::from(button)).await?;
        if self.buttons.insert(name.clone(), id).is_some() {
            log_config_warning!("变量 '{}' 绑定了多个按钮，仅保留最后一个", name);
        }
        Some(id)
    }

    pub fn manager(&self) -> &Arc<CommunicationManager> {
        &self.manager
    }

    pub fn indicators(&self) -> &[(BindingId, Arc<Indicator>)] {
        &self.indicators
    }

    /// 按变量名查找指示灯
    pub fn indicator(&self, variable_name: &str) -> Option<&Arc<Indicator>> {
        self.indicators
            .iter()
            .find(|(_, i)| i.variable_name() == variable_name)
            .map(|(_, i)| i)
    }

    pub fn button_id(&self, variable_name: &str) -> Option<BindingId> {
        self.buttons.get(variable_name).copied()
    }

    /// 按下变量对应的按钮
    pub async fn press(&self, variable_name: &str) -> AppResult<()> {
        let id = self.require_button(variable_name)?;
        self.manager.on_press(id).await;
        Ok(())
    }

    /// 松开变量对应的按钮
    pub async fn release(&self, variable_name: &str) -> AppResult<()> {
        let id = self.require_button(variable_name)?;
        self.manager.on_release(id).await;
        Ok(())
    }

    fn require_button(&self, variable_name: &str) -> AppResult<BindingId> {
        self.button_id(variable_name)
            .ok_or_else(|| AppError::validation_error(format!("变量 '{}' 没有绑定按钮", variable_name)))
    }

    /// 写入操作员输入的文本
    ///
    /// 文本无法转换为目标类型时返回格式错误，不产生任何I/O
    pub async fn write_operator_input(&self, variable_name: &str, text: &str, data_type: PlcDataType) -> AppResult<()> {
        let value = PlcValue::parse_as(text, data_type)?;
        log_user_operation!("写入 '{}' = {}", variable_name, value);
        self.manager.write_symbol(variable_name, value).await
    }

    /// 执行一轮轮询并返回台账变化
    pub async fn tick(&self, last_errors: &mut Vec<String>) -> ErrorChange {
        self.manager.poll().await;
        let current = self.manager.read_write_errors().await;
        let change = ErrorChange::between(last_errors, &current);
        if !change.added.is_empty() {
            warn!("⚠️ 变量进入错误状态: {:?}", change.added);
        }
        if !change.cleared.is_empty() {
            info!("✅ 变量恢复正常: {:?}", change.cleared);
        }
        *last_errors = current;
        change
    }

    /// 按配置间隔轮询，直到收到停止信号
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_errors = Vec::new();

        info!("🔄 开始轮询, 间隔 {} ms", self.poll_interval.as_millis());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(&mut last_errors).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("🛑 轮询已停止");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_change() {
        let previous = vec!["A".to_string(), "B".to_string()];
        let current = vec!["B".to_string(), "C".to_string()];
        let change = ErrorChange::between(&previous, &current);
        assert_eq!(change.added, vec!["C".to_string()]);
        assert_eq!(change.cleared, vec!["A".to_string()]);
        assert!(ErrorChange::between(&current, &current).is_empty());
    }
}

//! # 变量绑定模型
//!
//! ## 业务作用
//! 面板控件与PLC变量之间的关联：
//! - **指示灯 (Indicator)**: 周期性读取一个BOOL变量，并把结果反映为开/关颜色
//! - **点动按钮 (MomentaryButton)**: 按下写TRUE，松开写FALSE
//! - **被动控件 (Passive)**: 标签、输入框等与通信管理器无关的控件，注册时被忽略
//!
//! ## 设计要点
//! - 绑定由界面层创建并持有，通信管理器只保存 `Arc` 引用
//! - 指示灯的显示输出通过 `tokio::sync::watch` 发布，界面可以订阅，也可以无头运行
//!
//! ## Rust知识点
//! - **watch通道**: 单值广播，接收方总能看到最新值
//! - **Arc<T>**: 界面与管理器共享同一个绑定实例

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::models::enums::IndicatorState;

/// 默认开启颜色（绿色）
pub const DEFAULT_ON_COLOR: &str = "#FF4FF40E";
/// 默认关闭颜色（暗灰绿）
pub const DEFAULT_OFF_COLOR: &str = "#FFA2BD97";

/// 注册后分配给绑定的标识，按注册顺序递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingId(pub u64);

/// 指示灯当前显示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDisplay {
    /// 显示状态
    pub state: IndicatorState,
    /// 当前背景颜色，未知状态时为None
    pub background: Option<String>,
    /// 最后一次显示更新的时间
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for IndicatorDisplay {
    fn default() -> Self {
        Self {
            state: IndicatorState::Unknown,
            background: None,
            updated_at: None,
        }
    }
}

/// 指示灯绑定
///
/// **业务含义**: 读取一个BOOL变量，TRUE显示 `on_color`，FALSE显示 `off_color`
/// **空变量名**: 变量名为空或只有空白时，轮询动作不执行任何I/O
#[derive(Debug)]
pub struct Indicator {
    variable_name: String,
    on_color: String,
    off_color: String,
    display: watch::Sender<IndicatorDisplay>,
}

impl Indicator {
    /// 使用默认颜色创建指示灯
    pub fn new(variable_name: impl Into<String>) -> Self {
        Self::with_colors(variable_name, DEFAULT_ON_COLOR, DEFAULT_OFF_COLOR)
    }

    /// 使用指定颜色创建指示灯
    pub fn with_colors(
        variable_name: impl Into<String>,
        on_color: impl Into<String>,
        off_color: impl Into<String>,
    ) -> Self {
        let (display, _) = watch::channel(IndicatorDisplay::default());
        Self {
            variable_name: variable_name.into(),
            on_color: on_color.into(),
            off_color: off_color.into(),
            display,
        }
    }

    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    pub fn on_color(&self) -> &str {
        &self.on_color
    }

    pub fn off_color(&self) -> &str {
        &self.off_color
    }

    /// 变量名是否为空白
    pub fn is_blank(&self) -> bool {
        self.variable_name.trim().is_empty()
    }

    /// 当前显示的快照
    pub fn display(&self) -> IndicatorDisplay {
        self.display.borrow().clone()
    }

    /// 当前显示状态
    pub fn state(&self) -> IndicatorState {
        self.display.borrow().state
    }

    /// 当前背景颜色
    pub fn background(&self) -> Option<String> {
        self.display.borrow().background.clone()
    }

    /// 订阅显示变化，供界面层刷新使用
    pub fn subscribe(&self) -> watch::Receiver<IndicatorDisplay> {
        self.display.subscribe()
    }

    /// 根据读取到的值更新显示
    pub(crate) fn apply_value(&self, value: bool) {
        let background = if value { self.on_color.clone() } else { self.off_color.clone() };
        self.display.send_replace(IndicatorDisplay {
            state: IndicatorState::from(value),
            background: Some(background),
            updated_at: Some(chrono::Utc::now()),
        });
    }

    /// 读取失败且策略要求时，把显示切换为未知
    pub(crate) fn mark_unknown(&self) {
        self.display.send_replace(IndicatorDisplay {
            state: IndicatorState::Unknown,
            background: None,
            updated_at: Some(chrono::Utc::now()),
        });
    }
}

/// 点动按钮绑定
///
/// **业务含义**: 按下时向变量写TRUE，松开时写FALSE
/// **空变量名**: 变量名为空或只有空白时，按下和松开都不执行任何I/O
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MomentaryButton {
    variable_name: String,
}

impl MomentaryButton {
    pub fn new(variable_name: impl Into<String>) -> Self {
        Self {
            variable_name: variable_name.into(),
        }
    }

    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    /// 变量名是否为空白
    pub fn is_blank(&self) -> bool {
        self.variable_name.trim().is_empty()
    }
}

/// 面板控件绑定
///
/// **业务作用**: 注册时按种类分派；`Passive` 表示通信管理器不识别的控件种类
#[derive(Debug, Clone)]
pub enum ControlBinding {
    Indicator(Arc<Indicator>),
    MomentaryButton(Arc<MomentaryButton>),
    Passive { kind: String },
}

impl ControlBinding {
    /// 控件种类名称，用于日志
    pub fn kind_name(&self) -> &str {
        match self {
            ControlBinding::Indicator(_) => "Indicator",
            ControlBinding::MomentaryButton(_) => "MomentaryButton",
            ControlBinding::Passive { kind } => kind,
        }
    }
}

impl From<Arc<Indicator>> for ControlBinding {
    fn from(indicator: Arc<Indicator>) -> Self {
        ControlBinding::Indicator(indicator)
    }
}

impl From<Arc<MomentaryButton>> for ControlBinding {
    fn from(button: Arc<MomentaryButton>) -> Self {
        ControlBinding::MomentaryButton(button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_display_follows_value() {
        let indicator = Indicator::with_colors("MAIN.bLamp", "green", "grey");
        assert_eq!(indicator.state(), IndicatorState::Unknown);
        assert_eq!(indicator.background(), None);

        let mut rx = indicator.subscribe();
        indicator.apply_value(true);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().background.as_deref(), Some("green"));

        indicator.apply_value(false);
        assert_eq!(indicator.state(), IndicatorState::Off);
        assert_eq!(indicator.background().as_deref(), Some("grey"));

        indicator.mark_unknown();
        assert_eq!(indicator.state(), IndicatorState::Unknown);
        assert!(indicator.display().updated_at.is_some());
    }

    #[test]
    fn test_blank_variable_name() {
        assert!(Indicator::new("   ").is_blank());
        assert!(Indicator::new("").is_blank());
        assert!(!Indicator::new("GVL.x").is_blank());
        assert!(MomentaryButton::new(" \t").is_blank());
        assert!(!MomentaryButton::new("GVL.start").is_blank());
    }

    #[test]
    fn test_kind_name() {
        let passive = ControlBinding::Passive { kind: "TextBox".to_string() };
        assert_eq!(passive.kind_name(), "TextBox");
        let button: ControlBinding = Arc::new(MomentaryButton::new("GVL.start")).into();
        assert_eq!(button.kind_name(), "MomentaryButton");
    }
}

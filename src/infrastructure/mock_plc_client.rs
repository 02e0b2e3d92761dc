//! # 模拟PLC客户端
//!
//! 内存中的控制器模拟，用于无硬件运行面板和场景测试：
//! - 符号变量与原始区域保存在内存中
//! - 可以注入连接失败、单个变量故障、链路断开
//! - 记录调用次数与调用历史，便于断言

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::domain::services::{IPlcClient, PlcEndpoint};
use crate::models::{PlcDataType, PlcValue};
use crate::utils::error::{AppError, AppResult};

/// 模拟配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 每次调用的模拟延迟
    pub call_delay: Option<Duration>,
    /// 是否记录调用历史
    pub record_call_history: bool,
    /// 最大调用历史记录数
    pub max_call_history: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            call_delay: None,
            record_call_history: true,
            max_call_history: 1000,
        }
    }
}

/// 调用记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// 方法名
    pub method_name: String,
    /// 参数（序列化为JSON）
    pub parameters: serde_json::Value,
    /// 调用时间
    pub timestamp: DateTime<Utc>,
    /// 是否成功
    pub success: bool,
    /// 错误信息（如果失败）
    pub error_message: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    symbols: HashMap<String, PlcValue>,
    raw: HashMap<(u32, u32), u8>,
    link_up: bool,
    fail_connect: bool,
    /// 连接调用成功但链路不可用
    connect_without_link: bool,
    faulty_symbols: HashSet<String>,
    connect_attempts: usize,
    reads: usize,
    writes: usize,
    disposed: bool,
    history: Vec<CallRecord>,
}

/// 模拟PLC客户端
///
/// 克隆后共享同一份内部状态，测试代码保留一个克隆用于注入故障和检查结果
#[derive(Debug, Clone)]
pub struct MockPlcClient {
    config: MockConfig,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockPlcClient {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl MockPlcClient {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ---- 注入与检查 ----

    /// 设置变量值（不计入读写次数）
    pub fn set_value(&self, name: &str, value: impl Into<PlcValue>) {
        self.state().symbols.insert(name.to_string(), value.into());
    }

    pub fn value(&self, name: &str) -> Option<PlcValue> {
        self.state().symbols.get(name).cloned()
    }

    /// 设置原始区域中的字节
    pub fn set_raw(&self, group: u32, offset: u32, data: &[u8]) {
        let mut state = self.state();
        for (i, byte) in data.iter().enumerate() {
            state.raw.insert((group, offset + i as u32), *byte);
        }
    }

    pub fn set_connect_failure(&self, fail: bool) {
        self.state().fail_connect = fail;
    }

    /// 连接调用返回成功，但链路并未建立
    pub fn set_connect_without_link(&self, enabled: bool) {
        self.state().connect_without_link = enabled;
    }

    /// 让某个变量的读写失败，链路保持可用
    pub fn fail_symbol(&self, name: &str) {
        self.state().faulty_symbols.insert(name.to_string());
    }

    pub fn clear_symbol_fault(&self, name: &str) {
        self.state().faulty_symbols.remove(name);
    }

    /// 模拟链路断开，下一次读写失败且 `is_connected` 返回false
    pub fn drop_link(&self) {
        self.state().link_up = false;
    }

    /// 连接调用次数（在模拟延迟之前计数，超时取消的调用也包括在内）
    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    pub fn read_count(&self) -> usize {
        self.state().reads
    }

    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    pub fn is_disposed(&self) -> bool {
        self.state().disposed
    }

    pub fn call_history(&self) -> Vec<CallRecord> {
        self.state().history.clone()
    }

    /// 对指定变量的写入记录（按时间顺序）
    pub fn writes_to(&self, name: &str) -> Vec<PlcValue> {
        self.state()
            .history
            .iter()
            .filter(|r| r.method_name == "write_symbol" && r.success && r.parameters["name"] == name)
            .filter_map(|r| serde_json::from_value(r.parameters["value"].clone()).ok())
            .collect()
    }

    // ---- 内部 ----

    async fn simulate_delay(&self) {
        if let Some(delay) = self.config.call_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn record(&self, state: &mut MockState, method_name: &str, parameters: serde_json::Value, result: &AppResult<impl Sized>) {
        if !self.config.record_call_history {
            return;
        }
        state.history.push(CallRecord {
            method_name: method_name.to_string(),
            parameters,
            timestamp: Utc::now(),
            success: result.is_ok(),
            error_message: result.as_ref().err().map(|e| e.to_string()),
        });
        if state.history.len() > self.config.max_call_history {
            let excess = state.history.len() - self.config.max_call_history;
            state.history.drain(..excess);
        }
    }

    /// 读写前的公共检查
    fn check_access(state: &MockState, name: &str) -> AppResult<()> {
        if state.disposed {
            return Err(AppError::MockError("客户端已释放".to_string()));
        }
        if !state.link_up {
            return Err(AppError::plc_communication_error("模拟链路已断开"));
        }
        if state.faulty_symbols.contains(name) {
            return Err(AppError::plc_communication_error(format!("模拟变量故障: {}", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl IPlcClient for MockPlcClient {
    async fn connect(&self, endpoint: &PlcEndpoint) -> AppResult<()> {
        self.state().connect_attempts += 1;
        self.simulate_delay().await;
        let mut state = self.state();

        let result = if state.disposed {
            Err(AppError::MockError("客户端已释放".to_string()))
        } else if state.fail_connect {
            state.link_up = false;
            Err(AppError::connection_error(endpoint.to_string(), "模拟连接失败"))
        } else {
            state.link_up = !state.connect_without_link;
            Ok(())
        };
        self.record(&mut state, "connect", serde_json::json!({ "endpoint": endpoint.to_string() }), &result);
        result
    }

    async fn is_connected(&self) -> bool {
        let state = self.state();
        state.link_up && !state.disposed
    }

    async fn read_symbol(&self, name: &str, data_type: PlcDataType) -> AppResult<PlcValue> {
        self.state().reads += 1;
        self.simulate_delay().await;
        let mut state = self.state();

        let result = Self::check_access(&state, name).and_then(|_| {
            state
                .symbols
                .get(name)
                .cloned()
                .ok_or_else(|| AppError::symbol_not_found(name))
        });
        self.record(
            &mut state,
            "read_symbol",
            serde_json::json!({ "name": name, "data_type": data_type }),
            &result,
        );
        result
    }

    async fn write_symbol(&self, name: &str, value: &PlcValue) -> AppResult<()> {
        self.state().writes += 1;
        self.simulate_delay().await;
        let mut state = self.state();

        let result = Self::check_access(&state, name);
        if result.is_ok() {
            state.symbols.insert(name.to_string(), value.clone());
        }
        self.record(
            &mut state,
            "write_symbol",
            serde_json::json!({ "name": name, "value": value }),
            &result,
        );
        result
    }

    async fn read_raw(&self, group: u32, offset: u32, len: usize) -> AppResult<Vec<u8>> {
        self.state().reads += 1;
        self.simulate_delay().await;
        let mut state = self.state();

        let key = format!("0x{:04X}:0x{:04X}", group, offset);
        let result = Self::check_access(&state, &key).map(|_| {
            (0..len as u32)
                .map(|i| state.raw.get(&(group, offset + i)).copied().unwrap_or(0))
                .collect::<Vec<u8>>()
        });
        self.record(
            &mut state,
            "read_raw",
            serde_json::json!({ "group": group, "offset": offset, "len": len }),
            &result,
        );
        result
    }

    async fn write_raw(&self, group: u32, offset: u32, data: &[u8]) -> AppResult<()> {
        self.state().writes += 1;
        self.simulate_delay().await;
        let mut state = self.state();

        let key = format!("0x{:04X}:0x{:04X}", group, offset);
        let result = Self::check_access(&state, &key);
        if result.is_ok() {
            for (i, byte) in data.iter().enumerate() {
                state.raw.insert((group, offset + i as u32), *byte);
            }
        }
        self.record(
            &mut state,
            "write_raw",
            serde_json::json!({ "group": group, "offset": offset, "data": data }),
            &result,
        );
        result
    }

    async fn dispose(&self) {
        let mut state = self.state();
        state.disposed = true;
        state.link_up = false;
        let result: AppResult<()> = Ok(());
        self.record(&mut state, "dispose", serde_json::Value::Null, &result);
    }
}

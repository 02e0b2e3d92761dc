//! # 通信管理器实现模块
//!
//! ## 业务作用
//! 面板与控制器之间唯一的通信入口：
//! - **连接管理**: 持有唯一的PLC客户端，按需建立连接
//! - **冷却退避**: 连接失败后在冷却窗口内直接跳过，不阻塞调用方
//! - **绑定分派**: 指示灯登记为轮询动作，点动按钮通过按下/松开触发写入
//! - **错误台账**: 记录当前读写失败的变量，供诊断界面显示
//!
//! ## 状态机
//! - `Disconnected` → `Connected`: 任一需要连接的操作触发 `try_connect` 且连接成功
//! - `Connected` → `Disconnected`: 读写失败后客户端报告链路已断开，或读写超时
//!
//! ## 并发模型
//! 客户端、连接状态、台账由同一把 `tokio::sync::Mutex` 保护，
//! 轮询任务和界面事件共享 `Arc<CommunicationManager>`，所有I/O串行执行。
//! 冷却期是一次时间比较，不会sleep。
//!
//! ## Rust知识点
//! - **tokio::sync::Mutex**: 可以跨await持有的异步锁
//! - **tokio::time::timeout**: 为每次客户端调用设置上限
//! - **trait对象**: `Box<dyn IPlcClient>` 支持替换不同的客户端实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Instant};

use crate::domain::impls::error_ledger::ErrorLedger;
use crate::domain::services::{BaseService, IPlcClient, PlcEndpoint};
use crate::models::{
    BindingId, ControlBinding, Indicator, MomentaryButton, PlcDataType, PlcValue,
    StaleDisplayPolicy,
};
use crate::utils::config::{AppConfig, CommConfig};
use crate::utils::error::{AppError, AppResult};
use crate::{log_communication_failure, log_user_operation};

/// 默认连接超时
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);
/// 默认读写超时
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(1000);

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// 未连接，初始状态
    Disconnected,
    /// 已连接
    Connected,
}

/// 连接状态快照，供诊断界面显示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// 控制器端点
    pub endpoint: String,
    /// 当前连接状态
    pub state: ConnectionState,
    /// 最近一次连接失败的时间
    pub last_connect_failure: Option<DateTime<Utc>>,
    /// 当前处于错误状态的变量（已排序）
    pub read_write_errors: Vec<String>,
    /// 台账中最近一次读写失败的时间
    pub last_read_write_failure: Option<DateTime<Utc>>,
    /// 等待重发的松开写入
    pub pending_releases: Vec<String>,
    /// 是否已释放
    pub disposed: bool,
}

/// 受互斥锁保护的会话状态
struct Session {
    client: Box<dyn IPlcClient>,
    state: ConnectionState,
    /// 最近一次连接失败的单调时间，仅在未连接时用于冷却判断
    last_error_time: Option<Instant>,
    last_connect_failure: Option<DateTime<Utc>>,
    ledger: ErrorLedger,
    pending_releases: BTreeSet<String>,
    disposed: bool,
}

/// 已登记的绑定
#[derive(Default)]
struct Registry {
    next_id: u64,
    /// 轮询动作，按登记顺序执行
    poll_actions: Vec<(BindingId, Arc<Indicator>)>,
    buttons: HashMap<BindingId, Arc<MomentaryButton>>,
}

impl Registry {
    fn allocate_id(&mut self) -> BindingId {
        self.next_id += 1;
        BindingId(self.next_id)
    }
}

/// 一次客户端请求
enum IoRequest<'a> {
    ReadSymbol { name: &'a str, data_type: PlcDataType },
    WriteSymbol { name: &'a str, value: &'a PlcValue },
    ReadRaw { group: u32, offset: u32, len: usize },
    WriteRaw { group: u32, offset: u32, data: &'a [u8] },
}

impl IoRequest<'_> {
    /// 台账中使用的名称；原始区域以 "组:偏移" 表示
    fn ledger_key(&self) -> String {
        match self {
            IoRequest::ReadSymbol { name, .. } | IoRequest::WriteSymbol { name, .. } => {
                name.to_string()
            }
            IoRequest::ReadRaw { group, offset, .. } | IoRequest::WriteRaw { group, offset, .. } => {
                raw_key(*group, *offset)
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            IoRequest::ReadSymbol { .. } => "读取变量",
            IoRequest::WriteSymbol { .. } => "写入变量",
            IoRequest::ReadRaw { .. } => "读取原始区域",
            IoRequest::WriteRaw { .. } => "写入原始区域",
        }
    }
}

enum IoResponse {
    Value(PlcValue),
    Bytes(Vec<u8>),
    Done,
}

/// 原始区域在台账中的名称
pub fn raw_key(group: u32, offset: u32) -> String {
    format!("0x{:04X}:0x{:04X}", group, offset)
}

/// 通信管理器
///
/// **业务职责**:
/// - 唯一持有PLC客户端，其他组件不得另开连接
/// - 绑定路径（轮询、按钮）从不返回错误，失败只体现在台账中
/// - 直接读写接口同样记录台账，并把错误返回给调用方用于提示
pub struct CommunicationManager {
    endpoint: PlcEndpoint,
    reconnect_cooldown: Duration,
    connect_timeout: Duration,
    io_timeout: Duration,
    stale_display_policy: StaleDisplayPolicy,
    release_retry: bool,
    session: Mutex<Session>,
    registry: RwLock<Registry>,
}

impl CommunicationManager {
    /// 创建通信管理器，初始状态为未连接
    pub fn new(client: Box<dyn IPlcClient>, endpoint: PlcEndpoint, config: &CommConfig) -> Self {
        Self {
            endpoint,
            reconnect_cooldown: Duration::from_millis(config.reconnect_cooldown_ms),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            stale_display_policy: config.stale_display_policy,
            release_retry: config.release_retry,
            session: Mutex::new(Session {
                client,
                state: ConnectionState::Disconnected,
                last_error_time: None,
                last_connect_failure: None,
                ledger: ErrorLedger::new(),
                pending_releases: BTreeSet::new(),
                disposed: false,
            }),
            registry: RwLock::new(Registry::default()),
        }
    }

    /// 按应用配置创建
    pub fn from_config(client: Box<dyn IPlcClient>, config: &AppConfig) -> Self {
        Self::new(client, PlcEndpoint::from(&config.plc_config), &config.comm_config).with_timeouts(
            Duration::from_millis(config.plc_config.connect_timeout_ms),
            Duration::from_millis(config.plc_config.io_timeout_ms),
        )
    }

    /// 设置连接与读写超时
    pub fn with_timeouts(mut self, connect_timeout: Duration, io_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.io_timeout = io_timeout;
        self
    }

    pub fn endpoint(&self) -> &PlcEndpoint {
        &self.endpoint
    }

    // ------------------------------------------------------------------
    // 绑定登记与触发
    // ------------------------------------------------------------------

    /// 登记面板控件绑定
    ///
    /// - 指示灯：追加一个轮询动作
    /// - 点动按钮：加入按钮表，之后通过 `on_press` / `on_release` 触发
    /// - 其他种类：忽略，返回None
    pub async fn register(&self, binding: ControlBinding) -> Option<BindingId> {
        let mut registry = self.registry.write().await;
        match binding {
            ControlBinding::Indicator(indicator) => {
                let id = registry.allocate_id();
                debug!("🔗 登记指示灯: {:?} → '{}'", id, indicator.variable_name());
                registry.poll_actions.push((id, indicator));
                Some(id)
            }
            ControlBinding::MomentaryButton(button) => {
                let id = registry.allocate_id();
                debug!("🔗 登记点动按钮: {:?} → '{}'", id, button.variable_name());
                registry.buttons.insert(id, button);
                Some(id)
            }
            ControlBinding::Passive { kind } => {
                debug!("⏭️ 忽略不参与通信的控件: {}", kind);
                None
            }
        }
    }

    /// 按钮按下：写TRUE
    pub async fn on_press(&self, id: BindingId) {
        let Some(button) = self.button(id).await else {
            warn!("⚠️ 未登记的按钮: {:?}", id);
            return;
        };
        if button.is_blank() {
            return;
        }
        let name = button.variable_name();
        log_user_operation!("按下按钮 '{}'", name);

        let mut session = self.session.lock().await;
        if session.disposed {
            return;
        }
        // 新的按下取代尚未送达的松开
        session.pending_releases.remove(name);
        let value = PlcValue::Bool(true);
        let _ = self
            .perform(&mut session, IoRequest::WriteSymbol { name, value: &value })
            .await;
    }

    /// 按钮松开：写FALSE；失败时按配置加入重发队列
    pub async fn on_release(&self, id: BindingId) {
        let Some(button) = self.button(id).await else {
            warn!("⚠️ 未登记的按钮: {:?}", id);
            return;
        };
        if button.is_blank() {
            return;
        }
        let name = button.variable_name();
        log_user_operation!("松开按钮 '{}'", name);

        let mut session = self.session.lock().await;
        if session.disposed {
            return;
        }
        let value = PlcValue::Bool(false);
        let result = self
            .perform(&mut session, IoRequest::WriteSymbol { name, value: &value })
            .await;

        match result {
            Ok(_) => {
                session.pending_releases.remove(name);
            }
            Err(e) if self.release_retry => {
                warn!("🔁 松开写入失败，加入重发队列: '{}' - {}", name, e);
                session.pending_releases.insert(name.to_string());
            }
            Err(_) => {}
        }
    }

    async fn button(&self, id: BindingId) -> Option<Arc<MomentaryButton>> {
        self.registry.read().await.buttons.get(&id).cloned()
    }

    /// 执行一轮轮询
    ///
    /// 先重发未送达的松开写入，再按登记顺序执行所有指示灯动作。
    /// 任何一个动作失败都不会影响其余动作，也不会返回错误。
    pub async fn poll(&self) {
        if self.release_retry {
            self.retry_pending_releases().await;
        }

        let actions: Vec<Arc<Indicator>> = self
            .registry
            .read()
            .await
            .poll_actions
            .iter()
            .map(|(_, indicator)| indicator.clone())
            .collect();

        for indicator in actions {
            self.refresh_indicator(&indicator).await;
        }
    }

    async fn retry_pending_releases(&self) {
        let mut session = self.session.lock().await;
        if session.disposed || session.pending_releases.is_empty() {
            return;
        }

        let pending: Vec<String> = session.pending_releases.iter().cloned().collect();
        let value = PlcValue::Bool(false);
        for name in pending {
            let request = IoRequest::WriteSymbol { name: &name, value: &value };
            if self.perform(&mut session, request).await.is_ok() {
                info!("✅ 松开写入重发成功: '{}'", name);
                session.pending_releases.remove(&name);
            }
        }
    }

    async fn refresh_indicator(&self, indicator: &Indicator) {
        if indicator.is_blank() {
            return;
        }
        let name = indicator.variable_name();

        let mut session = self.session.lock().await;
        if session.disposed {
            return;
        }
        let result = self
            .perform(&mut session, IoRequest::ReadSymbol { name, data_type: PlcDataType::Bool })
            .await;
        drop(session);

        match result {
            Ok(IoResponse::Value(PlcValue::Bool(value))) => indicator.apply_value(value),
            Ok(_) => {}
            Err(_) => {
                if self.stale_display_policy == StaleDisplayPolicy::MarkUnknown {
                    indicator.mark_unknown();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // 直接读写接口
    // ------------------------------------------------------------------

    /// 按符号名读取变量
    pub async fn read_symbol(&self, name: &str, data_type: PlcDataType) -> AppResult<PlcValue> {
        let mut session = self.session.lock().await;
        match self
            .perform(&mut session, IoRequest::ReadSymbol { name, data_type })
            .await?
        {
            IoResponse::Value(value) => Ok(value),
            _ => Err(AppError::plc_communication_error("读取变量未返回数值")),
        }
    }

    /// 按符号名写入变量
    pub async fn write_symbol(&self, name: &str, value: PlcValue) -> AppResult<()> {
        let mut session = self.session.lock().await;
        self.perform(&mut session, IoRequest::WriteSymbol { name, value: &value })
            .await
            .map(|_| ())
    }

    /// 读取BOOL变量
    pub async fn read_bool(&self, name: &str) -> AppResult<bool> {
        self.read_symbol(name, PlcDataType::Bool).await?.as_bool(name)
    }

    /// 写入BOOL变量
    pub async fn write_bool(&self, name: &str, value: bool) -> AppResult<()> {
        self.write_symbol(name, PlcValue::Bool(value)).await
    }

    /// 按（区域组，偏移）读取原始字节
    pub async fn read_raw(&self, group: u32, offset: u32, len: usize) -> AppResult<Vec<u8>> {
        let mut session = self.session.lock().await;
        match self
            .perform(&mut session, IoRequest::ReadRaw { group, offset, len })
            .await?
        {
            IoResponse::Bytes(bytes) => Ok(bytes),
            _ => Err(AppError::plc_communication_error("读取原始区域未返回数据")),
        }
    }

    /// 按（区域组，偏移）写入原始字节
    pub async fn write_raw(&self, group: u32, offset: u32, data: &[u8]) -> AppResult<()> {
        let mut session = self.session.lock().await;
        self.perform(&mut session, IoRequest::WriteRaw { group, offset, data })
            .await
            .map(|_| ())
    }

    /// 从原始区域读取一个DINT（小端序4字节）
    pub async fn read_dint(&self, group: u32, offset: u32) -> AppResult<i32> {
        let bytes = self.read_raw(group, offset, 4).await?;
        let array: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
            AppError::plc_communication_error(format!(
                "原始区域 {} 返回了 {} 字节，期望 4 字节",
                raw_key(group, offset),
                bytes.len()
            ))
        })?;
        Ok(i32::from_le_bytes(array))
    }

    /// 向原始区域写入一个DINT（小端序4字节）
    pub async fn write_dint(&self, group: u32, offset: u32, value: i32) -> AppResult<()> {
        self.write_raw(group, offset, &value.to_le_bytes()).await
    }

    // ------------------------------------------------------------------
    // 状态查询与释放
    // ------------------------------------------------------------------

    /// 当前处于错误状态的变量名（升序快照）
    pub async fn read_write_errors(&self) -> Vec<String> {
        self.session.lock().await.ledger.names()
    }

    /// 等待重发的松开写入
    pub async fn pending_releases(&self) -> Vec<String> {
        self.session.lock().await.pending_releases.iter().cloned().collect()
    }

    pub async fn is_connected(&self) -> bool {
        let session = self.session.lock().await;
        !session.disposed && session.state == ConnectionState::Connected
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        let session = self.session.lock().await;
        ConnectionStatus {
            endpoint: self.endpoint.to_string(),
            state: session.state,
            last_connect_failure: session.last_connect_failure,
            read_write_errors: session.ledger.names(),
            last_read_write_failure: session.ledger.latest_failure(),
            pending_releases: session.pending_releases.iter().cloned().collect(),
            disposed: session.disposed,
        }
    }

    /// 释放客户端，重复调用无副作用
    pub async fn dispose(&self) {
        let mut session = self.session.lock().await;
        if session.disposed {
            return;
        }
        session.disposed = true;
        session.state = ConnectionState::Disconnected;
        session.client.dispose().await;
        if !session.pending_releases.is_empty() {
            warn!("⚠️ 释放时仍有未送达的松开写入: {:?}", session.pending_releases);
        }
        info!("🔌 通信管理器已释放: {}", self.endpoint);
    }

    // ------------------------------------------------------------------
    // 内部实现
    // ------------------------------------------------------------------

    /// 确保连接可用
    ///
    /// 已连接时直接返回；冷却期内跳过；否则尝试一次连接。
    async fn try_connect(&self, session: &mut Session) -> bool {
        if session.state == ConnectionState::Connected {
            return true;
        }

        if let Some(last_error) = session.last_error_time {
            if last_error.elapsed() < self.reconnect_cooldown {
                debug!("⏳ 冷却期内跳过连接: {}", self.endpoint);
                return false;
            }
        }

        info!("🔗 尝试连接PLC: {}", self.endpoint);
        let outcome = match timeout(self.connect_timeout, session.client.connect(&self.endpoint)).await {
            Ok(Ok(())) => {
                if session.client.is_connected().await {
                    Ok(())
                } else {
                    Err(AppError::connection_error(
                        self.endpoint.to_string(),
                        "连接调用返回成功但客户端报告未连接",
                    ))
                }
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AppError::timeout_error(
                format!("连接 {}", self.endpoint),
                format!("超过 {} ms", self.connect_timeout.as_millis()),
            )),
        };

        match outcome {
            Ok(()) => {
                session.state = ConnectionState::Connected;
                session.last_error_time = None;
                info!("✅ PLC连接成功: {}", self.endpoint);
                true
            }
            Err(e) => {
                session.state = ConnectionState::Disconnected;
                session.last_error_time = Some(Instant::now());
                session.last_connect_failure = Some(Utc::now());
                error!("❌ PLC连接失败: {} - {}", self.endpoint, e);
                false
            }
        }
    }

    /// 连接检查 → 执行请求 → 记录结果
    async fn perform(&self, session: &mut Session, request: IoRequest<'_>) -> AppResult<IoResponse> {
        if session.disposed {
            return Err(AppError::Disposed);
        }
        if !self.try_connect(session).await {
            return Err(AppError::not_connected(format!("{} 当前不可用", self.endpoint)));
        }

        let key = request.ledger_key();
        let mut timed_out = false;
        let outcome = match timeout(self.io_timeout, Self::dispatch(session.client.as_ref(), &request)).await {
            Ok(result) => result,
            Err(_) => {
                timed_out = true;
                Err(AppError::timeout_error(
                    format!("{} '{}'", request.describe(), key),
                    format!("超过 {} ms", self.io_timeout.as_millis()),
                ))
            }
        };

        match &outcome {
            Ok(_) => {
                if session.ledger.record_success(&key) {
                    info!("✅ 变量恢复正常: '{}'", key);
                }
            }
            Err(e) => {
                if session.ledger.record_failure(&key) {
                    log_communication_failure!("{} '{}' 失败: {}", request.describe(), key, e);
                } else {
                    debug!("❌ {} '{}' 仍然失败: {}", request.describe(), key, e);
                }
                if timed_out {
                    // 被取消的请求可能仍有迟到的应答留在链路上，下一次操作必须重新连接
                    session.state = ConnectionState::Disconnected;
                    warn!("⏱️ 请求超时，放弃当前链路: {}", self.endpoint);
                } else if !session.client.is_connected().await {
                    session.state = ConnectionState::Disconnected;
                    warn!("💔 PLC链路已断开: {}", self.endpoint);
                }
            }
        }

        outcome
    }

    async fn dispatch(client: &dyn IPlcClient, request: &IoRequest<'_>) -> AppResult<IoResponse> {
        match request {
            IoRequest::ReadSymbol { name, data_type } => {
                let value = client.read_symbol(name, *data_type).await?;
                if value.data_type() != *data_type {
                    return Err(AppError::type_mismatch(
                        *name,
                        data_type.to_string(),
                        value.data_type().to_string(),
                    ));
                }
                Ok(IoResponse::Value(value))
            }
            IoRequest::WriteSymbol { name, value } => {
                client.write_symbol(name, value).await?;
                Ok(IoResponse::Done)
            }
            IoRequest::ReadRaw { group, offset, len } => {
                Ok(IoResponse::Bytes(client.read_raw(*group, *offset, *len).await?))
            }
            IoRequest::WriteRaw { group, offset, data } => {
                client.write_raw(*group, *offset, data).await?;
                Ok(IoResponse::Done)
            }
        }
    }
}

#[async_trait]
impl BaseService for CommunicationManager {
    fn service_name(&self) -> &'static str {
        "CommunicationManager"
    }

    /// 尝试首次连接；连接失败不视为初始化失败，之后的操作会按冷却策略重连
    async fn initialize(&mut self) -> AppResult<()> {
        let mut session = self.session.lock().await;
        if session.disposed {
            return Err(AppError::Disposed);
        }
        if !self.try_connect(&mut session).await {
            warn!("⚠️ 首次连接未成功，将在后续操作中重试: {}", self.endpoint);
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> AppResult<()> {
        self.dispose().await;
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        let session = self.session.lock().await;
        if session.disposed {
            return Err(AppError::Disposed);
        }
        if session.state != ConnectionState::Connected {
            return Err(AppError::not_connected(format!("{} 未连接", self.endpoint)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::MockIPlcClient;
    use mockall::predicate::*;

    fn comm_config() -> CommConfig {
        CommConfig::default()
    }

    fn manager(client: MockIPlcClient) -> CommunicationManager {
        CommunicationManager::new(Box::new(client), PlcEndpoint::new("127.0.0.1", 851), &comm_config())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_blocks_reconnect_until_window_elapses() {
        let mut client = MockIPlcClient::new();
        client
            .expect_connect()
            .times(2)
            .returning(|endpoint| Err(AppError::connection_error(endpoint.to_string(), "refused")));
        client.expect_is_connected().returning(|| false);

        let manager = manager(client);

        assert!(manager.write_bool("X", true).await.is_err());
        // 冷却期内反复调用不会再次连接
        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(500)).await;
            assert!(manager.write_bool("X", true).await.is_err());
        }
        assert!(manager.read_write_errors().await.is_empty());

        tokio::time::advance(Duration::from_millis(600)).await;
        let err = manager.write_bool("X", true).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_CONNECTED");
        assert!(!manager.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_ok_but_client_not_connected_counts_as_failure() {
        let mut client = MockIPlcClient::new();
        client.expect_connect().times(1).returning(|_| Ok(()));
        client.expect_is_connected().returning(|| false);
        client.expect_write_symbol().never();

        let manager = manager(client);
        assert!(manager.write_bool("X", true).await.is_err());
        assert!(manager.write_bool("X", true).await.is_err());

        let status = manager.connection_status().await;
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(status.last_connect_failure.is_some());
    }

    #[tokio::test]
    async fn test_read_fault_keeps_connection_when_client_still_connected() {
        let mut client = MockIPlcClient::new();
        client.expect_connect().times(1).returning(|_| Ok(()));
        client.expect_is_connected().returning(|| true);
        client
            .expect_read_symbol()
            .with(eq("MAIN.bMissing"), eq(PlcDataType::Bool))
            .returning(|name, _| Err(AppError::symbol_not_found(name)));
        client
            .expect_read_symbol()
            .with(eq("MAIN.bLamp"), eq(PlcDataType::Bool))
            .returning(|_, _| Ok(PlcValue::Bool(true)));

        let manager = manager(client);
        assert!(manager.read_bool("MAIN.bMissing").await.is_err());
        assert!(manager.is_connected().await);
        assert!(manager.read_bool("MAIN.bLamp").await.unwrap());
        assert_eq!(manager.read_write_errors().await, vec!["MAIN.bMissing".to_string()]);
    }

    #[tokio::test]
    async fn test_link_loss_reconnects_on_next_call() {
        let mut client = MockIPlcClient::new();
        let mut seq = mockall::Sequence::new();
        client.expect_connect().times(1).in_sequence(&mut seq).returning(|_| Ok(()));
        client.expect_is_connected().times(1).in_sequence(&mut seq).returning(|| true);
        client
            .expect_write_symbol()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(AppError::plc_communication_error("broken pipe")));
        client.expect_is_connected().times(1).in_sequence(&mut seq).returning(|| false);
        // 链路断开不进入冷却，下一次调用立即重连
        client.expect_connect().times(1).in_sequence(&mut seq).returning(|_| Ok(()));
        client.expect_is_connected().times(1).in_sequence(&mut seq).returning(|| true);
        client.expect_write_symbol().times(1).in_sequence(&mut seq).returning(|_, _| Ok(()));

        let manager = manager(client);
        assert!(manager.write_bool("GVL.start", true).await.is_err());
        assert!(!manager.is_connected().await);
        assert_eq!(manager.read_write_errors().await, vec!["GVL.start".to_string()]);

        manager.write_bool("GVL.start", true).await.unwrap();
        assert!(manager.is_connected().await);
        assert!(manager.read_write_errors().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_value_type_is_recorded() {
        let mut client = MockIPlcClient::new();
        client.expect_connect().returning(|_| Ok(()));
        client.expect_is_connected().returning(|| true);
        client.expect_read_symbol().returning(|_, _| Ok(PlcValue::UInt16(7)));

        let manager = manager(client);
        let err = manager.read_symbol("MAIN.nCode", PlcDataType::Bool).await.unwrap_err();
        assert_eq!(err.error_code(), "TYPE_MISMATCH");
        assert_eq!(manager.read_write_errors().await, vec!["MAIN.nCode".to_string()]);
    }

    #[tokio::test]
    async fn test_dint_raw_access_uses_little_endian() {
        let mut client = MockIPlcClient::new();
        client.expect_connect().returning(|_| Ok(()));
        client.expect_is_connected().returning(|| true);
        client
            .expect_write_raw()
            .withf(|group, offset, data| *group == 0x4020 && *offset == 1 && data.to_vec() == vec![0x2A, 0, 0, 0])
            .times(1)
            .returning(|_, _, _| Ok(()));
        client
            .expect_read_raw()
            .with(eq(0x4020u32), eq(1u32), eq(4usize))
            .returning(|_, _, _| Ok(vec![0xFF, 0xFF, 0xFF, 0xFF]));

        let manager = manager(client);
        manager.write_dint(0x4020, 1, 42).await.unwrap();
        assert_eq!(manager.read_dint(0x4020, 1).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_short_raw_read_is_an_error() {
        let mut client = MockIPlcClient::new();
        client.expect_connect().returning(|_| Ok(()));
        client.expect_is_connected().returning(|| true);
        client.expect_read_raw().returning(|_, _, _| Ok(vec![1, 2]));

        let manager = manager(client);
        assert!(manager.read_dint(0x4020, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_blocks_io() {
        let mut client = MockIPlcClient::new();
        client.expect_dispose().times(1).returning(|| ());
        client.expect_connect().never();

        let mut manager = manager(client);
        manager.dispose().await;
        manager.dispose().await;
        assert_eq!(manager.write_bool("X", true).await.unwrap_err().error_code(), "DISPOSED");
        assert!(manager.health_check().await.is_err());
        // 绑定路径在释放后静默
        manager.poll().await;
        assert!(manager.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_initialize_tolerates_connect_failure() {
        let mut client = MockIPlcClient::new();
        client
            .expect_connect()
            .times(1)
            .returning(|_| Err(AppError::connection_error("127.0.0.1:851", "timeout")));
        client.expect_is_connected().returning(|| false);

        let mut manager = manager(client);
        assert!(manager.initialize().await.is_ok());
        assert_eq!(manager.health_check().await.unwrap_err().error_code(), "NOT_CONNECTED");
        assert_eq!(manager.service_name(), "CommunicationManager");
    }

    #[tokio::test]
    async fn test_passive_binding_is_ignored() {
        let manager = manager(MockIPlcClient::new());
        assert!(manager
            .register(ControlBinding::Passive { kind: "Label".to_string() })
            .await
            .is_none());
        let first = manager.register(Arc::new(Indicator::new("A")).into()).await;
        let second = manager.register(Arc::new(MomentaryButton::new("B")).into()).await;
        assert_eq!(first, Some(BindingId(1)));
        assert_eq!(second, Some(BindingId(2)));
    }
}

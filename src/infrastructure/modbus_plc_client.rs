//! # Modbus TCP PLC客户端
//!
//! ## 业务作用
//! 以Modbus TCP实现 `IPlcClient`：
//! - 通过配置的符号表把变量名映射到Modbus地址
//! - 原始区域组映射到一段寄存器的起始地址
//! - 多寄存器数值按配置的字节序转换
//!
//! ## 地址格式
//! - 0xxxx: 线圈 (Coil)
//! - 1xxxx: 离散输入 (Discrete Input)
//! - 3xxxx: 输入寄存器 (Input Register)
//! - 4xxxx: 保持寄存器 (Holding Register)
//!
//! ## 错误处理
//! - 传输层错误（连接重置、帧错误）视为链路断开，丢弃上下文，`is_connected` 随之返回false
//! - Modbus异常码表示链路仍然可用，只是本次请求被拒绝
//!
//! ## Rust知识点
//! - **tokio_modbus**: 异步Modbus客户端，返回 `Result<Result<T, ExceptionCode>, Error>`
//! - **Mutex<Option<Context>>**: None表示当前没有可用链路

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use crate::domain::services::{IPlcClient, PlcEndpoint};
use crate::models::{ByteOrder, PlcDataType, PlcValue};
use crate::utils::config::{PlcConfig, SymbolConfig};
use crate::utils::error::{AppError, AppResult};

/// Modbus寄存器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModbusRegisterType {
    Coil,           // 0x 线圈
    DiscreteInput,  // 1x 离散输入
    InputRegister,  // 3x 输入寄存器
    HoldingRegister,// 4x 保持寄存器
}

/// 解析Modbus地址
///
/// 不足5位的地址视为省略了首位'0'，按线圈处理
pub fn parse_modbus_address_ex(address: &str, zero_based: bool) -> AppResult<(ModbusRegisterType, u16)> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AppError::validation_error("地址不能为空"));
    }

    let to_protocol = |offset: u16| if zero_based { offset } else { offset.saturating_sub(1) };

    if address.len() < 5 {
        let offset = address.parse::<u16>()
            .map_err(|_| AppError::validation_error(format!("无效的线圈地址: {}", address)))?;
        return Ok((ModbusRegisterType::Coil, to_protocol(offset)));
    }

    let mut chars = address.chars();
    let register_type = match chars.next() {
        Some('0') => ModbusRegisterType::Coil,
        Some('1') => ModbusRegisterType::DiscreteInput,
        Some('3') => ModbusRegisterType::InputRegister,
        Some('4') => ModbusRegisterType::HoldingRegister,
        Some(other) => {
            return Err(AppError::validation_error(format!(
                "不支持的地址类型前缀: '{}' in '{}'",
                other, address
            )))
        }
        None => return Err(AppError::validation_error("地址不能为空")),
    };

    let offset_str = chars.as_str();
    let offset = offset_str.parse::<u16>()
        .map_err(|_| AppError::validation_error(format!("无效的地址偏移量: {}", offset_str)))?;

    Ok((register_type, to_protocol(offset)))
}

/// 按1基地址解析
pub fn parse_modbus_address(address: &str) -> AppResult<(ModbusRegisterType, u16)> {
    parse_modbus_address_ex(address, false)
}

/// 字节序转换工具
///
/// 多寄存器数值先按字节序还原为大端字节流，再解释为具体类型。
/// 单寄存器的INT/UINT不做字节序处理。
pub struct ByteOrderConverter;

impl ByteOrderConverter {
    fn swaps_words(order: ByteOrder) -> bool {
        matches!(order, ByteOrder::CDAB | ByteOrder::DCBA)
    }

    fn swaps_bytes(order: ByteOrder) -> bool {
        matches!(order, ByteOrder::BADC | ByteOrder::DCBA)
    }

    /// 寄存器 → 大端字节流
    pub fn registers_to_bytes(registers: &[u16], order: ByteOrder) -> Vec<u8> {
        let words: Vec<u16> = if Self::swaps_words(order) {
            registers.iter().rev().copied().collect()
        } else {
            registers.to_vec()
        };
        words
            .into_iter()
            .flat_map(|w| if Self::swaps_bytes(order) { w.to_le_bytes() } else { w.to_be_bytes() })
            .collect()
    }

    /// 大端字节流 → 寄存器
    pub fn bytes_to_registers(bytes: &[u8], order: ByteOrder) -> Vec<u16> {
        let mut words: Vec<u16> = bytes
            .chunks(2)
            .map(|pair| {
                let hi = pair[0];
                let lo = pair.get(1).copied().unwrap_or(0);
                if Self::swaps_bytes(order) {
                    u16::from_le_bytes([hi, lo])
                } else {
                    u16::from_be_bytes([hi, lo])
                }
            })
            .collect();
        if Self::swaps_words(order) {
            words.reverse();
        }
        words
    }

    /// 把寄存器内容解释为指定类型
    pub fn decode(registers: &[u16], data_type: PlcDataType, order: ByteOrder) -> AppResult<PlcValue> {
        let expected = data_type.register_count() as usize;
        if data_type != PlcDataType::String && registers.len() < expected {
            return Err(AppError::plc_communication_error(format!(
                "寄存器数量不足: {} 需要 {} 个, 实际 {} 个",
                data_type,
                expected,
                registers.len()
            )));
        }

        let value = match data_type {
            PlcDataType::Bool => PlcValue::Bool(registers[0] != 0),
            PlcDataType::Int16 => PlcValue::Int16(registers[0] as i16),
            PlcDataType::UInt16 => PlcValue::UInt16(registers[0]),
            PlcDataType::Int32 | PlcDataType::UInt32 | PlcDataType::Float32 => {
                let bytes = Self::registers_to_bytes(&registers[..2], order);
                let array = [bytes[0], bytes[1], bytes[2], bytes[3]];
                match data_type {
                    PlcDataType::Int32 => PlcValue::Int32(i32::from_be_bytes(array)),
                    PlcDataType::UInt32 => PlcValue::UInt32(u32::from_be_bytes(array)),
                    _ => PlcValue::Float32(f32::from_be_bytes(array)),
                }
            }
            PlcDataType::Float64 => {
                let bytes = Self::registers_to_bytes(&registers[..4], order);
                let mut array = [0u8; 8];
                array.copy_from_slice(&bytes);
                PlcValue::Float64(f64::from_be_bytes(array))
            }
            PlcDataType::String => {
                // 每个寄存器两个字符，高字节在前，遇到NUL截止
                let bytes: Vec<u8> = registers.iter().flat_map(|w| w.to_be_bytes()).collect();
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                PlcValue::String(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
        };
        Ok(value)
    }

    /// 把值编码为寄存器内容
    pub fn encode(value: &PlcValue, order: ByteOrder, string_length: u16) -> Vec<u16> {
        match value {
            PlcValue::Bool(v) => vec![u16::from(*v)],
            PlcValue::Int16(v) => vec![*v as u16],
            PlcValue::UInt16(v) => vec![*v],
            PlcValue::Int32(v) => Self::bytes_to_registers(&v.to_be_bytes(), order),
            PlcValue::UInt32(v) => Self::bytes_to_registers(&v.to_be_bytes(), order),
            PlcValue::Float32(v) => Self::bytes_to_registers(&v.to_be_bytes(), order),
            PlcValue::Float64(v) => Self::bytes_to_registers(&v.to_be_bytes(), order),
            PlcValue::String(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.resize(string_length as usize, 0);
                bytes
                    .chunks(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
                    .collect()
            }
        }
    }
}

/// 字符串变量占用的寄存器数
fn string_register_count(string_length: u16) -> u16 {
    string_length.div_ceil(2)
}

/// Modbus TCP客户端
pub struct ModbusTcpPlcClient {
    slave_id: u8,
    byte_order: ByteOrder,
    zero_based_address: bool,
    symbols: HashMap<String, SymbolConfig>,
    /// 原始区域组 → 起始地址
    raw_areas: HashMap<u32, String>,
    context: Mutex<Option<Context>>,
}

impl ModbusTcpPlcClient {
    pub fn new(config: &PlcConfig) -> Self {
        Self {
            slave_id: config.slave_id,
            byte_order: config.byte_order,
            zero_based_address: config.zero_based_address,
            symbols: config.symbols.clone(),
            raw_areas: config.raw_areas.clone(),
            context: Mutex::new(None),
        }
    }

    fn symbol(&self, name: &str) -> AppResult<&SymbolConfig> {
        self.symbols.get(name).ok_or_else(|| AppError::symbol_not_found(name))
    }

    fn parse_address(&self, address: &str) -> AppResult<(ModbusRegisterType, u16)> {
        parse_modbus_address_ex(address, self.zero_based_address)
    }

    /// 原始区域的起始寄存器
    fn raw_area_start(&self, group: u32, offset: u32) -> AppResult<(ModbusRegisterType, u16)> {
        let base = self.raw_areas.get(&group).ok_or_else(|| {
            AppError::validation_error(format!("未配置的原始区域组: 0x{:04X}", group))
        })?;
        let (register_type, start) = self.parse_address(base)?;
        if !matches!(register_type, ModbusRegisterType::HoldingRegister | ModbusRegisterType::InputRegister) {
            return Err(AppError::configuration_error(format!(
                "原始区域组 0x{:04X} 必须映射到寄存器地址, 当前为 {}",
                group, base
            )));
        }
        let start = u32::from(start)
            .checked_add(offset)
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| AppError::validation_error(format!("原始区域偏移越界: 0x{:04X}", offset)))?;
        Ok((register_type, start))
    }
}

/// 取出可用的上下文
fn context_mut(guard: &mut Option<Context>) -> AppResult<&mut Context> {
    guard.as_mut().ok_or_else(|| AppError::not_connected("Modbus链路未建立"))
}

/// 处理一次Modbus请求的结果
///
/// 传输层错误会丢弃上下文
fn settle<T>(
    guard: &mut Option<Context>,
    result: Result<Result<T, ExceptionCode>, tokio_modbus::Error>,
    operation: &str,
) -> AppResult<T> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(exception)) => Err(AppError::plc_communication_error(format!(
            "{} Modbus异常: {:?}",
            operation, exception
        ))),
        Err(e) => {
            log::warn!("💔 Modbus链路错误，丢弃连接: {} - {}", operation, e);
            *guard = None;
            Err(AppError::from(e))
        }
    }
}

async fn read_registers(
    guard: &mut Option<Context>,
    register_type: ModbusRegisterType,
    offset: u16,
    count: u16,
    address: &str,
) -> AppResult<Vec<u16>> {
    let ctx = context_mut(guard)?;
    let result = match register_type {
        ModbusRegisterType::HoldingRegister => ctx.read_holding_registers(offset, count).await,
        ModbusRegisterType::InputRegister => ctx.read_input_registers(offset, count).await,
        _ => {
            return Err(AppError::validation_error(format!(
                "地址 {} 不是寄存器地址",
                address
            )))
        }
    };
    settle(guard, result, &format!("读取寄存器 {}", address))
}

async fn write_registers(
    guard: &mut Option<Context>,
    register_type: ModbusRegisterType,
    offset: u16,
    registers: &[u16],
    address: &str,
) -> AppResult<()> {
    if register_type != ModbusRegisterType::HoldingRegister {
        return Err(AppError::validation_error(format!(
            "地址 {} 不是可写的保持寄存器",
            address
        )));
    }
    let ctx = context_mut(guard)?;
    let result = match registers {
        [single] => ctx.write_single_register(offset, *single).await,
        _ => ctx.write_multiple_registers(offset, registers).await,
    };
    settle(guard, result, &format!("写入寄存器 {}", address))
}

#[async_trait]
impl IPlcClient for ModbusTcpPlcClient {
    async fn connect(&self, endpoint: &PlcEndpoint) -> AppResult<()> {
        let socket_addr = tokio::net::lookup_host(endpoint.to_string())
            .await
            .map_err(|e| AppError::connection_error(endpoint.to_string(), format!("地址解析失败: {}", e)))?
            .next()
            .ok_or_else(|| AppError::connection_error(endpoint.to_string(), "地址解析无结果"))?;

        let mut guard = self.context.lock().await;
        if let Some(mut old) = guard.take() {
            let _ = old.disconnect().await;
        }

        let context = tcp::connect_slave(socket_addr, Slave(self.slave_id))
            .await
            .map_err(|e| AppError::connection_error(endpoint.to_string(), format!("Modbus连接失败: {}", e)))?;
        *guard = Some(context);
        log::debug!("🔗 Modbus链路已建立: {} (slave={})", socket_addr, self.slave_id);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.context.lock().await.is_some()
    }

    async fn read_symbol(&self, name: &str, data_type: PlcDataType) -> AppResult<PlcValue> {
        let symbol = self.symbol(name)?;
        if symbol.data_type != data_type {
            return Err(AppError::type_mismatch(name, data_type.to_string(), symbol.data_type.to_string()));
        }
        let (register_type, offset) = self.parse_address(&symbol.address)?;

        let mut guard = self.context.lock().await;
        match (data_type, register_type) {
            (PlcDataType::Bool, ModbusRegisterType::Coil) => {
                let ctx = context_mut(&mut guard)?;
                let result = ctx.read_coils(offset, 1).await;
                let values = settle(&mut guard, result, &format!("读取线圈 {}", name))?;
                Ok(PlcValue::Bool(values.first().copied().unwrap_or(false)))
            }
            (PlcDataType::Bool, ModbusRegisterType::DiscreteInput) => {
                let ctx = context_mut(&mut guard)?;
                let result = ctx.read_discrete_inputs(offset, 1).await;
                let values = settle(&mut guard, result, &format!("读取离散输入 {}", name))?;
                Ok(PlcValue::Bool(values.first().copied().unwrap_or(false)))
            }
            (_, ModbusRegisterType::Coil | ModbusRegisterType::DiscreteInput) => {
                Err(AppError::configuration_error(format!(
                    "变量 {} 为 {}，不能映射到位地址 {}",
                    name, data_type, symbol.address
                )))
            }
            _ => {
                let count = match data_type {
                    PlcDataType::String => string_register_count(symbol.string_length),
                    other => other.register_count(),
                };
                let registers = read_registers(&mut guard, register_type, offset, count, &symbol.address).await?;
                ByteOrderConverter::decode(&registers, data_type, self.byte_order)
            }
        }
    }

    async fn write_symbol(&self, name: &str, value: &PlcValue) -> AppResult<()> {
        let symbol = self.symbol(name)?;
        if symbol.data_type != value.data_type() {
            return Err(AppError::type_mismatch(
                name,
                symbol.data_type.to_string(),
                value.data_type().to_string(),
            ));
        }
        let (register_type, offset) = self.parse_address(&symbol.address)?;

        let mut guard = self.context.lock().await;
        match (value, register_type) {
            (PlcValue::Bool(v), ModbusRegisterType::Coil) => {
                let ctx = context_mut(&mut guard)?;
                let result = ctx.write_single_coil(offset, *v).await;
                settle(&mut guard, result, &format!("写入线圈 {}", name))
            }
            (_, ModbusRegisterType::Coil | ModbusRegisterType::DiscreteInput | ModbusRegisterType::InputRegister) => {
                Err(AppError::validation_error(format!(
                    "变量 {} 的地址 {} 不可写",
                    name, symbol.address
                )))
            }
            _ => {
                let registers = ByteOrderConverter::encode(value, self.byte_order, symbol.string_length);
                write_registers(&mut guard, register_type, offset, &registers, &symbol.address).await
            }
        }
    }

    async fn read_raw(&self, group: u32, offset: u32, len: usize) -> AppResult<Vec<u8>> {
        let (register_type, start) = self.raw_area_start(group, offset)?;
        let count = u16::try_from(len.div_ceil(2))
            .map_err(|_| AppError::validation_error(format!("原始读取长度过大: {}", len)))?;
        let address = format!("0x{:04X}:0x{:04X}", group, offset);

        let mut guard = self.context.lock().await;
        let registers = read_registers(&mut guard, register_type, start, count, &address).await?;
        let mut bytes: Vec<u8> = registers.iter().flat_map(|w| w.to_be_bytes()).collect();
        bytes.truncate(len);
        Ok(bytes)
    }

    async fn write_raw(&self, group: u32, offset: u32, data: &[u8]) -> AppResult<()> {
        if data.len() % 2 != 0 {
            return Err(AppError::validation_error(format!(
                "原始写入长度必须为偶数字节, 实际 {}",
                data.len()
            )));
        }
        let (register_type, start) = self.raw_area_start(group, offset)?;
        let registers: Vec<u16> = data
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        let address = format!("0x{:04X}:0x{:04X}", group, offset);

        let mut guard = self.context.lock().await;
        write_registers(&mut guard, register_type, start, &registers, &address).await
    }

    async fn dispose(&self) {
        if let Some(mut context) = self.context.lock().await.take() {
            let _ = context.disconnect().await;
            log::debug!("🔌 Modbus链路已关闭");
        }
    }
}

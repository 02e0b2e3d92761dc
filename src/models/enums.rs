use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// PLC变量数据类型
///
/// **业务含义**: 描述控制器中一个符号变量的IEC 61131-3类型
/// **类型映射**:
/// - `Bool` ↔ BOOL
/// - `Int16` ↔ INT
/// - `UInt16` ↔ UINT / WORD
/// - `Int32` ↔ DINT
/// - `UInt32` ↔ UDINT / DWORD
/// - `Float32` ↔ REAL
/// - `Float64` ↔ LREAL
/// - `String` ↔ STRING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlcDataType {
    Bool,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
    String,
}

impl PlcDataType {
    /// 该类型在Modbus寄存器中占用的16位字数
    ///
    /// 字符串按每个寄存器两个字符计算，由调用方指定长度
    pub fn register_count(&self) -> u16 {
        match self {
            PlcDataType::Bool => 1,
            PlcDataType::Int16 | PlcDataType::UInt16 => 1,
            PlcDataType::Int32 | PlcDataType::UInt32 | PlcDataType::Float32 => 2,
            PlcDataType::Float64 => 4,
            PlcDataType::String => 0,
        }
    }
}

impl Display for PlcDataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlcDataType::Bool => "BOOL",
            PlcDataType::Int16 => "INT",
            PlcDataType::UInt16 => "UINT",
            PlcDataType::Int32 => "DINT",
            PlcDataType::UInt32 => "UDINT",
            PlcDataType::Float32 => "REAL",
            PlcDataType::Float64 => "LREAL",
            PlcDataType::String => "STRING",
        };
        write!(f, "{}", s)
    }
}

/// 字节序枚举
///
/// 以32位浮点数1.0为例，其IEEE 754表示为0x3F800000
/// - ABCD: 3F80 0000 (大端序，高字在前，高字节在前)
/// - CDAB: 0000 3F80 (低字在前，高字节在前) - 最常见
/// - BADC: 803F 0000 (高字在前，低字节在前)
/// - DCBA: 0000 803F (小端序，低字在前，低字节在前)
///
/// **Rust知识点**:
/// - `Copy`: 支持按位复制，性能更好
/// - `Serialize/Deserialize`: 支持JSON序列化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// 大端序：高字在前，高字节在前 (AB CD)
    ABCD,
    /// 混合序：低字在前，高字节在前 (CD AB) - 默认值
    CDAB,
    /// 混合序：高字在前，低字节在前 (BA DC)
    BADC,
    /// 小端序：低字在前，低字节在前 (DC BA)
    DCBA,
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::CDAB
    }
}

impl Display for ByteOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ByteOrder::ABCD => "ABCD",
            ByteOrder::CDAB => "CDAB",
            ByteOrder::BADC => "BADC",
            ByteOrder::DCBA => "DCBA",
        };
        write!(f, "{}", s)
    }
}

/// 从字符串解析字节序（大小写不敏感）
impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ABCD" => Ok(ByteOrder::ABCD),
            "CDAB" => Ok(ByteOrder::CDAB),
            "BADC" => Ok(ByteOrder::BADC),
            "DCBA" => Ok(ByteOrder::DCBA),
            _ => Err(format!("不支持的字节序格式: {}，支持的格式: ABCD, CDAB, BADC, DCBA", s)),
        }
    }
}

/// 指示灯显示状态
///
/// **业务含义**: 指示灯最近一次轮询得到的显示结果
/// - `Unknown`: 尚未成功读取过，或读取失败后按策略标记为未知
/// - `On`: 变量为TRUE，显示开启颜色
/// - `Off`: 变量为FALSE，显示关闭颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorState {
    Unknown,
    On,
    Off,
}

impl Default for IndicatorState {
    fn default() -> Self {
        IndicatorState::Unknown
    }
}

impl From<bool> for IndicatorState {
    fn from(value: bool) -> Self {
        if value {
            IndicatorState::On
        } else {
            IndicatorState::Off
        }
    }
}

/// 读取失败时指示灯的显示策略
///
/// **业务考虑**:
/// - `RetainLast`: 保留最后一次成功读取的显示
/// - `MarkUnknown`: 切换为未知状态，避免操作员在通信中断期间信任冻结的数值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaleDisplayPolicy {
    RetainLast,
    MarkUnknown,
}

impl Default for StaleDisplayPolicy {
    fn default() -> Self {
        StaleDisplayPolicy::RetainLast
    }
}

//! PLC变量值模型
//!
//! 统一表示符号读写过程中传递的各种数据类型，并负责把操作员输入的文本
//! 转换为变量的目标类型（格式错误在此处产生，不进入通信管理器的错误台账）。

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::models::enums::PlcDataType;
use crate::utils::error::{AppError, AppResult};

/// PLC数据值枚举
///
/// **数据类型映射**:
/// - **Bool**: 对应PLC中的BOOL变量、位标志
/// - **Int16/UInt16**: 对应INT/UINT
/// - **Int32/UInt32**: 对应DINT/UDINT（如轴错误码）
/// - **Float32/Float64**: 对应REAL/LREAL（如位置设定值）
/// - **String**: 对应STRING（如程序结果文本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlcValue {
    Bool(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
    String(String),
}

impl PlcValue {
    /// 值对应的数据类型
    pub fn data_type(&self) -> PlcDataType {
        match self {
            PlcValue::Bool(_) => PlcDataType::Bool,
            PlcValue::Int16(_) => PlcDataType::Int16,
            PlcValue::UInt16(_) => PlcDataType::UInt16,
            PlcValue::Int32(_) => PlcDataType::Int32,
            PlcValue::UInt32(_) => PlcDataType::UInt32,
            PlcValue::Float32(_) => PlcDataType::Float32,
            PlcValue::Float64(_) => PlcDataType::Float64,
            PlcValue::String(_) => PlcDataType::String,
        }
    }

    /// 按布尔值取出，类型不符时返回类型不匹配错误
    pub fn as_bool(&self, symbol: &str) -> AppResult<bool> {
        match self {
            PlcValue::Bool(v) => Ok(*v),
            other => Err(AppError::type_mismatch(
                symbol,
                PlcDataType::Bool.to_string(),
                other.data_type().to_string(),
            )),
        }
    }

    /// 将操作员输入的文本解析为指定类型的值
    ///
    /// **业务场景**: 面板上的数值输入框（如位置设定值）在写入前需要转换类型，
    /// 转换失败属于格式错误，应直接提示操作员，而不是记入通信错误台账。
    ///
    /// **解析规则**:
    /// - 首尾空白会被忽略
    /// - 布尔值接受 `true/false`、`1/0`（大小写不敏感）
    /// - 空文本对除字符串以外的类型都视为格式错误
    pub fn parse_as(text: &str, data_type: PlcDataType) -> AppResult<PlcValue> {
        let trimmed = text.trim();
        if trimmed.is_empty() && data_type != PlcDataType::String {
            return Err(AppError::format_error(text, data_type.to_string(), "输入为空"));
        }

        let format_err = |e: &dyn std::fmt::Display| {
            AppError::format_error(text, data_type.to_string(), e.to_string())
        };

        let value = match data_type {
            PlcDataType::Bool => match trimmed.to_lowercase().as_str() {
                "true" | "1" => PlcValue::Bool(true),
                "false" | "0" => PlcValue::Bool(false),
                _ => return Err(AppError::format_error(text, data_type.to_string(), "不是有效的布尔值")),
            },
            PlcDataType::Int16 => PlcValue::Int16(trimmed.parse::<i16>().map_err(|e| format_err(&e))?),
            PlcDataType::UInt16 => PlcValue::UInt16(trimmed.parse::<u16>().map_err(|e| format_err(&e))?),
            PlcDataType::Int32 => PlcValue::Int32(trimmed.parse::<i32>().map_err(|e| format_err(&e))?),
            PlcDataType::UInt32 => PlcValue::UInt32(trimmed.parse::<u32>().map_err(|e| format_err(&e))?),
            PlcDataType::Float32 => {
                let v = trimmed.parse::<f32>().map_err(|e| format_err(&e))?;
                if !v.is_finite() {
                    return Err(AppError::format_error(text, data_type.to_string(), "数值必须是有限值"));
                }
                PlcValue::Float32(v)
            }
            PlcDataType::Float64 => {
                let v = trimmed.parse::<f64>().map_err(|e| format_err(&e))?;
                if !v.is_finite() {
                    return Err(AppError::format_error(text, data_type.to_string(), "数值必须是有限值"));
                }
                PlcValue::Float64(v)
            }
            PlcDataType::String => PlcValue::String(text.to_string()),
        };

        Ok(value)
    }
}

impl Display for PlcValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PlcValue::Bool(v) => write!(f, "{}", v),
            PlcValue::Int16(v) => write!(f, "{}", v),
            PlcValue::UInt16(v) => write!(f, "{}", v),
            PlcValue::Int32(v) => write!(f, "{}", v),
            PlcValue::UInt32(v) => write!(f, "{}", v),
            PlcValue::Float32(v) => write!(f, "{}", v),
            PlcValue::Float64(v) => write!(f, "{}", v),
            PlcValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for PlcValue {
    fn from(value: bool) -> Self {
        PlcValue::Bool(value)
    }
}

impl From<i32> for PlcValue {
    fn from(value: i32) -> Self {
        PlcValue::Int32(value)
    }
}

impl From<f64> for PlcValue {
    fn from(value: f64) -> Self {
        PlcValue::Float64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setpoint_values() {
        assert_eq!(PlcValue::parse_as(" 12.5 ", PlcDataType::Float64).unwrap(), PlcValue::Float64(12.5));
        assert_eq!(PlcValue::parse_as("-3", PlcDataType::Int32).unwrap(), PlcValue::Int32(-3));
        assert_eq!(PlcValue::parse_as("TRUE", PlcDataType::Bool).unwrap(), PlcValue::Bool(true));
        assert_eq!(PlcValue::parse_as("0", PlcDataType::Bool).unwrap(), PlcValue::Bool(false));
        assert_eq!(PlcValue::parse_as("", PlcDataType::String).unwrap(), PlcValue::String(String::new()));
    }

    #[test]
    fn test_parse_invalid_input_is_format_error() {
        let err = PlcValue::parse_as("1.2.3", PlcDataType::Float64).unwrap_err();
        assert_eq!(err.error_code(), "FORMAT_ERROR");

        let err = PlcValue::parse_as("", PlcDataType::Float32).unwrap_err();
        assert_eq!(err.error_code(), "FORMAT_ERROR");

        let err = PlcValue::parse_as("70000", PlcDataType::Int16).unwrap_err();
        assert_eq!(err.error_code(), "FORMAT_ERROR");

        let err = PlcValue::parse_as("inf", PlcDataType::Float64).unwrap_err();
        assert_eq!(err.error_code(), "FORMAT_ERROR");

        let err = PlcValue::parse_as("yes", PlcDataType::Bool).unwrap_err();
        assert_eq!(err.error_code(), "FORMAT_ERROR");
    }

    #[test]
    fn test_as_bool_type_mismatch() {
        assert!(PlcValue::Bool(true).as_bool("MAIN.x").unwrap());
        let err = PlcValue::UInt32(5).as_bool("MAIN.code").unwrap_err();
        assert_eq!(err.error_code(), "TYPE_MISMATCH");
        assert!(err.to_string().contains("MAIN.code"));
    }
}

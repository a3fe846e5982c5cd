//! # Rover Protocol
//!
//! 外设控制器（串口连接的微控制器）ASCII 协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量定义
//! - `command`: 命令帧构建（`C:<id>:<type>:<args...>;`）
//! - `reply`: 应答帧解析（`<R|E>:<id>:<type>:<args...>;`）
//!
//! ## 帧格式
//!
//! 所有帧都是以冒号分隔、以分号结尾的 ASCII 文本：
//!
//! ```text
//! C:17:FR:0:4:400;      主机 -> 外设：测距命令
//! R:17:FR:35:0;         外设 -> 主机：测距应答（距离 35cm，角度 0°）
//! E:18:TW:258:Syntax;   外设 -> 主机：错误应答
//! ```

pub mod command;
pub mod constants;
pub mod reply;

// 重新导出常用类型
pub use command::*;
pub use constants::*;
pub use reply::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Too few fields: expected at least {expected}, got {actual}")]
    TooFewFields { expected: usize, actual: usize },

    #[error("Unknown message type: {0:?}")]
    UnknownMessageType(String),

    #[error("Unknown command type: {0:?}")]
    UnknownCommandType(String),

    #[error("Invalid number for field {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid field count for {command}: expected {expected}, got {actual}")]
    InvalidFieldCount {
        command: CommandType,
        expected: usize,
        actual: usize,
    },

    #[error("Frame is missing the ';' terminator")]
    MissingTerminator,
}

/// 去掉帧首尾空白和结束符，按分隔符拆分字段
///
/// 外设有时会在帧之间输出换行，解析前统一剥离。
/// 只剥离整帧，字段本身保持原样（错误描述中可能含有空格）。
pub(crate) fn split_fields(raw: &str) -> Result<Vec<&str>, ProtocolError> {
    let body = raw
        .trim()
        .strip_suffix(FRAME_TERMINATOR)
        .ok_or(ProtocolError::MissingTerminator)?;
    Ok(body.split(FIELD_SEPARATOR).collect())
}

/// 解析数值字段
pub(crate) fn parse_number<T: std::str::FromStr>(
    field: &'static str,
    value: &str,
) -> Result<T, ProtocolError> {
    value.parse::<T>().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fields_strips_whitespace_and_terminator() {
        let fields = split_fields("\r\nR:3:FR:35:0;").unwrap();
        assert_eq!(fields, vec!["R", "3", "FR", "35", "0"]);
    }

    #[test]
    fn test_split_fields_keeps_inner_spaces() {
        let fields = split_fields("E:8:TW:260:OpCode 4: bad args;\r\n").unwrap();
        assert_eq!(fields, vec!["E", "8", "TW", "260", "OpCode 4", " bad args"]);
    }

    #[test]
    fn test_split_fields_missing_terminator() {
        assert_eq!(split_fields("R:3:FR:35:0"), Err(ProtocolError::MissingTerminator));
    }

    #[test]
    fn test_parse_number_error_names_field() {
        let err = parse_number::<u32>("id", "abc").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidNumber {
                field: "id",
                value: "abc".to_string()
            }
        );
        assert!(err.to_string().contains("id"));
    }
}

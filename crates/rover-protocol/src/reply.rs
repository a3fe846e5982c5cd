//! 应答帧解析
//!
//! 外设对每条命令回复一帧 `R:<id>:<type>:<args...>;`（成功）或
//! `E:<id>:<type>:<code>[:<text>];`（失败），`<id>` 与原命令一致。

use crate::{
    CommandType, FIELD_SEPARATOR, FIND_RANGE_REPLY_FIELDS, FRAME_TERMINATOR, MIN_HEADER_FIELDS,
    MSG_ERROR, MSG_RESPONSE, ProtocolError, parse_number, split_fields,
};
use std::fmt;

/// 应答类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// `R`
    Response,
    /// `E`
    Error,
}

impl ReplyKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ReplyKind::Response => MSG_RESPONSE,
            ReplyKind::Error => MSG_ERROR,
        }
    }
}

/// 测距结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeReading {
    /// 距离（厘米）
    pub distance_cm: i32,
    /// 舵机角度（度）
    pub angle: i16,
}

/// 应答正文
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    /// `FR` 应答
    Range(RangeReading),
    /// `E` 帧：错误码与可选描述
    Error { code: Option<i32>, text: Option<String> },
    /// 其他命令的应答参数（原样保留）
    Fields(Vec<String>),
}

/// 外设应答帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    pub kind: ReplyKind,
    pub id: u32,
    pub command_type: CommandType,
    pub body: ReplyBody,
}

impl ReplyFrame {
    /// 构造测距应答（模拟外设使用）
    pub fn range(id: u32, reading: RangeReading) -> Self {
        Self {
            kind: ReplyKind::Response,
            id,
            command_type: CommandType::FindRange,
            body: ReplyBody::Range(reading),
        }
    }

    /// 构造无参数应答
    pub fn ack(id: u32, command_type: CommandType) -> Self {
        Self {
            kind: ReplyKind::Response,
            id,
            command_type,
            body: ReplyBody::Fields(Vec::new()),
        }
    }

    /// 构造错误应答
    pub fn error(id: u32, command_type: CommandType, code: i32, text: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Error,
            id,
            command_type,
            body: ReplyBody::Error {
                code: Some(code),
                text: Some(text.into()),
            },
        }
    }

    /// 解析一帧应答
    ///
    /// # 错误
    /// - `TooFewFields`: 字段数少于帧头（消息类型、ID、命令类型）
    /// - `UnknownMessageType`: 消息类型既不是 `R` 也不是 `E`
    /// - `InvalidFieldCount`: `FR` 应答不是恰好 5 个字段
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let fields = split_fields(raw)?;
        if fields.len() < MIN_HEADER_FIELDS {
            return Err(ProtocolError::TooFewFields {
                expected: MIN_HEADER_FIELDS,
                actual: fields.len(),
            });
        }

        let kind = match fields[0] {
            MSG_RESPONSE => ReplyKind::Response,
            MSG_ERROR => ReplyKind::Error,
            other => return Err(ProtocolError::UnknownMessageType(other.to_string())),
        };
        let id = parse_number::<u32>("id", fields[1])?;
        let command_type: CommandType = fields[2].parse()?;
        let args = &fields[MIN_HEADER_FIELDS..];

        let body = match (kind, command_type) {
            (ReplyKind::Error, _) => ReplyBody::Error {
                code: args.first().map(|c| parse_number::<i32>("error_code", c)).transpose()?,
                text: (args.len() > 1).then(|| args[1..].join(":")),
            },
            (ReplyKind::Response, CommandType::FindRange) => {
                if fields.len() != FIND_RANGE_REPLY_FIELDS {
                    return Err(ProtocolError::InvalidFieldCount {
                        command: command_type,
                        expected: FIND_RANGE_REPLY_FIELDS,
                        actual: fields.len(),
                    });
                }
                ReplyBody::Range(RangeReading {
                    distance_cm: parse_number("distance", args[0])?,
                    angle: parse_number("angle", args[1])?,
                })
            },
            (ReplyKind::Response, _) => {
                ReplyBody::Fields(args.iter().map(|s| s.to_string()).collect())
            },
        };

        Ok(Self {
            kind,
            id,
            command_type,
            body,
        })
    }

    /// 编码为线上格式（含结束符）
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReplyFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = FIELD_SEPARATOR;
        write!(f, "{}{sep}{}{sep}{}", self.kind.as_str(), self.id, self.command_type)?;
        match &self.body {
            ReplyBody::Range(reading) => {
                write!(f, "{sep}{}{sep}{}", reading.distance_cm, reading.angle)?;
            },
            ReplyBody::Error { code, text } => {
                if let Some(code) = code {
                    write!(f, "{sep}{code}")?;
                }
                if let Some(text) = text {
                    write!(f, "{sep}{text}")?;
                }
            },
            ReplyBody::Fields(args) => {
                for arg in args {
                    write!(f, "{sep}{arg}")?;
                }
            },
        }
        write!(f, "{FRAME_TERMINATOR}")
    }
}

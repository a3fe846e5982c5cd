//! 命令帧构建
//!
//! 主机发往外设的命令统一为 `C:<id>:<type>:<args...>;`。
//! 解析方向（`CommandFrame::parse`）供模拟外设和测试使用。

use crate::{
    FIELD_SEPARATOR, FRAME_TERMINATOR, MIN_HEADER_FIELDS, MSG_COMMAND, ProtocolError,
    TURN_MODE_FOUR_WHEEL, TURN_MODE_SIDES, TURN_MODE_UNIFORM, parse_number, split_fields,
};
use std::fmt;
use std::str::FromStr;

/// 命令类型
///
/// 命令帧与应答帧共用同一组类型标记。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandType {
    /// `SW`：停止所有车轮
    StopWheels,
    /// `TW`：设置车轮速度
    TurnWheels,
    /// `FR`：超声波测距
    FindRange,
    /// `SR`：状态报告（外设侧未实现，主机只识别不发送）
    StatusReport,
}

impl CommandType {
    /// 协议中的两字母标记
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandType::StopWheels => "SW",
            CommandType::TurnWheels => "TW",
            CommandType::FindRange => "FR",
            CommandType::StatusReport => "SR",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SW" => Ok(CommandType::StopWheels),
            "TW" => Ok(CommandType::TurnWheels),
            "FR" => Ok(CommandType::FindRange),
            "SR" => Ok(CommandType::StatusReport),
            other => Err(ProtocolError::UnknownCommandType(other.to_string())),
        }
    }
}

/// 四轮速度（已完成校准，范围 [-255, 255]，负值为后退）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WheelSpeeds {
    pub left_front: i16,
    pub right_front: i16,
    pub left_rear: i16,
    pub right_rear: i16,
}

impl WheelSpeeds {
    /// 左右两侧速度相同的四轮速度
    pub const fn sides(left: i16, right: i16) -> Self {
        Self {
            left_front: left,
            right_front: right,
            left_rear: left,
            right_rear: right,
        }
    }

    /// 按协议顺序返回：左前、右前、左后、右后
    pub const fn as_array(&self) -> [i16; 4] {
        [self.left_front, self.right_front, self.left_rear, self.right_rear]
    }
}

/// 外设命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// `SW`（无参数）
    StopWheels,
    /// `TW:4:<lf>:<rf>:<lr>:<rr>`
    TurnWheels(WheelSpeeds),
    /// `FR:<angle>:<attempts>:<maxRange>`
    FindRange {
        angle: i16,
        attempts: u8,
        max_range_cm: u16,
    },
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::StopWheels => CommandType::StopWheels,
            Command::TurnWheels(_) => CommandType::TurnWheels,
            Command::FindRange { .. } => CommandType::FindRange,
        }
    }
}

/// 带消息 ID 的命令帧
///
/// # Example
///
/// ```
/// use rover_protocol::{Command, CommandFrame};
///
/// let frame = CommandFrame::new(17, Command::FindRange { angle: 0, attempts: 4, max_range_cm: 400 });
/// assert_eq!(frame.encode(), "C:17:FR:0:4:400;");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub id: u32,
    pub command: Command,
}

impl CommandFrame {
    pub fn new(id: u32, command: Command) -> Self {
        Self { id, command }
    }

    /// 编码为线上格式（含结束符）
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// 解析命令帧
    ///
    /// `TW` 接受子模式 1（统一速度）、2（左右两侧）、4（四轮独立），
    /// 统一展开为四轮速度。
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let fields = split_fields(raw)?;
        if fields.len() < MIN_HEADER_FIELDS {
            return Err(ProtocolError::TooFewFields {
                expected: MIN_HEADER_FIELDS,
                actual: fields.len(),
            });
        }
        if fields[0] != MSG_COMMAND {
            return Err(ProtocolError::UnknownMessageType(fields[0].to_string()));
        }

        let id = parse_number::<u32>("id", fields[1])?;
        let command_type: CommandType = fields[2].parse()?;
        let args = &fields[MIN_HEADER_FIELDS..];

        let command = match command_type {
            CommandType::StopWheels => Command::StopWheels,
            CommandType::TurnWheels => Command::TurnWheels(parse_turn_args(args, fields.len())?),
            CommandType::FindRange => {
                if args.len() != 3 {
                    return Err(ProtocolError::InvalidFieldCount {
                        command: command_type,
                        expected: MIN_HEADER_FIELDS + 3,
                        actual: fields.len(),
                    });
                }
                Command::FindRange {
                    angle: parse_number("angle", args[0])?,
                    attempts: parse_number("attempts", args[1])?,
                    max_range_cm: parse_number("max_range", args[2])?,
                }
            },
            CommandType::StatusReport => {
                return Err(ProtocolError::UnknownCommandType(command_type.to_string()));
            },
        };

        Ok(Self { id, command })
    }
}

fn parse_turn_args(args: &[&str], total: usize) -> Result<WheelSpeeds, ProtocolError> {
    let mode = args
        .first()
        .map(|m| parse_number::<u8>("turn_mode", m))
        .transpose()?
        .unwrap_or(0);
    let speeds = args
        .iter()
        .skip(1)
        .map(|s| parse_number::<i16>("speed", s))
        .collect::<Result<Vec<_>, _>>()?;

    let expected = match mode {
        TURN_MODE_UNIFORM => 1,
        TURN_MODE_SIDES => 2,
        TURN_MODE_FOUR_WHEEL => 4,
        _ => {
            return Err(ProtocolError::InvalidNumber {
                field: "turn_mode",
                value: mode.to_string(),
            });
        },
    };
    if speeds.len() != expected {
        return Err(ProtocolError::InvalidFieldCount {
            command: CommandType::TurnWheels,
            expected: MIN_HEADER_FIELDS + 1 + expected,
            actual: total,
        });
    }

    Ok(match mode {
        TURN_MODE_UNIFORM => WheelSpeeds::sides(speeds[0], speeds[0]),
        TURN_MODE_SIDES => WheelSpeeds::sides(speeds[0], speeds[1]),
        _ => WheelSpeeds {
            left_front: speeds[0],
            right_front: speeds[1],
            left_rear: speeds[2],
            right_rear: speeds[3],
        },
    })
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = FIELD_SEPARATOR;
        write!(f, "{MSG_COMMAND}{sep}{}{sep}{}", self.id, self.command.command_type())?;
        match self.command {
            Command::StopWheels => {},
            Command::TurnWheels(speeds) => {
                write!(f, "{sep}{TURN_MODE_FOUR_WHEEL}")?;
                for speed in speeds.as_array() {
                    write!(f, "{sep}{speed}")?;
                }
            },
            Command::FindRange {
                angle,
                attempts,
                max_range_cm,
            } => {
                write!(f, "{sep}{angle}{sep}{attempts}{sep}{max_range_cm}")?;
            },
        }
        write!(f, "{FRAME_TERMINATOR}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_stop_wheels() {
        let frame = CommandFrame::new(5, Command::StopWheels);
        assert_eq!(frame.encode(), "C:5:SW;");
    }

    #[test]
    fn test_encode_turn_wheels_orders_front_then_rear() {
        let speeds = WheelSpeeds {
            left_front: 100,
            right_front: -50,
            left_rear: 101,
            right_rear: -51,
        };
        let frame = CommandFrame::new(9, Command::TurnWheels(speeds));
        assert_eq!(frame.encode(), "C:9:TW:4:100:-50:101:-51;");
    }

    #[test]
    fn test_encode_find_range() {
        let frame = CommandFrame::new(
            42,
            Command::FindRange {
                angle: -45,
                attempts: 4,
                max_range_cm: 400,
            },
        );
        assert_eq!(frame.encode(), "C:42:FR:-45:4:400;");
    }

    #[test]
    fn test_parse_turn_wheels_modes() {
        let uniform = CommandFrame::parse("C:1:TW:1:120;").unwrap();
        assert_eq!(uniform.command, Command::TurnWheels(WheelSpeeds::sides(120, 120)));

        let sides = CommandFrame::parse("C:2:TW:2:80:-80;").unwrap();
        assert_eq!(sides.command, Command::TurnWheels(WheelSpeeds::sides(80, -80)));

        let four = CommandFrame::parse("C:3:TW:4:1:2:3:4;").unwrap();
        assert_eq!(
            four.command,
            Command::TurnWheels(WheelSpeeds {
                left_front: 1,
                right_front: 2,
                left_rear: 3,
                right_rear: 4,
            })
        );
    }

    #[test]
    fn test_parse_turn_wheels_wrong_count() {
        let err = CommandFrame::parse("C:3:TW:4:1:2;").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFieldCount { .. }));
    }

    #[test]
    fn test_parse_rejects_reply_frames() {
        let err = CommandFrame::parse("R:3:SW;").unwrap_err();
        assert_eq!(err, ProtocolError::UnknownMessageType("R".to_string()));
    }

    #[test]
    fn test_command_type_from_str() {
        assert_eq!("FR".parse::<CommandType>().unwrap(), CommandType::FindRange);
        assert_eq!("SR".parse::<CommandType>().unwrap(), CommandType::StatusReport);
        assert!(matches!(
            "XX".parse::<CommandType>(),
            Err(ProtocolError::UnknownCommandType(_))
        ));
    }

    #[test]
    fn test_parse_matches_encode() {
        let frame = CommandFrame::new(
            77,
            Command::FindRange {
                angle: 30,
                attempts: 2,
                max_range_cm: 0,
            },
        );
        assert_eq!(CommandFrame::parse(&frame.encode()).unwrap(), frame);
    }
}

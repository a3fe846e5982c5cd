//! 协议常量定义

/// 字段分隔符
pub const FIELD_SEPARATOR: char = ':';

/// 帧结束符
pub const FRAME_TERMINATOR: char = ';';

/// 帧结束符（字节形式，供传输层累积帧时使用）
pub const FRAME_TERMINATOR_BYTE: u8 = b';';

/// 消息类型标记：主机发出的命令
pub const MSG_COMMAND: &str = "C";
/// 消息类型标记：外设应答
pub const MSG_RESPONSE: &str = "R";
/// 消息类型标记：外设错误
pub const MSG_ERROR: &str = "E";

/// 帧头字段数（消息类型、ID、命令类型）
pub const MIN_HEADER_FIELDS: usize = 3;

/// 测距应答的字段数：`R:<id>:FR:<distance>:<angle>`
pub const FIND_RANGE_REPLY_FIELDS: usize = 5;

/// 电机速度上限（PWM 占空比，绝对值）
pub const MAX_WHEEL_SPEED: i16 = 255;

/// 测距最大距离（厘米），0 表示不限制
pub const MAX_RANGE_CM: u16 = 400;

/// 测距舵机角度范围（度），正值向右
pub const MAX_RANGE_ANGLE: i16 = 90;

/// 单次测距平均的最大采样次数
pub const MAX_RANGE_ATTEMPTS: u8 = 8;

/// `TW` 命令子模式：统一速度（1 个参数）
pub const TURN_MODE_UNIFORM: u8 = 1;
/// `TW` 命令子模式：左右两侧（2 个参数）
pub const TURN_MODE_SIDES: u8 = 2;
/// `TW` 命令子模式：四轮独立（4 个参数）
pub const TURN_MODE_FOUR_WHEEL: u8 = 4;

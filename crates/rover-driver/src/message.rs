//! 消息类型与 ID 分配
//!
//! 线程之间交换的每一条消息都带一个进程内唯一的 ID。
//! 命令类消息（电机、测距、急停）可以编码为外设线上格式，
//! 外设应答中的 ID 与之对应，用于在 [`MailBag`](crate::MailBag) 中找回原命令。

use crate::config::MotorCalibration;
use rover_protocol::{
    Command, CommandFrame, CommandType, MAX_RANGE_ANGLE, MAX_RANGE_ATTEMPTS, MAX_RANGE_CM,
    MAX_WHEEL_SPEED, RangeReading, WheelSpeeds,
};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// 消息 ID 上限（2^31 - 1），超过后回绕到 1
pub const MAX_MESSAGE_ID: u32 = 0x7FFF_FFFF;

/// 消息 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u32);

impl MessageId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 单调递增的 ID 分配器
///
/// 无锁实现（CAS），任意线程并发调用都不会拿到重复的 ID，
/// 直到序列回绕。序列从 1 开始，永远不会返回 0。
#[derive(Debug)]
pub struct IdAllocator {
    last: AtomicU32,
}

impl IdAllocator {
    pub const fn new() -> Self {
        Self::starting_after(0)
    }

    /// 从指定位置之后开始分配（测试回绕用）
    pub const fn starting_after(last: u32) -> Self {
        Self {
            last: AtomicU32::new(last),
        }
    }

    pub fn next_id(&self) -> MessageId {
        let advance = |cur: u32| if cur < MAX_MESSAGE_ID { cur + 1 } else { 1 };
        let prev = match self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| Some(advance(cur)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        MessageId(advance(prev))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

static MESSAGE_IDS: IdAllocator = IdAllocator::new();

/// 分配下一个进程内消息 ID
pub fn next_id() -> MessageId {
    MESSAGE_IDS.next_id()
}

/// 电机命令（左右两侧速度，范围 [-255, 255]）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand {
    left_speed: i16,
    right_speed: i16,
}

impl MotorCommand {
    /// 速度超出范围时截断到 [-255, 255]
    pub fn new(left_speed: i32, right_speed: i32) -> Self {
        Self {
            left_speed: clamp_speed(left_speed),
            right_speed: clamp_speed(right_speed),
        }
    }

    /// 直行（负速度为后退）
    pub fn straight(speed: i32) -> Self {
        Self::new(speed, speed)
    }

    /// 转弯：外侧保持 `speed`，内侧减去 `rate`
    pub fn turn(right_turn: bool, speed: i32, rate: i32) -> Self {
        let inner = speed.saturating_sub(rate);
        if right_turn {
            Self::new(speed, inner)
        } else {
            Self::new(inner, speed)
        }
    }

    pub fn stop() -> Self {
        Self::new(0, 0)
    }

    pub fn left_speed(&self) -> i16 {
        self.left_speed
    }

    pub fn right_speed(&self) -> i16 {
        self.right_speed
    }

    /// 两侧速度都为 0 即为停车
    pub fn is_stop(&self) -> bool {
        self.left_speed == 0 && self.right_speed == 0
    }

    fn to_command(self, calibration: &MotorCalibration) -> Command {
        if self.is_stop() {
            return Command::StopWheels;
        }
        Command::TurnWheels(WheelSpeeds::sides(
            calibration.convert(self.left_speed),
            calibration.convert(self.right_speed),
        ))
    }
}

fn clamp_speed(speed: i32) -> i16 {
    let max = i32::from(MAX_WHEEL_SPEED);
    speed.clamp(-max, max) as i16
}

/// 测距命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeCommand {
    max_range_cm: u16,
    angle: i16,
    attempts: u8,
}

impl RangeCommand {
    /// 参数超出范围时截断：距离 [0, 400]（0 表示不限），角度 [-90, 90]，次数 [1, 8]
    pub fn new(max_range_cm: i32, angle: i32, attempts: i32) -> Self {
        let max_angle = i32::from(MAX_RANGE_ANGLE);
        Self {
            max_range_cm: max_range_cm.clamp(0, i32::from(MAX_RANGE_CM)) as u16,
            angle: angle.clamp(-max_angle, max_angle) as i16,
            attempts: attempts.clamp(1, i32::from(MAX_RANGE_ATTEMPTS)) as u8,
        }
    }

    /// 保持其他参数，修改舵机角度
    pub fn at_angle(self, angle: i32) -> Self {
        Self::new(i32::from(self.max_range_cm), angle, i32::from(self.attempts))
    }

    pub fn max_range_cm(&self) -> u16 {
        self.max_range_cm
    }

    pub fn angle(&self) -> i16 {
        self.angle
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    fn to_command(self) -> Command {
        Command::FindRange {
            angle: self.angle,
            attempts: self.attempts,
            max_range_cm: self.max_range_cm,
        }
    }
}

impl Default for RangeCommand {
    fn default() -> Self {
        Self {
            max_range_cm: MAX_RANGE_CM,
            angle: 0,
            attempts: 4,
        }
    }
}

/// 运动状态通知（命令线程 -> 看门狗线程，不会发往外设）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogNotice {
    pub moving: bool,
}

/// 日志级别（显示通知用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Verbose,
    Debug,
    Information,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Verbose => "VERBOSE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Information => "INFORMATION",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// 发往显示端的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayNotice {
    /// 最新测距结果
    Range(RangeReading),
    /// 带级别的文本
    Log { level: LogLevel, text: String },
}

/// 消息正文
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Motor(MotorCommand),
    Range(RangeCommand),
    /// 急停（带外，发送后清空命令通道的普通队列）
    EmergencyStop,
    Watchdog(WatchdogNotice),
    Display(DisplayNotice),
}

impl Payload {
    /// 变体名称（错误信息和日志用）
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Motor(_) => "MotorCommand",
            Payload::Range(_) => "RangeCommand",
            Payload::EmergencyStop => "EmergencyStop",
            Payload::Watchdog(_) => "WatchdogNotice",
            Payload::Display(_) => "DisplayNotice",
        }
    }

    pub fn is_out_of_band(&self) -> bool {
        matches!(self, Payload::EmergencyStop)
    }

    pub fn flush_on_send(&self) -> bool {
        matches!(self, Payload::EmergencyStop)
    }

    /// 是否为发往外设的命令
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Payload::Motor(_) | Payload::Range(_) | Payload::EmergencyStop
        )
    }
}

/// 线程间消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    processed: bool,
    payload: Payload,
}

impl Message {
    /// 创建消息并分配新 ID
    pub fn new(payload: Payload) -> Self {
        Self::with_id(next_id(), payload)
    }

    /// 使用指定 ID 创建消息（不经过全局分配器）
    pub fn with_id(id: MessageId, payload: Payload) -> Self {
        Self {
            id,
            processed: false,
            payload,
        }
    }

    pub fn motor(command: MotorCommand) -> Self {
        Self::new(Payload::Motor(command))
    }

    pub fn range(command: RangeCommand) -> Self {
        Self::new(Payload::Range(command))
    }

    pub fn emergency_stop() -> Self {
        Self::new(Payload::EmergencyStop)
    }

    pub fn watchdog(moving: bool) -> Self {
        Self::new(Payload::Watchdog(WatchdogNotice { moving }))
    }

    pub fn display(notice: DisplayNotice) -> Self {
        Self::new(Payload::Display(notice))
    }

    pub fn log(level: LogLevel, text: impl Into<String>) -> Self {
        Self::display(DisplayNotice::Log {
            level,
            text: text.into(),
        })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    pub fn is_out_of_band(&self) -> bool {
        self.payload.is_out_of_band()
    }

    pub fn flush_on_send(&self) -> bool {
        self.payload.flush_on_send()
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// 标记为已交给外设链路
    pub fn mark_processed(&mut self) {
        self.processed = true;
    }

    /// 对应的外设命令类型（非命令消息返回 `None`）
    pub fn command_type(&self) -> Option<CommandType> {
        match self.payload {
            Payload::Motor(motor) if motor.is_stop() => Some(CommandType::StopWheels),
            Payload::Motor(_) => Some(CommandType::TurnWheels),
            Payload::Range(_) => Some(CommandType::FindRange),
            Payload::EmergencyStop => Some(CommandType::StopWheels),
            Payload::Watchdog(_) | Payload::Display(_) => None,
        }
    }

    /// 转换为命令帧
    ///
    /// `WatchdogNotice` 和 `DisplayNotice` 只在进程内流转，没有线上格式。
    pub fn to_frame(&self, calibration: &MotorCalibration) -> Option<CommandFrame> {
        let command = match self.payload {
            Payload::Motor(motor) => motor.to_command(calibration),
            Payload::Range(range) => range.to_command(),
            Payload::EmergencyStop => Command::StopWheels,
            Payload::Watchdog(_) | Payload::Display(_) => return None,
        };
        Some(CommandFrame::new(self.id.get(), command))
    }

    /// 编码为线上格式 `C:<id>:<type>:<args...>;`
    pub fn encode(&self, calibration: &MotorCalibration) -> Option<String> {
        self.to_frame(calibration).map(|frame| frame.encode())
    }
}

impl From<MotorCommand> for Message {
    fn from(command: MotorCommand) -> Self {
        Self::motor(command)
    }
}

impl From<RangeCommand> for Message {
    fn from(command: RangeCommand) -> Self {
        Self::range(command)
    }
}

//! 通道注册表
//!
//! 逻辑端点到通道的映射，在运行时启动时创建一次，之后只读。
//! 通过 `Arc<RoverContext>` 共享给各个线程，不使用全局单例。

use crate::channel::Channel;
use crate::message::Payload;
use std::fmt;

/// 逻辑端点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Display,
    Watchdog,
    BluedotInput,
    Command,
    Response,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Display,
        Endpoint::Watchdog,
        Endpoint::BluedotInput,
        Endpoint::Command,
        Endpoint::Response,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Endpoint::Display => "display",
            Endpoint::Watchdog => "watchdog",
            Endpoint::BluedotInput => "bluedot-input",
            Endpoint::Command => "command",
            Endpoint::Response => "response",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 显示通道最多积压的通知数
///
/// 显示端只关心最新的测距结果，没有消费者时旧通知被丢弃。
pub const DISPLAY_BACKLOG: usize = 16;

fn command_capability(payload: &Payload) -> bool {
    payload.is_command()
}

fn watchdog_capability(payload: &Payload) -> bool {
    matches!(payload, Payload::Watchdog(_))
}

fn display_capability(payload: &Payload) -> bool {
    matches!(payload, Payload::Display(_))
}

/// 通道注册表
///
/// 预先创建 command、display、watchdog 三个通道；
/// bluedot-input 和 response 端点没有通道。
#[derive(Debug)]
pub struct ChannelRegistry {
    command: Channel,
    display: Channel,
    watchdog: Channel,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            command: Channel::new(Endpoint::Command.name(), command_capability),
            display: Channel::bounded(Endpoint::Display.name(), display_capability, DISPLAY_BACKLOG),
            watchdog: Channel::new(Endpoint::Watchdog.name(), watchdog_capability),
        }
    }

    pub fn get(&self, endpoint: Endpoint) -> Option<&Channel> {
        match endpoint {
            Endpoint::Command => Some(&self.command),
            Endpoint::Display => Some(&self.display),
            Endpoint::Watchdog => Some(&self.watchdog),
            Endpoint::BluedotInput | Endpoint::Response => None,
        }
    }

    pub fn command(&self) -> &Channel {
        &self.command
    }

    pub fn display(&self) -> &Channel {
        &self.display
    }

    pub fn watchdog(&self) -> &Channel {
        &self.watchdog
    }

    /// 关闭所有通道（唤醒阻塞的接收方）
    pub fn close_all(&self) {
        self.command.close();
        self.display.close();
        self.watchdog.close();
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

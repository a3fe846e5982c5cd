//! 驱动层错误类型定义

use crate::message::Message;
use rover_link::LinkError;
use rover_protocol::ProtocolError;
use thiserror::Error;

/// 通道错误
#[derive(Error, Debug)]
pub enum ChannelError {
    /// 通道不接受该消息类型（配置错误，消息原样退回给调用方）
    #[error("Message type {kind} is not supported by the {channel} channel")]
    Unsupported {
        kind: &'static str,
        channel: &'static str,
        message: Box<Message>,
    },

    /// 通道已关闭（运行时正在退出）
    ///
    /// 发送时携带被拒绝的消息，接收时为 `None`。
    #[error("Channel closed")]
    Disconnected(Option<Box<Message>>),
}

impl ChannelError {
    /// 取回未能投递的消息
    pub fn into_message(self) -> Option<Message> {
        match self {
            ChannelError::Unsupported { message, .. } => Some(*message),
            ChannelError::Disconnected(message) => message.map(|m| *m),
        }
    }
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 外设链路错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 通道错误
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// 线程创建失败
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(std::io::Error),

    /// 运行时已停止
    #[error("Rover is not running")]
    NotRunning,

    /// 构建器未指定设备路径
    #[error("No peripheral device configured")]
    MissingDevice,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, MotorCommand};

    #[test]
    fn test_unsupported_error_names_variant_and_channel() {
        let message = Message::motor(MotorCommand::straight(100));
        let err = ChannelError::Unsupported {
            kind: message.kind(),
            channel: "watchdog",
            message: Box::new(message.clone()),
        };
        assert_eq!(
            err.to_string(),
            "Message type MotorCommand is not supported by the watchdog channel"
        );
        assert_eq!(err.into_message().map(|m| m.id()), Some(message.id()));
    }

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::Link(LinkError::Closed);
        assert_eq!(err.to_string(), "Link error: Link closed");

        let err = DriverError::Protocol(ProtocolError::MissingTerminator);
        assert!(err.to_string().starts_with("Protocol error"));

        let err: DriverError = ChannelError::Disconnected(None).into();
        assert_eq!(err.to_string(), "Channel error: Channel closed");
    }
}

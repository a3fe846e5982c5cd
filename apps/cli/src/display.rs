//! 控制台显示
//!
//! 消费显示通道，把测距结果和日志通知打印到终端。

use anyhow::{Context, Result};
use rover_driver::{DisplayNotice, LogLevel, Message, Payload, RoverContext};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// 启动显示线程（通道关闭后退出）
pub fn spawn(ctx: Arc<RoverContext>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("rover-display".to_string())
        .spawn(move || {
            while let Ok(message) = ctx.registry.display().receive_blocking() {
                if let Some(line) = render(&message) {
                    println!("{line}");
                }
            }
        })
        .context("创建显示线程失败")
}

pub fn render(message: &Message) -> Option<String> {
    match message.payload() {
        Payload::Display(DisplayNotice::Range(reading)) => Some(format!(
            "📏 {:>3} cm @ {:+}°",
            reading.distance_cm, reading.angle
        )),
        Payload::Display(DisplayNotice::Log { level, text }) => {
            let icon = match level {
                LogLevel::Verbose | LogLevel::Debug => "·",
                LogLevel::Information => "ℹ️ ",
                LogLevel::Warning => "⚠️ ",
                LogLevel::Error => "❌",
            };
            Some(format!("{icon} [{level}] {text}"))
        },
        _ => None,
    }
}

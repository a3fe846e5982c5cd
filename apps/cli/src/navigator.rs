//! 标准输入驾驶命令
//!
//! 每行一条命令：
//! - `f <speed>` / `b <speed>`：前进 / 后退
//! - `l <speed> <rate>` / `r <speed> <rate>`：左转 / 右转（内侧减速 `rate`）
//! - `s`：停车
//! - `range [angle]`：测距一次
//! - `estop`：急停（丢弃排队命令）
//! - `metrics`：打印运行指标
//! - `quit`：退出

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, unbounded};
use rover_driver::{Message, MetricsSnapshot, MotorCommand, RangeCommand, Rover};
use std::io::BufRead;
use std::thread;

pub const HELP: &str = "命令: f <speed> | b <speed> | l <speed> <rate> | r <speed> <rate> | s | range [angle] | estop | metrics | help | quit";

/// 驾驶命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    /// 直行（负速度后退）
    Drive(i32),
    Turn { right: bool, speed: i32, rate: i32 },
    Stop,
    Range(Option<i32>),
    EmergencyStop,
    Metrics,
    Help,
    Quit,
}

fn number(args: &[&str], index: usize, name: &str) -> Result<i32> {
    let raw = args.get(index).with_context(|| format!("缺少参数 <{name}>"))?;
    raw.parse().with_context(|| format!("<{name}> 不是整数: {raw}"))
}

impl NavCommand {
    /// 解析一行输入，空行返回 `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "f" | "forward" => NavCommand::Drive(number(args, 0, "speed")?),
            "b" | "back" => NavCommand::Drive(number(args, 0, "speed")?.saturating_neg()),
            "l" | "left" | "r" | "right" => NavCommand::Turn {
                right: verb.starts_with(['r', 'R']),
                speed: number(args, 0, "speed")?,
                rate: number(args, 1, "rate")?,
            },
            "s" | "stop" => NavCommand::Stop,
            "range" => NavCommand::Range(if args.is_empty() {
                None
            } else {
                Some(number(args, 0, "angle")?)
            }),
            "estop" => NavCommand::EmergencyStop,
            "metrics" => NavCommand::Metrics,
            "help" | "?" => NavCommand::Help,
            "q" | "quit" | "exit" => NavCommand::Quit,
            other => bail!("未知命令: {other}"),
        };
        Ok(Some(command))
    }

    /// 对应的命令消息（`metrics`、`help`、`quit` 没有）
    pub fn to_message(self) -> Option<Message> {
        match self {
            NavCommand::Drive(speed) => Some(MotorCommand::straight(speed).into()),
            NavCommand::Turn { right, speed, rate } => {
                Some(MotorCommand::turn(right, speed, rate).into())
            },
            NavCommand::Stop => Some(MotorCommand::stop().into()),
            NavCommand::Range(angle) => {
                let range = RangeCommand::default();
                Some(angle.map_or(range, |a| range.at_angle(a)).into())
            },
            NavCommand::EmergencyStop => Some(Message::emergency_stop()),
            NavCommand::Metrics | NavCommand::Help | NavCommand::Quit => None,
        }
    }
}

/// 专用输入线程：逐行读取标准输入，EOF 时关闭通道
pub fn spawn_input() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("rover-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("创建输入线程失败")?;
    Ok(rx)
}

/// 执行一行输入，返回 `false` 表示退出
pub fn handle_line(rover: &Rover, line: &str) -> bool {
    let command = match NavCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            println!("⚠️  {e:#}");
            return true;
        },
    };

    match command {
        NavCommand::Quit => return false,
        NavCommand::Help => println!("{HELP}"),
        NavCommand::Metrics => print_metrics(&rover.metrics()),
        other => {
            if let Some(message) = other.to_message() {
                match rover.send(message) {
                    Ok(id) => println!("➡️  #{id} {other:?}"),
                    Err(e) => println!("❌ {e}"),
                }
            }
        },
    }
    true
}

pub fn print_metrics(m: &MetricsSnapshot) {
    println!("📊 Rover metrics");
    println!("  commands sent:        {}", m.commands_sent);
    println!("  write errors:         {}", m.write_errors);
    println!("  commands flushed:     {}", m.commands_flushed);
    println!("  frames received:      {}", m.frames_received);
    println!("  malformed frames:     {}", m.malformed_frames);
    println!("  read errors:          {}", m.read_errors);
    println!(
        "  replies correlated:   {} ({:.1}%)",
        m.responses_correlated,
        m.correlation_rate()
    );
    println!("  replies uncorrelated: {}", m.responses_uncorrelated);
    println!("  error replies:        {}", m.error_replies);
    println!("  emergency stops:      {}", m.emergency_stops);
    println!("  range polls:          {}", m.range_polls);
    println!("  motion notices:       {}", m.motion_notices);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_driver::{MotorCalibration, Payload};

    #[test]
    fn test_parse_drive() {
        assert_eq!(NavCommand::parse("f 150").unwrap(), Some(NavCommand::Drive(150)));
        assert_eq!(NavCommand::parse("  B 90 ").unwrap(), Some(NavCommand::Drive(-90)));
        assert_eq!(NavCommand::parse("").unwrap(), None);
    }

    #[test]
    fn test_parse_turn() {
        assert_eq!(
            NavCommand::parse("r 200 50").unwrap(),
            Some(NavCommand::Turn {
                right: true,
                speed: 200,
                rate: 50
            })
        );
        assert_eq!(
            NavCommand::parse("left 120 40").unwrap(),
            Some(NavCommand::Turn {
                right: false,
                speed: 120,
                rate: 40
            })
        );
        assert!(NavCommand::parse("l 120").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(NavCommand::parse("f fast").is_err());
        assert!(NavCommand::parse("jump").is_err());
    }

    #[test]
    fn test_range_message_uses_angle() {
        let message = NavCommand::parse("range -30").unwrap().unwrap().to_message().unwrap();
        assert_eq!(
            message.encode(&MotorCalibration::default()),
            Some(format!("C:{}:FR:-30:4:400;", message.id()))
        );
    }

    #[test]
    fn test_to_message() {
        let estop = NavCommand::EmergencyStop.to_message().unwrap();
        assert_eq!(estop.payload(), &Payload::EmergencyStop);
        let stop = NavCommand::Stop.to_message().unwrap();
        assert_eq!(stop.payload(), &Payload::Motor(MotorCommand::stop()));
        assert!(NavCommand::Metrics.to_message().is_none());
        assert!(NavCommand::Quit.to_message().is_none());
    }
}

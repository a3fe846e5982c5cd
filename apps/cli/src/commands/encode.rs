//! 编码命令
//!
//! 打印驾驶命令对应的外设线上格式，不连接设备。

use crate::commands::config::CliConfig;
use crate::navigator::NavCommand;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct EncodeCommand {
    /// 驾驶命令（如 "f 150"、"r 200 60"、"range 45"）
    pub command: String,

    /// 电机最低速度（覆盖配置文件的 motor.slowest_speed）
    #[arg(long)]
    pub slowest: Option<u8>,

    /// 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl EncodeCommand {
    pub fn execute(&self) -> Result<()> {
        println!("{}", self.encode()?);
        Ok(())
    }

    fn encode(&self) -> Result<String> {
        let mut calibration = CliConfig::load(self.config.as_deref())?.pipeline.motor;
        if let Some(slowest) = self.slowest {
            calibration.slowest_speed = slowest;
        }

        let message = NavCommand::parse(&self.command)?
            .and_then(NavCommand::to_message)
            .with_context(|| format!("\"{}\" 不是外设命令", self.command))?;
        message
            .encode(&calibration)
            .with_context(|| format!("{} 没有线上格式", message.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(command: &str, slowest: Option<u8>) -> Result<String> {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "").unwrap();
        EncodeCommand {
            command: command.to_string(),
            slowest,
            config: Some(config),
        }
        .encode()
    }

    #[test]
    fn test_encode_turn() {
        let wire = encode("r 200 60", None).unwrap();
        assert!(wire.ends_with(":TW:4:200:140:200:140;"), "{wire}");
    }

    #[test]
    fn test_encode_with_calibration() {
        let wire = encode("f 1", Some(100)).unwrap();
        assert!(wire.ends_with(":TW:4:100:100:100:100;"), "{wire}");
    }

    #[test]
    fn test_encode_rejects_non_commands() {
        assert!(encode("metrics", None).is_err());
        assert!(encode("", None).is_err());
    }
}

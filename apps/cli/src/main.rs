//! # Rover CLI
//!
//! 小车命令行工具。
//!
//! ```bash
//! # 生成默认配置
//! rover-cli config init --device /dev/rfcomm0
//!
//! # 连接外设，从标准输入读取驾驶命令
//! rover-cli run
//!
//! # 不接硬件，使用模拟外设
//! rover-cli run --simulate
//!
//! # 查看命令的线上格式
//! rover-cli encode "l 200 80"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod display;
mod navigator;
mod sim;

use commands::{ConfigCommand, EncodeCommand, RunCommand};

/// Rover CLI - 小车命令行工具
#[derive(Parser, Debug)]
#[command(name = "rover-cli")]
#[command(about = "Command-line interface for driving the rover", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 启动控制线程并从标准输入驾驶
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 打印驾驶命令的线上格式
    Encode {
        #[command(flatten)]
        args: EncodeCommand,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rover_cli=info,rover_driver=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Run { args } => args.execute(),
        Commands::Encode { args } => args.execute(),
    }
}

//! 运行命令
//!
//! 启动控制线程，连接真实外设或模拟外设，从标准输入读取驾驶命令。
//! Ctrl-C 或 `quit` 时先停车再关闭。

use crate::commands::config::CliConfig;
use crate::{display, navigator, sim};
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::{bounded, select};
use rover_driver::{Rover, RoverBuilder};
use std::path::PathBuf;
use tracing::warn;

/// 运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 外设串口设备（覆盖配置）
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// 使用模拟外设
    #[arg(long, conflicts_with = "device")]
    pub simulate: bool,

    /// 模拟外设随机种子
    #[arg(long, requires = "simulate")]
    pub seed: Option<u64>,

    /// 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        let config = CliConfig::load(self.config.as_deref())?;
        let builder = RoverBuilder::new().pipeline_config(config.pipeline);

        let rover = if self.simulate {
            println!("🧪 使用模拟外设");
            builder.build_with_link(sim::link(self.seed))?
        } else {
            let device = self
                .device
                .clone()
                .or(config.device)
                .context("未指定外设设备（--device 或配置文件中的 device）")?;
            println!("🔌 连接外设 {}", device.display());
            builder.device(device).build()?
        };

        let display = display::spawn(rover.context().clone())?;

        let (interrupt_tx, interrupt_rx) = bounded(1);
        ctrlc::set_handler(move || {
            let _ = interrupt_tx.try_send(());
        })
        .context("设置 Ctrl-C 处理器失败")?;

        let lines = navigator::spawn_input()?;
        println!("{}", navigator::HELP);

        loop {
            select! {
                recv(lines) -> line => match line {
                    Ok(line) => {
                        if !navigator::handle_line(&rover, &line) {
                            break;
                        }
                    },
                    // 标准输入结束
                    Err(_) => break,
                },
                recv(interrupt_rx) -> _ => {
                    println!("\n🛑 收到 Ctrl-C");
                    break;
                },
            }
            if !rover.is_healthy() {
                warn!("A control thread has exited, shutting down");
                break;
            }
        }

        stop_before_exit(&rover);
        let metrics = rover.metrics();
        rover.shutdown();
        let _ = display.join();
        navigator::print_metrics(&metrics);
        Ok(())
    }
}

/// 排队停车命令
///
/// 关闭时命令线程会先写完通道中剩余的命令再退出，停车命令不会丢失。
fn stop_before_exit(rover: &Rover) {
    if let Err(e) = rover.stop() {
        warn!("Failed to queue final stop: {}", e);
    }
}

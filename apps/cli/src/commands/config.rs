//! 配置管理命令
//!
//! 配置文件为 TOML：顶层 `device` 指定外设设备，`[pipeline]` 表为控制线程参数。
//!
//! ```toml
//! device = "/dev/rfcomm0"
//!
//! [pipeline]
//! min_safe_range_cm = 15
//!
//! [pipeline.watchdog]
//! interval_ms = 500
//! ```

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use rover_driver::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件路径（`<config_dir>/rover/config.toml`）
pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("rover");
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 外设串口设备
    pub device: Option<PathBuf>,
    /// 控制线程参数
    pub pipeline: PipelineConfig,
}

impl CliConfig {
    /// 加载配置
    ///
    /// 显式指定的文件必须存在；默认位置的文件不存在时使用默认配置。
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = default_config_file()?;
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            },
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, format!("# Rover CLI Configuration\n\n{content}")).context("写入配置文件失败")?;
        Ok(())
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效的配置
    Show {
        /// 配置文件（默认 `<config_dir>/rover/config.toml`）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 写出默认配置文件
    Init {
        /// 外设设备路径
        #[arg(short, long)]
        device: Option<PathBuf>,

        /// 配置文件（默认 `<config_dir>/rover/config.toml`）
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show { config } => {
                let loaded = CliConfig::load(config.as_deref())?;
                print!("{}", toml::to_string_pretty(&loaded)?);
                Ok(())
            },
            ConfigCommand::Init {
                device,
                config,
                force,
            } => {
                let path = match config {
                    Some(path) => path,
                    None => default_config_file()?,
                };
                if path.exists() && !force {
                    bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
                }
                let cfg = CliConfig {
                    device,
                    ..CliConfig::default()
                };
                cfg.save_to(&path)?;
                println!("✅ 已写入配置: {}", path.display());
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = CliConfig {
            device: Some(PathBuf::from("/dev/ttyUSB0")),
            ..CliConfig::default()
        };
        cfg.pipeline.min_safe_range_cm = 20;
        cfg.save_to(&path).unwrap();

        assert_eq!(CliConfig::load(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn test_pipeline_table_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "device = \"/dev/rfcomm0\"\n\n[pipeline.watchdog]\ninterval_ms = 250\n").unwrap();

        let cfg = CliConfig::load_from(&path).unwrap();
        assert_eq!(cfg.device, Some(PathBuf::from("/dev/rfcomm0")));
        assert_eq!(cfg.pipeline.watchdog.interval_ms, 250);
        assert_eq!(cfg.pipeline.min_safe_range_cm, 10);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let init = || ConfigCommand::Init {
            device: None,
            config: Some(path.clone()),
            force: false,
        };
        init().execute().unwrap();
        assert!(init().execute().is_err());
    }
}

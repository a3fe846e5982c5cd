//! Builder 模式实现

use crate::config::PipelineConfig;
use crate::error::DriverError;
use crate::rover::Rover;
use rover_link::{SplittableLink, StreamLink};
use std::path::PathBuf;
use tracing::info;

/// Rover Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use rover_driver::{PipelineConfig, RoverBuilder};
///
/// let rover = RoverBuilder::new()
///     .device("/dev/ttyUSB0")
///     .pipeline_config(PipelineConfig::default())
///     .build()
///     .unwrap();
/// rover.drive(120).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct RoverBuilder {
    device: Option<PathBuf>,
    pipeline_config: Option<PipelineConfig>,
}

impl RoverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 外设串口设备路径（如 `/dev/ttyUSB0`、`/dev/rfcomm0`）
    pub fn device(mut self, path: impl Into<PathBuf>) -> Self {
        self.device = Some(path.into());
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = Some(config);
        self
    }

    /// 打开设备并启动运行时
    ///
    /// # 错误
    /// - `DriverError::MissingDevice`: 未指定设备
    /// - `DriverError::Link`: 设备打开失败
    pub fn build(self) -> Result<Rover, DriverError> {
        let device = self.device.clone().ok_or(DriverError::MissingDevice)?;
        let link = StreamLink::open(&device)?;
        info!("Opened peripheral link {}", device.display());
        self.build_with_link(link)
    }

    /// 使用现成的链路启动运行时（模拟外设、测试）
    pub fn build_with_link<L>(self, link: L) -> Result<Rover, DriverError>
    where
        L: SplittableLink,
        L::Reader: Send + 'static,
        L::Writer: Send + 'static,
    {
        Rover::start(link, self.pipeline_config.unwrap_or_default())
    }
}

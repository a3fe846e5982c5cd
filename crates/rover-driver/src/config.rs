//! 运行时配置

use crate::message::RangeCommand;
use std::time::Duration;

/// 控制线程配置
///
/// # Example
///
/// ```
/// use rover_driver::PipelineConfig;
///
/// // 默认配置：10cm 安全距离，运动时每秒测距一次
/// let config = PipelineConfig::default();
/// assert_eq!(config.min_safe_range_cm, 10);
///
/// // 自定义配置
/// let config = PipelineConfig {
///     min_safe_range_cm: 25,
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct PipelineConfig {
    /// 安全距离（厘米），测距结果小于等于该值时触发急停
    pub min_safe_range_cm: i32,
    /// MailBag 条目过期时间（毫秒），`None` 表示永不过期
    pub correlation_ttl_ms: Option<u64>,
    /// 非超时读错误后的退避时间（毫秒）
    pub link_retry_delay_ms: u64,
    /// 关闭时等待每个线程退出的时间（毫秒）
    pub join_timeout_ms: u64,
    /// 看门狗配置
    pub watchdog: WatchdogConfig,
    /// 电机校准
    pub motor: MotorCalibration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_safe_range_cm: 10,
            correlation_ttl_ms: None,
            link_retry_delay_ms: 50,
            join_timeout_ms: 500,
            watchdog: WatchdogConfig::default(),
            motor: MotorCalibration::default(),
        }
    }
}

impl PipelineConfig {
    pub fn correlation_ttl(&self) -> Option<Duration> {
        self.correlation_ttl_ms.map(Duration::from_millis)
    }

    pub fn link_retry_delay(&self) -> Duration {
        Duration::from_millis(self.link_retry_delay_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// 看门狗配置
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct WatchdogConfig {
    /// 运动时的测距间隔（毫秒）
    pub interval_ms: u64,
    /// 测距舵机角度
    pub angle: i16,
    /// 每次测距的采样次数
    pub attempts: u8,
    /// 最大测距距离（厘米）
    pub max_range_cm: u16,
    /// 启动时依次测距的角度（唤醒超声波模块）
    pub wake_sweep: Vec<i16>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            angle: 0,
            attempts: 4,
            max_range_cm: 400,
            wake_sweep: vec![-45, 45, 0],
        }
    }
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// 周期测距使用的命令（参数按协议范围截断）
    pub fn range_command(&self) -> RangeCommand {
        RangeCommand::new(
            i32::from(self.max_range_cm),
            i32::from(self.angle),
            i32::from(self.attempts),
        )
    }
}

/// 电机速度校准
///
/// 电机在低占空比下往往转不起来，非零速度线性映射到 `[slowest_speed, 255]`，
/// 符号保持不变，0 仍为 0。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct MotorCalibration {
    pub slowest_speed: u8,
}

impl MotorCalibration {
    pub fn convert(&self, speed: i16) -> i16 {
        if speed == 0 {
            return 0;
        }
        let slowest = i32::from(self.slowest_speed);
        let magnitude = slowest + i32::from(speed).abs() * (255 - slowest) / 255;
        (magnitude.min(255) as i16) * speed.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.min_safe_range_cm, 10);
        assert_eq!(config.watchdog.interval(), Duration::from_secs(1));
        assert_eq!(config.watchdog.wake_sweep, vec![-45, 45, 0]);
        assert_eq!(config.correlation_ttl(), None);
        assert_eq!(config.join_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_watchdog_range_command_is_clamped() {
        let watchdog = WatchdogConfig {
            angle: 120,
            attempts: 20,
            max_range_cm: 900,
            ..WatchdogConfig::default()
        };
        let range = watchdog.range_command();
        assert_eq!((range.angle(), range.attempts(), range.max_range_cm()), (90, 8, 400));
    }

    #[test]
    fn test_calibration_identity_when_slowest_is_zero() {
        let calibration = MotorCalibration::default();
        for speed in [-255, -100, -1, 0, 1, 100, 255] {
            assert_eq!(calibration.convert(speed), speed);
        }
    }

    #[test]
    fn test_calibration_lifts_small_speeds() {
        let calibration = MotorCalibration { slowest_speed: 100 };
        assert_eq!(calibration.convert(0), 0);
        assert_eq!(calibration.convert(1), 100);
        assert_eq!(calibration.convert(-255), -255);
        assert_eq!(calibration.convert(51), 131);
    }
}

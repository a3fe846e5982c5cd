//! 运行指标
//!
//! 原子计数器，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// Rover 实时指标
///
/// # 使用示例
///
/// ```rust
/// use rover_driver::RoverMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = RoverMetrics::new();
/// metrics.commands_sent.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.commands_sent, 1);
/// ```
#[derive(Debug, Default)]
pub struct RoverMetrics {
    /// 成功写出到外设的命令数
    pub commands_sent: AtomicU64,
    /// 写外设失败次数
    pub write_errors: AtomicU64,
    /// 急停清空的普通命令数
    pub commands_flushed: AtomicU64,
    /// 从外设读到的帧数
    pub frames_received: AtomicU64,
    /// 无法解析的帧数
    pub malformed_frames: AtomicU64,
    /// 非超时读错误次数
    pub read_errors: AtomicU64,
    /// 找到原命令的应答数
    pub responses_correlated: AtomicU64,
    /// 找不到原命令的应答数（可能已被急停取代）
    pub responses_uncorrelated: AtomicU64,
    /// `E` 错误应答数
    pub error_replies: AtomicU64,
    /// 安全距离触发的急停次数
    pub emergency_stops: AtomicU64,
    /// 看门狗发出的测距命令数
    pub range_polls: AtomicU64,
    /// 发布的运动状态通知数
    pub motion_notices: AtomicU64,
}

impl RoverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照
    ///
    /// 各计数器分别读取，相互之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            commands_flushed: self.commands_flushed.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            responses_correlated: self.responses_correlated.load(Ordering::Relaxed),
            responses_uncorrelated: self.responses_uncorrelated.load(Ordering::Relaxed),
            error_replies: self.error_replies.load(Ordering::Relaxed),
            emergency_stops: self.emergency_stops.load(Ordering::Relaxed),
            range_polls: self.range_polls.load(Ordering::Relaxed),
            motion_notices: self.motion_notices.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.commands_sent,
            &self.write_errors,
            &self.commands_flushed,
            &self.frames_received,
            &self.malformed_frames,
            &self.read_errors,
            &self.responses_correlated,
            &self.responses_uncorrelated,
            &self.error_replies,
            &self.emergency_stops,
            &self.range_polls,
            &self.motion_notices,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub commands_sent: u64,
    pub write_errors: u64,
    pub commands_flushed: u64,
    pub frames_received: u64,
    pub malformed_frames: u64,
    pub read_errors: u64,
    pub responses_correlated: u64,
    pub responses_uncorrelated: u64,
    pub error_replies: u64,
    pub emergency_stops: u64,
    pub range_polls: u64,
    pub motion_notices: u64,
}

impl MetricsSnapshot {
    /// 应答关联成功率（百分比），没有应答时返回 0.0
    pub fn correlation_rate(&self) -> f64 {
        let total = self.responses_correlated + self.responses_uncorrelated;
        if total == 0 {
            return 0.0;
        }
        (self.responses_correlated as f64 / total as f64) * 100.0
    }
}

//! Rover 运行时
//!
//! 把链路拆成读写两半，启动命令、响应、看门狗三个线程，
//! 对外提供发送命令和查询状态的接口。

use crate::channel::Channel;
use crate::config::PipelineConfig;
use crate::context::RoverContext;
use crate::error::DriverError;
use crate::mailbag::MailBag;
use crate::message::{Message, MessageId, MotorCommand, RangeCommand};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{dispatch_loop, response_loop, watchdog_loop};
use crate::registry::ChannelRegistry;
use crossbeam_channel::RecvTimeoutError;
use rover_link::SplittableLink;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

/// 带超时的 join
///
/// 由辅助线程执行 join，超时后放弃等待（辅助线程随进程退出回收）。
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result.map(|_| ()),
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

fn spawn_named<F>(name: &str, f: F) -> Result<JoinHandle<()>, DriverError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(DriverError::ThreadSpawn)
}

/// Rover 驱动（对外 API）
///
/// Drop 时自动关闭：清除运行标志、关闭所有通道、等待线程退出。
pub struct Rover {
    ctx: Arc<RoverContext>,
    join_timeout: Duration,
    dispatch_thread: Option<JoinHandle<()>>,
    response_thread: Option<JoinHandle<()>>,
    watchdog_thread: Option<JoinHandle<()>>,
}

impl Rover {
    /// 启动运行时
    ///
    /// # 错误
    /// - `DriverError::Link`: 链路拆分失败
    /// - `DriverError::ThreadSpawn`: 线程创建失败（已启动的线程会被关闭）
    pub fn start<L>(link: L, config: PipelineConfig) -> Result<Self, DriverError>
    where
        L: SplittableLink,
        L::Reader: Send + 'static,
        L::Writer: Send + 'static,
    {
        let (reader, writer) = link.split()?;
        let ctx = Arc::new(RoverContext::new());

        let mut rover = Self {
            ctx: ctx.clone(),
            join_timeout: config.join_timeout(),
            dispatch_thread: None,
            response_thread: None,
            watchdog_thread: None,
        };

        let (dispatch_ctx, dispatch_config) = (ctx.clone(), config.clone());
        rover.dispatch_thread = Some(spawn_named("rover-dispatch", move || {
            dispatch_loop(writer, dispatch_ctx, dispatch_config)
        })?);

        let (response_ctx, response_config) = (ctx.clone(), config.clone());
        rover.response_thread = Some(spawn_named("rover-response", move || {
            response_loop(reader, response_ctx, response_config)
        })?);

        let watchdog_config = config.watchdog;
        rover.watchdog_thread = Some(spawn_named("rover-watchdog", move || {
            watchdog_loop(ctx, watchdog_config)
        })?);

        info!("Rover started");
        Ok(rover)
    }

    pub fn context(&self) -> &Arc<RoverContext> {
        &self.ctx
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.ctx.registry
    }

    pub fn mailbag(&self) -> &MailBag {
        &self.ctx.mailbag
    }

    /// 显示通道（测距结果和日志通知），由调用方消费
    ///
    /// 通道有容量上限（[`DISPLAY_BACKLOG`](crate::DISPLAY_BACKLOG)），不消费时只保留最新的通知。
    pub fn display(&self) -> &Channel {
        self.ctx.registry.display()
    }

    /// 把命令放入命令通道，返回消息 ID
    ///
    /// # 错误
    /// - `DriverError::NotRunning`: 运行时已关闭
    /// - `DriverError::Channel`: 消息类型不是命令
    pub fn send(&self, message: impl Into<Message>) -> Result<MessageId, DriverError> {
        if !self.ctx.is_running() {
            return Err(DriverError::NotRunning);
        }
        let message = message.into();
        let id = message.id();
        self.ctx.registry.command().send(message)?;
        Ok(id)
    }

    /// 直行（负速度后退）
    pub fn drive(&self, speed: i32) -> Result<MessageId, DriverError> {
        self.send(MotorCommand::straight(speed))
    }

    pub fn turn(&self, right_turn: bool, speed: i32, rate: i32) -> Result<MessageId, DriverError> {
        self.send(MotorCommand::turn(right_turn, speed, rate))
    }

    pub fn stop(&self) -> Result<MessageId, DriverError> {
        self.send(MotorCommand::stop())
    }

    /// 急停：插队执行，并丢弃所有排队中的普通命令
    pub fn emergency_stop(&self) -> Result<MessageId, DriverError> {
        self.send(Message::emergency_stop())
    }

    pub fn request_range(&self, range: RangeCommand) -> Result<MessageId, DriverError> {
        self.send(range)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 各线程是否存活：(命令, 响应, 看门狗)
    pub fn check_health(&self) -> (bool, bool, bool) {
        let alive = |handle: &Option<JoinHandle<()>>| handle.as_ref().is_some_and(|h| !h.is_finished());
        (
            alive(&self.dispatch_thread),
            alive(&self.response_thread),
            alive(&self.watchdog_thread),
        )
    }

    pub fn is_healthy(&self) -> bool {
        let (dispatch, response, watchdog) = self.check_health();
        dispatch && response && watchdog
    }

    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    /// 关闭运行时并等待线程退出
    pub fn shutdown(mut self) {
        self.stop_threads();
    }

    fn stop_threads(&mut self) {
        self.ctx.shutdown();

        for (name, handle) in [
            ("Dispatch", self.dispatch_thread.take()),
            ("Response", self.response_thread.take()),
            ("Watchdog", self.watchdog_thread.take()),
        ] {
            if let Some(handle) = handle
                && handle.join_timeout(self.join_timeout).is_err()
            {
                error!(
                    "{} thread panicked or failed to shut down within {:?}",
                    name, self.join_timeout
                );
            }
        }
    }
}

impl Drop for Rover {
    fn drop(&mut self) {
        self.stop_threads();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_link::MockLink;

    #[test]
    fn test_start_and_shutdown() {
        let (link, _peripheral) = MockLink::new();
        let rover = Rover::start(link, PipelineConfig::default()).unwrap();
        assert!(rover.is_healthy());
        let ctx = rover.context().clone();
        rover.shutdown();
        assert!(!ctx.is_running());
    }

    #[test]
    fn test_send_rejects_notices() {
        let (link, _peripheral) = MockLink::new();
        let rover = Rover::start(link, PipelineConfig::default()).unwrap();
        let err = rover.send(Message::watchdog(true)).unwrap_err();
        assert!(matches!(err, DriverError::Channel(_)));
    }

    #[test]
    fn test_send_after_shutdown_fails() {
        let (link, _peripheral) = MockLink::new();
        let rover = Rover::start(link, PipelineConfig::default()).unwrap();
        rover.context().shutdown();
        assert!(matches!(rover.drive(100), Err(DriverError::NotRunning)));
    }

    #[test]
    fn test_drive_reaches_peripheral() {
        let (link, peripheral) = MockLink::new();
        let mut config = PipelineConfig::default();
        config.watchdog.wake_sweep.clear();
        let rover = Rover::start(link, config).unwrap();

        let id = rover.drive(150).unwrap();
        assert!(peripheral.wait_for_written(1, Duration::from_secs(2)));
        assert_eq!(peripheral.written()[0], format!("C:{id}:TW:4:150:150:150:150;"));
    }
}

//! 控制线程
//!
//! 三个线程各自运行一个循环，通过 [`RoverContext`] 中的通道和 MailBag 交换数据：
//! - 命令线程（[`dispatch_loop`]）：取命令、编码、写外设、存入 MailBag，检测运动状态变化
//! - 响应线程（[`response_loop`]）：读应答、按 ID 关联原命令，距离过近时发出急停
//! - 看门狗线程（[`watchdog_loop`]）：运动时周期测距，静止时阻塞等待状态通知

use crate::config::{MotorCalibration, PipelineConfig, WatchdogConfig};
use crate::context::RoverContext;
use crate::error::ChannelError;
use crate::message::{DisplayNotice, LogLevel, Message, MessageId, Payload};
use crate::metrics::RoverMetrics;
use rover_link::{LinkError, LinkReader, LinkWriter};
use rover_protocol::{ProtocolError, RangeReading, ReplyBody, ReplyFrame, ReplyKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 命令分发器（命令线程的单步逻辑）
pub struct CommandDispatcher<W> {
    writer: W,
    ctx: Arc<RoverContext>,
    calibration: MotorCalibration,
    moving: bool,
}

impl<W: LinkWriter> CommandDispatcher<W> {
    pub fn new(writer: W, ctx: Arc<RoverContext>, config: &PipelineConfig) -> Self {
        Self {
            writer,
            ctx,
            calibration: config.motor,
            moving: false,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// 处理一条命令
    ///
    /// 顺序：运动状态通知 -> 写外设 -> 急停清空队列 -> 标记已处理并存入 MailBag。
    /// 写失败只记录日志，命令仍然存入 MailBag（不会收到应答，由 TTL 或操作员处理）。
    pub fn dispatch(&mut self, mut message: Message) {
        if let Payload::Motor(motor) = message.payload() {
            self.track_motion(motor.is_stop());
        }

        let Some(frame) = message.encode(&self.calibration) else {
            warn!("{} #{} has no wire form, dropped", message.kind(), message.id());
            return;
        };
        debug!("Command TX: {}", frame);
        match self.writer.write_frame(&frame) {
            Ok(()) => RoverMetrics::incr(&self.ctx.metrics.commands_sent),
            Err(e) => {
                error!("Failed to write {} #{}: {}", message.kind(), message.id(), e);
                RoverMetrics::incr(&self.ctx.metrics.write_errors);
            },
        }

        if message.is_out_of_band() && message.flush_on_send() {
            let flushed = self.ctx.registry.command().flush();
            if flushed > 0 {
                warn!("{} flushed {} queued commands", message.kind(), flushed);
                self.ctx
                    .metrics
                    .commands_flushed
                    .fetch_add(flushed as u64, std::sync::atomic::Ordering::Relaxed);
            }
        }

        message.mark_processed();
        if let Some(stale) = self.ctx.mailbag.insert(message) {
            warn!(
                "Message id {} reused while {} was still awaiting a reply",
                stale.id(),
                stale.kind()
            );
        }
    }

    /// 停车命令在运动中、或行驶命令在静止时，才算状态变化
    fn track_motion(&mut self, stop: bool) {
        if stop != self.moving {
            return;
        }
        self.moving = !stop;
        info!("Motion state changed: moving = {}", self.moving);
        match self.ctx.registry.watchdog().send(Message::watchdog(self.moving)) {
            Ok(()) => RoverMetrics::incr(&self.ctx.metrics.motion_notices),
            // 关闭过程中看门狗已退出
            Err(ChannelError::Disconnected(_)) => debug!("Watchdog gone, motion notice dropped"),
            Err(e) => error!("Failed to notify watchdog: {}", e),
        }
    }
}

/// 命令线程主循环
///
/// 阻塞等待命令通道。关闭时通道中剩余的命令（例如退出前的停车）
/// 仍会依次写出，取空后才退出，因此这里不检查运行标志。
pub fn dispatch_loop(writer: impl LinkWriter, ctx: Arc<RoverContext>, config: PipelineConfig) {
    let mut dispatcher = CommandDispatcher::new(writer, ctx.clone(), &config);

    while let Ok(message) = ctx.registry.command().receive_blocking() {
        dispatcher.dispatch(message);
    }
    trace!("Dispatch thread: command channel closed and drained, exiting");
}

/// 一帧应答的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub reply: ReplyFrame,
    /// MailBag 中按 ID 取回的原命令（错误应答不查找，找不到时为 `None`）
    pub original: Option<Message>,
}

/// 应答关联器（响应线程的单步逻辑）
pub struct ResponseCorrelator {
    ctx: Arc<RoverContext>,
    min_safe_range_cm: i32,
    correlation_ttl: Option<Duration>,
}

impl ResponseCorrelator {
    pub fn new(ctx: Arc<RoverContext>, config: &PipelineConfig) -> Self {
        Self {
            ctx,
            min_safe_range_cm: config.min_safe_range_cm,
            correlation_ttl: config.correlation_ttl(),
        }
    }

    /// 处理一帧应答
    ///
    /// # 错误
    /// 帧格式错误时返回 `ProtocolError`，调用方记录后继续读下一帧。
    pub fn handle_frame(&self, raw: &str) -> Result<Correlation, ProtocolError> {
        let metrics = &self.ctx.metrics;
        RoverMetrics::incr(&metrics.frames_received);
        let reply = ReplyFrame::parse(raw).inspect_err(|_| RoverMetrics::incr(&metrics.malformed_frames))?;

        let original = match reply.kind {
            ReplyKind::Response => self.correlate(&reply),
            ReplyKind::Error => {
                RoverMetrics::incr(&metrics.error_replies);
                if let ReplyBody::Error { code, text } = &reply.body {
                    warn!(
                        "Peripheral rejected {} #{}: code {:?}, {}",
                        reply.command_type,
                        reply.id,
                        code,
                        text.as_deref().unwrap_or("<no text>")
                    );
                }
                None
            },
        };
        Ok(Correlation { reply, original })
    }

    fn correlate(&self, reply: &ReplyFrame) -> Option<Message> {
        let metrics = &self.ctx.metrics;
        let original = self.ctx.mailbag.fetch(MessageId::new(reply.id));
        match &original {
            Some(original) => {
                RoverMetrics::incr(&metrics.responses_correlated);
                debug!("Reply {} #{} matches {}", reply.command_type, reply.id, original.kind());
                if original.command_type() != Some(reply.command_type) {
                    warn!(
                        "Reply #{} is {} but the filed command was {}",
                        reply.id,
                        reply.command_type,
                        original.kind()
                    );
                }
            },
            None => {
                RoverMetrics::incr(&metrics.responses_uncorrelated);
                debug!("No outstanding command for reply {} #{}", reply.command_type, reply.id);
            },
        }

        if let ReplyBody::Range(reading) = reply.body {
            self.check_range(reading);
        }
        original
    }

    /// 急停判断先于显示通知
    fn check_range(&self, reading: RangeReading) {
        if reading.distance_cm <= self.min_safe_range_cm {
            warn!(
                "Obstacle at {} cm (angle {}), emergency stop",
                reading.distance_cm, reading.angle
            );
            match self.ctx.registry.command().send(Message::emergency_stop()) {
                Ok(()) => RoverMetrics::incr(&self.ctx.metrics.emergency_stops),
                Err(e) => error!("Failed to queue emergency stop: {}", e),
            }
            self.publish(Message::log(
                LogLevel::Warning,
                format!(
                    "Obstacle at {} cm ({:+}°), emergency stop",
                    reading.distance_cm, reading.angle
                ),
            ));
        }

        self.publish(Message::display(DisplayNotice::Range(reading)));
    }

    /// 发布显示通知（显示通道有容量上限，无人消费时丢弃最旧的通知）
    fn publish(&self, message: Message) {
        if let Err(e) = self.ctx.registry.display().send(message) {
            trace!("Display notice not published: {}", e);
        }
    }

    /// 清理过期的 MailBag 条目（未配置 TTL 时什么都不做）
    pub fn evict_stale(&self) -> usize {
        let Some(ttl) = self.correlation_ttl else {
            return 0;
        };
        let evicted = self.ctx.mailbag.evict_older_than(ttl);
        if evicted > 0 {
            debug!("Evicted {} commands without reply", evicted);
        }
        evicted
    }
}

/// 响应线程主循环
///
/// 读超时是正常现象（用于检查运行标志）；链路关闭后退出；
/// 其他读错误记录后退避重试。
pub fn response_loop(mut reader: impl LinkReader, ctx: Arc<RoverContext>, config: PipelineConfig) {
    let correlator = ResponseCorrelator::new(ctx.clone(), &config);
    let retry_delay = config.link_retry_delay();

    while ctx.is_running() {
        correlator.evict_stale();

        match reader.read_frame() {
            Ok(frame) => {
                trace!("Response RX: {}", frame.trim());
                if let Err(e) = correlator.handle_frame(&frame) {
                    warn!("Discarding malformed reply {:?}: {}", frame.trim(), e);
                }
            },
            Err(LinkError::Timeout) => continue,
            Err(LinkError::Closed) => {
                error!("Response thread: peripheral link closed, exiting");
                break;
            },
            Err(e) => {
                error!("Response thread: read error: {}", e);
                RoverMetrics::incr(&ctx.metrics.read_errors);
                ctx.shutdown.sleep(retry_delay);
            },
        }
    }
    trace!("Response thread: exited");
}

/// 接近看门狗（看门狗线程的单步逻辑）
pub struct Watchdog {
    ctx: Arc<RoverContext>,
    config: WatchdogConfig,
    moving: bool,
}

impl Watchdog {
    pub fn new(ctx: Arc<RoverContext>, config: WatchdogConfig) -> Self {
        Self {
            ctx,
            config,
            moving: false,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// 按配置的角度依次测距一次，唤醒超声波模块
    pub fn wake_sensor(&self) -> Result<(), ChannelError> {
        let base = self.config.range_command();
        for &angle in &self.config.wake_sweep {
            self.request_range(Message::range(base.at_angle(i32::from(angle))))?;
        }
        Ok(())
    }

    /// 发出一次周期测距
    pub fn poll(&self) -> Result<(), ChannelError> {
        self.request_range(Message::range(self.config.range_command()))
    }

    fn request_range(&self, message: Message) -> Result<(), ChannelError> {
        self.ctx.registry.command().send(message)?;
        RoverMetrics::incr(&self.ctx.metrics.range_polls);
        Ok(())
    }

    /// 应用一条状态通知
    pub fn apply(&mut self, message: Message) {
        match message.payload() {
            Payload::Watchdog(notice) => {
                if notice.moving != self.moving {
                    debug!("Watchdog: moving = {}", notice.moving);
                }
                self.moving = notice.moving;
            },
            other => warn!("Watchdog ignoring {}", other.kind()),
        }
    }

    /// 单步
    ///
    /// 运动中：测距、睡眠一个周期，再非阻塞地取走所有待处理通知；
    /// 静止时：阻塞等待下一条通知。
    ///
    /// # 错误
    /// 通道关闭时返回 `ChannelError::Disconnected`。
    pub fn step(&mut self) -> Result<(), ChannelError> {
        if self.moving {
            self.poll()?;
            if !self.ctx.shutdown.sleep(self.config.interval()) {
                return Err(ChannelError::Disconnected(None));
            }
            while let Some(message) = self.ctx.registry.watchdog().try_receive() {
                self.apply(message);
            }
        } else {
            let message = self.ctx.registry.watchdog().receive_blocking()?;
            self.apply(message);
        }
        Ok(())
    }
}

/// 看门狗线程主循环
pub fn watchdog_loop(ctx: Arc<RoverContext>, config: WatchdogConfig) {
    let mut watchdog = Watchdog::new(ctx.clone(), config);
    if let Err(e) = watchdog.wake_sensor() {
        warn!("Watchdog: wake-up sweep not sent: {}", e);
    }

    while ctx.is_running() {
        if let Err(e) = watchdog.step() {
            trace!("Watchdog thread: {}, exiting", e);
            break;
        }
    }
    trace!("Watchdog thread: exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MotorCommand, RangeCommand};
    use rover_link::MockLink;

    fn setup() -> (Arc<RoverContext>, PipelineConfig) {
        (Arc::new(RoverContext::new()), PipelineConfig::default())
    }

    /// 收集写出帧的写端
    #[derive(Default)]
    struct RecordingWriter {
        frames: Vec<String>,
        fail: bool,
    }

    impl LinkWriter for RecordingWriter {
        fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
            if self.fail {
                return Err(LinkError::Io(std::io::Error::other("unplugged")));
            }
            self.frames.push(String::from_utf8_lossy(bytes).into_owned());
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_writes_and_files_command() {
        let (ctx, config) = setup();
        let mut dispatcher = CommandDispatcher::new(RecordingWriter::default(), ctx.clone(), &config);

        let msg = Message::motor(MotorCommand::straight(150));
        let id = msg.id();
        dispatcher.dispatch(msg);

        assert_eq!(dispatcher.writer.frames, vec![format!("C:{id}:TW:4:150:150:150:150;")]);
        let filed = ctx.mailbag.get(id).unwrap();
        assert!(filed.is_processed());
        assert_eq!(ctx.metrics.snapshot().commands_sent, 1);
    }

    #[test]
    fn test_motion_notice_only_on_change() {
        let (ctx, config) = setup();
        let mut dispatcher = CommandDispatcher::new(RecordingWriter::default(), ctx.clone(), &config);
        let watchdog = ctx.registry.watchdog();

        // 静止时停车：无状态变化
        dispatcher.dispatch(Message::motor(MotorCommand::stop()));
        assert!(watchdog.is_empty());

        dispatcher.dispatch(Message::motor(MotorCommand::straight(100)));
        dispatcher.dispatch(Message::motor(MotorCommand::straight(120)));
        assert_eq!(watchdog.len(), 1);
        assert_eq!(
            watchdog.try_receive().map(Message::into_payload),
            Some(Payload::Watchdog(crate::message::WatchdogNotice { moving: true }))
        );

        dispatcher.dispatch(Message::motor(MotorCommand::stop()));
        dispatcher.dispatch(Message::motor(MotorCommand::stop()));
        assert_eq!(watchdog.len(), 1);
        assert!(!dispatcher.is_moving());
    }

    #[test]
    fn test_write_failure_still_files_command() {
        let (ctx, config) = setup();
        let writer = RecordingWriter {
            fail: true,
            ..RecordingWriter::default()
        };
        let mut dispatcher = CommandDispatcher::new(writer, ctx.clone(), &config);

        let msg = Message::range(RangeCommand::default());
        let id = msg.id();
        dispatcher.dispatch(msg);

        assert!(ctx.mailbag.contains(id));
        let snapshot = ctx.metrics.snapshot();
        assert_eq!(snapshot.write_errors, 1);
        assert_eq!(snapshot.commands_sent, 0);
    }

    #[test]
    fn test_emergency_stop_flushes_regular_queue() {
        let (ctx, config) = setup();
        let mut dispatcher = CommandDispatcher::new(RecordingWriter::default(), ctx.clone(), &config);
        let command = ctx.registry.command();
        command.send(Message::motor(MotorCommand::straight(100))).unwrap();
        command.send(Message::motor(MotorCommand::straight(200))).unwrap();
        command.send(Message::emergency_stop()).unwrap();

        let stop = command.try_receive().unwrap();
        assert!(stop.is_out_of_band());
        dispatcher.dispatch(stop);

        assert!(command.is_empty());
        assert_eq!(ctx.metrics.snapshot().commands_flushed, 2);
        assert_eq!(dispatcher.writer.frames.len(), 1);
        assert!(dispatcher.writer.frames[0].ends_with(":SW;"));
    }

    #[test]
    fn test_correlator_fetches_original() {
        let (ctx, config) = setup();
        let correlator = ResponseCorrelator::new(ctx.clone(), &config);
        let mut msg = Message::range(RangeCommand::default());
        msg.mark_processed();
        let id = msg.id();
        ctx.mailbag.insert(msg.clone());

        let correlation = correlator.handle_frame(&format!("R:{id}:FR:120:0;")).unwrap();

        assert_eq!(correlation.original, Some(msg));
        assert!(!ctx.mailbag.contains(id));
        assert!(ctx.registry.command().is_empty());
        let notice = ctx.registry.display().try_receive().map(Message::into_payload);
        assert_eq!(
            notice,
            Some(Payload::Display(DisplayNotice::Range(RangeReading {
                distance_cm: 120,
                angle: 0
            })))
        );
        assert_eq!(ctx.metrics.snapshot().responses_correlated, 1);
    }

    #[test]
    fn test_correlator_escalates_close_range() {
        let (ctx, config) = setup();
        let correlator = ResponseCorrelator::new(ctx.clone(), &config);

        // 边界值 10cm 也触发
        correlator.handle_frame("R:999:FR:10:0;").unwrap();
        assert_eq!(ctx.registry.command().oob_len(), 1);
        correlator.handle_frame("R:1000:FR:11:0;").unwrap();
        assert_eq!(ctx.registry.command().oob_len(), 1);

        let snapshot = ctx.metrics.snapshot();
        assert_eq!(snapshot.emergency_stops, 1);
        assert_eq!(snapshot.responses_uncorrelated, 2);

        // 急停时先发布警告，再发布读数
        let notices: Vec<_> = std::iter::from_fn(|| ctx.registry.display().try_receive())
            .map(Message::into_payload)
            .collect();
        assert_eq!(notices.len(), 3);
        assert!(matches!(
            &notices[0],
            Payload::Display(DisplayNotice::Log { level: LogLevel::Warning, text })
                if text.contains("10 cm")
        ));
        assert!(matches!(&notices[1], Payload::Display(DisplayNotice::Range(r)) if r.distance_cm == 10));
        assert!(matches!(&notices[2], Payload::Display(DisplayNotice::Range(r)) if r.distance_cm == 11));
    }

    #[test]
    fn test_correlator_skips_lookup_for_error_replies() {
        let (ctx, config) = setup();
        let correlator = ResponseCorrelator::new(ctx.clone(), &config);
        let mut msg = Message::motor(MotorCommand::straight(90));
        msg.mark_processed();
        let id = msg.id();
        ctx.mailbag.insert(msg);

        let correlation = correlator.handle_frame(&format!("E:{id}:TW:258:Unknown OpCode;")).unwrap();
        assert_eq!(correlation.reply.kind, ReplyKind::Error);
        assert!(correlation.original.is_none());
        assert!(ctx.mailbag.contains(id));
        assert_eq!(ctx.metrics.snapshot().error_replies, 1);
    }

    #[test]
    fn test_correlator_reports_malformed_frames() {
        let (ctx, config) = setup();
        let correlator = ResponseCorrelator::new(ctx.clone(), &config);
        assert!(correlator.handle_frame("R:1;").is_err());
        assert!(correlator.handle_frame("R:1:FR:5;").is_err());
        assert!(ctx.registry.command().is_empty());
        assert_eq!(ctx.metrics.snapshot().malformed_frames, 2);
    }

    #[test]
    fn test_correlator_ttl_eviction() {
        let (ctx, mut config) = setup();
        config.correlation_ttl_ms = Some(0);
        let correlator = ResponseCorrelator::new(ctx.clone(), &config);
        let mut msg = Message::motor(MotorCommand::straight(90));
        msg.mark_processed();
        ctx.mailbag.insert(msg);

        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(correlator.evict_stale(), 1);
        assert!(ctx.mailbag.is_empty());

        let (ctx, config) = setup();
        assert_eq!(ResponseCorrelator::new(ctx, &config).evict_stale(), 0);
    }

    #[test]
    fn test_watchdog_wake_sweep() {
        let (ctx, config) = setup();
        let watchdog = Watchdog::new(ctx.clone(), config.watchdog);
        watchdog.wake_sensor().unwrap();

        let angles: Vec<_> = std::iter::from_fn(|| ctx.registry.command().try_receive())
            .filter_map(|m| match m.into_payload() {
                Payload::Range(range) => Some(range.angle()),
                _ => None,
            })
            .collect();
        assert_eq!(angles, vec![-45, 45, 0]);
    }

    #[test]
    fn test_watchdog_polls_while_moving() {
        let (ctx, mut config) = setup();
        config.watchdog.interval_ms = 1;
        let mut watchdog = Watchdog::new(ctx.clone(), config.watchdog);

        ctx.registry.watchdog().send(Message::watchdog(true)).unwrap();
        watchdog.step().unwrap();
        assert!(watchdog.is_moving());
        assert!(ctx.registry.command().is_empty());

        ctx.registry.watchdog().send(Message::watchdog(false)).unwrap();
        watchdog.step().unwrap();
        assert!(!watchdog.is_moving());
        assert_eq!(ctx.registry.command().len(), 1);
        assert_eq!(ctx.metrics.snapshot().range_polls, 1);
    }

    #[test]
    fn test_watchdog_step_stops_on_shutdown() {
        let (ctx, config) = setup();
        let mut watchdog = Watchdog::new(ctx.clone(), config.watchdog);
        ctx.shutdown();
        assert!(matches!(watchdog.step(), Err(ChannelError::Disconnected(None))));
    }

    #[test]
    fn test_dispatch_loop_drains_queue_after_shutdown() {
        let (ctx, config) = setup();
        let (link, peripheral) = MockLink::new();
        let (_reader, writer) = rover_link::SplittableLink::split(link).unwrap();

        let drive = Message::motor(MotorCommand::straight(100));
        let stop = Message::motor(MotorCommand::stop());
        let (drive_id, stop_id) = (drive.id(), stop.id());
        ctx.registry.command().send(drive).unwrap();
        ctx.registry.command().send(stop).unwrap();
        ctx.shutdown();

        dispatch_loop(writer, ctx.clone(), config);

        assert_eq!(
            peripheral.written(),
            vec![
                format!("C:{drive_id}:TW:4:100:100:100:100;"),
                format!("C:{stop_id}:SW;"),
            ]
        );
        assert!(ctx.registry.command().is_empty());
    }

    #[test]
    fn test_response_loop_exits_when_link_closes() {
        let (ctx, config) = setup();
        let (link, peripheral) = MockLink::new();
        let (reader, writer) = rover_link::SplittableLink::split(link).unwrap();
        peripheral.inject("R:4242:FR:3:0;");
        drop(peripheral);
        drop(writer);

        response_loop(reader, ctx.clone(), config);
        assert_eq!(ctx.metrics.snapshot().emergency_stops, 1);
    }
}

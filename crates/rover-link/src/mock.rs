//! 内存模拟外设（`mock` feature）
//!
//! 用于测试和无硬件演示：
//! - 写入的帧被记录下来，可由 [`MockPeripheral`] 检查
//! - 应答帧通过 [`MockPeripheral::inject`] 注入，或由应答函数自动生成
//! - 读端带超时，超时返回 `LinkError::Timeout`，与真实串口行为一致

use crate::{LinkError, LinkReader, LinkWriter, SplittableLink};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 应答函数：输入一帧命令，返回零到多帧应答
pub type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// 模拟外设句柄（测试侧持有）
#[derive(Clone)]
pub struct MockPeripheral {
    reply_tx: Sender<String>,
    written: Arc<Mutex<Vec<String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockPeripheral {
    /// 注入一帧应答（将被读端读到）
    pub fn inject(&self, frame: impl Into<String>) {
        let _ = self.reply_tx.send(frame.into());
    }

    /// 已写出的全部帧（按写入顺序）
    pub fn written(&self) -> Vec<String> {
        self.written.lock().clone()
    }

    /// 让后续写操作失败（模拟串口断开）
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// 等待至少 `count` 帧被写出
    ///
    /// 返回是否在超时前满足条件。
    pub fn wait_for_written(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.written.lock().len() >= count {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

/// 模拟链路读半边
pub struct MockReader {
    reply_rx: Receiver<String>,
    read_timeout: Duration,
}

impl LinkReader for MockReader {
    fn read_frame(&mut self) -> Result<String, LinkError> {
        match self.reply_rx.recv_timeout(self.read_timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Err(LinkError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Closed),
        }
    }
}

/// 模拟链路写半边
pub struct MockWriter {
    reply_tx: Sender<String>,
    written: Arc<Mutex<Vec<String>>>,
    fail_writes: Arc<AtomicBool>,
    responder: Option<Responder>,
}

impl LinkWriter for MockWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock peripheral disconnected",
            )));
        }

        let frame = String::from_utf8_lossy(bytes).into_owned();
        self.written.lock().push(frame.clone());

        if let Some(responder) = self.responder.as_mut() {
            for reply in responder(&frame) {
                let _ = self.reply_tx.send(reply);
            }
        }
        Ok(())
    }
}

/// 模拟链路
pub struct MockLink {
    reader: MockReader,
    writer: MockWriter,
}

impl MockLink {
    /// 创建模拟链路及其外设句柄
    ///
    /// # Example
    ///
    /// ```
    /// use rover_link::{LinkReader, LinkWriter, MockLink};
    ///
    /// let (mut link, peripheral) = MockLink::new();
    /// link.write_frame("C:1:SW;").unwrap();
    /// peripheral.inject("R:1:SW;");
    /// assert_eq!(link.read_frame().unwrap(), "R:1:SW;");
    /// assert_eq!(peripheral.written(), vec!["C:1:SW;".to_string()]);
    /// ```
    pub fn new() -> (Self, MockPeripheral) {
        let (reply_tx, reply_rx) = unbounded();
        let written = Arc::new(Mutex::new(Vec::new()));
        let fail_writes = Arc::new(AtomicBool::new(false));

        let link = Self {
            reader: MockReader {
                reply_rx,
                read_timeout: DEFAULT_READ_TIMEOUT,
            },
            writer: MockWriter {
                reply_tx: reply_tx.clone(),
                written: written.clone(),
                fail_writes: fail_writes.clone(),
                responder: None,
            },
        };
        let peripheral = MockPeripheral {
            reply_tx,
            written,
            fail_writes,
        };
        (link, peripheral)
    }

    /// 设置自动应答函数（每次写入后调用）
    pub fn with_responder(mut self, responder: impl FnMut(&str) -> Vec<String> + Send + 'static) -> Self {
        self.writer.responder = Some(Box::new(responder));
        self
    }

    /// 设置读超时
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.reader.read_timeout = timeout;
        self
    }
}

impl LinkReader for MockLink {
    fn read_frame(&mut self) -> Result<String, LinkError> {
        self.reader.read_frame()
    }
}

impl LinkWriter for MockLink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.writer.write(bytes)
    }
}

impl SplittableLink for MockLink {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn split(self) -> Result<(Self::Reader, Self::Writer), LinkError> {
        Ok((self.reader, self.writer))
    }
}

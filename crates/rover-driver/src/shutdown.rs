//! 协作式关闭信号
//!
//! 运行标志加一个 crossbeam 通道：触发时丢弃发送端，
//! 所有在 [`ShutdownSignal::sleep`] 中等待的线程立即被唤醒。

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct ShutdownSignal {
    running: AtomicBool,
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(0);
        Self {
            running: AtomicBool::new(true),
            wake_tx: Mutex::new(Some(wake_tx)),
            wake_rx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 请求关闭（可重复调用）
    pub fn trigger(&self) {
        self.running.store(false, Ordering::Release);
        self.wake_tx.lock().take();
    }

    /// 可被关闭打断的睡眠
    ///
    /// 睡满 `duration` 且仍在运行时返回 `true`，被关闭打断返回 `false`。
    pub fn sleep(&self, duration: Duration) -> bool {
        if !self.is_running() {
            return false;
        }
        match self.wake_rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.is_running(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

//! 双优先级消息通道
//!
//! 每个通道有两个 FIFO 队列：
//! - 带外队列（OOB）：急停等高优先级消息，总是先于普通队列取出
//! - 普通队列：按发送顺序投递，可被 [`Channel::flush`] 整体丢弃
//!
//! 多生产者、单消费者。队列由 `parking_lot::Mutex` 保护，
//! 阻塞接收通过 `Condvar` 唤醒。
//!
//! 用 [`Channel::bounded`] 创建的通道限制普通队列长度，满时丢弃最旧的消息，
//! 适合只关心最新状态的通知（例如显示）。

use crate::error::ChannelError;
use crate::message::{Message, Payload};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use tracing::trace;

/// 通道能力谓词：返回 `true` 表示接受该消息类型
pub type Capability = fn(&Payload) -> bool;

#[derive(Default)]
struct Queues {
    oob: VecDeque<Message>,
    regular: VecDeque<Message>,
    closed: bool,
}

impl Queues {
    fn pop(&mut self) -> Option<Message> {
        self.oob.pop_front().or_else(|| self.regular.pop_front())
    }
}

/// 双优先级消息通道
pub struct Channel {
    name: &'static str,
    accepts: Capability,
    /// 普通队列容量上限（`None` 表示不限）
    capacity: Option<usize>,
    queues: Mutex<Queues>,
    ready: Condvar,
}

impl Channel {
    pub fn new(name: &'static str, accepts: Capability) -> Self {
        Self {
            name,
            accepts,
            capacity: None,
            queues: Mutex::new(Queues::default()),
            ready: Condvar::new(),
        }
    }

    /// 普通队列最多保留 `capacity` 条消息，满时丢弃最旧的一条
    ///
    /// 带外队列不受限制。`capacity` 至少为 1。
    pub fn bounded(name: &'static str, accepts: Capability, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::new(name, accepts)
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn accepts(&self, payload: &Payload) -> bool {
        (self.accepts)(payload)
    }

    /// 发送消息
    ///
    /// 带外消息进入 OOB 队列，其余进入普通队列，然后唤醒阻塞的接收方。
    ///
    /// # 错误
    /// - `ChannelError::Unsupported`: 通道不接受该类型，队列保持不变
    /// - `ChannelError::Disconnected`: 通道已关闭
    pub fn send(&self, message: Message) -> Result<(), ChannelError> {
        if !self.accepts(message.payload()) {
            return Err(ChannelError::Unsupported {
                kind: message.kind(),
                channel: self.name,
                message: Box::new(message),
            });
        }

        let mut queues = self.queues.lock();
        if queues.closed {
            return Err(ChannelError::Disconnected(Some(Box::new(message))));
        }
        trace!("{} channel <- {} #{}", self.name, message.kind(), message.id());
        if message.is_out_of_band() {
            queues.oob.push_back(message);
        } else {
            if let Some(capacity) = self.capacity
                && queues.regular.len() >= capacity
                && let Some(oldest) = queues.regular.pop_front()
            {
                trace!("{} channel full, dropped {} #{}", self.name, oldest.kind(), oldest.id());
            }
            queues.regular.push_back(message);
        }
        drop(queues);
        self.ready.notify_all();
        Ok(())
    }

    /// 非阻塞接收（OOB 队列优先）
    pub fn try_receive(&self) -> Option<Message> {
        self.queues.lock().pop()
    }

    /// 阻塞接收
    ///
    /// 队列为空时挂起，直到有新消息或通道关闭。关闭后仍会先取完剩余消息。
    ///
    /// # 错误
    /// - `ChannelError::Disconnected(None)`: 通道已关闭且队列为空
    pub fn receive_blocking(&self) -> Result<Message, ChannelError> {
        let mut queues = self.queues.lock();
        loop {
            if let Some(message) = queues.pop() {
                return Ok(message);
            }
            if queues.closed {
                return Err(ChannelError::Disconnected(None));
            }
            self.ready.wait(&mut queues);
        }
    }

    /// 丢弃普通队列中的全部消息（OOB 队列不受影响）
    ///
    /// 返回丢弃的消息数。
    pub fn flush(&self) -> usize {
        let mut queues = self.queues.lock();
        let flushed = queues.regular.len();
        queues.regular.clear();
        drop(queues);
        self.ready.notify_all();
        flushed
    }

    /// 关闭通道，唤醒所有阻塞的接收方
    pub fn close(&self) {
        self.queues.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.queues.lock().closed
    }

    pub fn is_empty(&self) -> bool {
        let queues = self.queues.lock();
        queues.oob.is_empty() && queues.regular.is_empty()
    }

    pub fn len(&self) -> usize {
        let queues = self.queues.lock();
        queues.oob.len() + queues.regular.len()
    }

    pub fn oob_len(&self) -> usize {
        self.queues.lock().oob.len()
    }

    pub fn regular_len(&self) -> usize {
        self.queues.lock().regular.len()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queues = self.queues.lock();
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("oob", &queues.oob.len())
            .field("regular", &queues.regular.len())
            .field("closed", &queues.closed)
            .finish()
    }
}

//! 命令/应答关联存储（MailBag）
//!
//! 命令线程把已发出的命令按 ID 存入，响应线程收到应答后按 ID 取回。
//! 所有操作在同一把锁内完成。

use crate::message::{Message, MessageId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    message: Message,
    filed_at: Instant,
}

/// 等待应答的命令
#[derive(Default)]
pub struct MailBag {
    entries: Mutex<HashMap<MessageId, Entry>>,
}

impl MailBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 存入已发送的命令
    ///
    /// 若同一 ID 已有条目（ID 回绕后旧命令仍未收到应答），返回被替换的旧消息。
    pub fn insert(&self, message: Message) -> Option<Message> {
        debug_assert!(message.is_processed(), "only processed commands are filed");
        let entry = Entry {
            message,
            filed_at: Instant::now(),
        };
        self.entries
            .lock()
            .insert(entry.message.id(), entry)
            .map(|old| old.message)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// 取出并删除
    pub fn fetch(&self, id: MessageId) -> Option<Message> {
        self.entries.lock().remove(&id).map(|entry| entry.message)
    }

    /// 查看但不删除（返回副本）
    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.entries.lock().get(&id).map(|entry| entry.message.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 删除存放时间超过 `age` 的条目，返回删除数量
    pub fn evict_older_than(&self, age: Duration) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.filed_at.elapsed() <= age);
        before - entries.len()
    }
}

impl std::fmt::Debug for MailBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailBag").field("outstanding", &self.len()).finish()
    }
}

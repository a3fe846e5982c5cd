//! 线程共享上下文
//!
//! 运行时启动时创建一次，以 `Arc` 形式交给每个控制线程。

use crate::mailbag::MailBag;
use crate::metrics::RoverMetrics;
use crate::registry::ChannelRegistry;
use crate::shutdown::ShutdownSignal;

#[derive(Debug, Default)]
pub struct RoverContext {
    pub registry: ChannelRegistry,
    pub mailbag: MailBag,
    pub metrics: RoverMetrics,
    pub shutdown: ShutdownSignal,
}

impl RoverContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    /// 请求所有线程退出：清除运行标志、关闭所有通道
    pub fn shutdown(&self) {
        self.shutdown.trigger();
        self.registry.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn test_shutdown_closes_channels() {
        let ctx = RoverContext::new();
        assert!(ctx.is_running());
        ctx.shutdown();
        assert!(!ctx.is_running());
        assert!(ctx.registry.command().send(Message::emergency_stop()).is_err());
    }
}

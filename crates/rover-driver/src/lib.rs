//! # Rover Driver
//!
//! 小车控制核心：线程间消息通道与命令/应答关联。
//!
//! - [`Message`]：带唯一 ID 的消息（电机、测距、急停、看门狗通知、显示通知）
//! - [`Channel`]：双优先级（带外 + 普通）单消费者通道
//! - [`ChannelRegistry`]：端点到通道的映射
//! - [`MailBag`]：等待应答的命令
//! - [`pipeline`]：命令、响应、看门狗三个控制循环
//! - [`Rover`] / [`RoverBuilder`]：启动和关闭运行时
//!
//! # Example
//!
//! ```no_run
//! use rover_driver::RoverBuilder;
//!
//! let rover = RoverBuilder::new().device("/dev/rfcomm0").build()?;
//! rover.drive(150)?;
//! rover.stop()?;
//! # Ok::<(), rover_driver::DriverError>(())
//! ```

mod builder;
pub mod channel;
pub mod config;
mod context;
mod error;
pub mod mailbag;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod registry;
mod rover;
pub mod shutdown;

pub use builder::RoverBuilder;
pub use channel::{Capability, Channel};
pub use config::{MotorCalibration, PipelineConfig, WatchdogConfig};
pub use context::RoverContext;
pub use error::{ChannelError, DriverError};
pub use mailbag::MailBag;
pub use message::{
    DisplayNotice, IdAllocator, LogLevel, MAX_MESSAGE_ID, Message, MessageId, MotorCommand,
    Payload, RangeCommand, WatchdogNotice, next_id,
};
pub use metrics::{MetricsSnapshot, RoverMetrics};
pub use pipeline::{
    CommandDispatcher, Correlation, ResponseCorrelator, Watchdog, dispatch_loop, response_loop,
    watchdog_loop,
};
pub use registry::{ChannelRegistry, DISPLAY_BACKLOG, Endpoint};
pub use rover::Rover;
pub use shutdown::ShutdownSignal;

pub use rover_protocol::RangeReading;

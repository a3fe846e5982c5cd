//! # Rover Link Layer
//!
//! 外设传输层抽象：主机与串口微控制器之间的字节链路。
//!
//! - 写方向：整帧写出（`C:<id>:...;`）
//! - 读方向：逐字节累积，直到遇到 `;` 结束符，返回一整帧
//!
//! 驱动层通过 [`SplittableLink`] 把链路拆成独立的读/写两半，
//! 分别交给响应线程和命令线程。

use thiserror::Error;

pub mod stream;

#[cfg(feature = "mock")]
pub mod mock;

pub use stream::{FrameReader, FrameWriter, StreamLink};

#[cfg(feature = "mock")]
pub use mock::{MockLink, MockPeripheral, MockReader, MockWriter};

/// 单帧最大长度（字节），超出后丢弃已累积的数据
pub const DEFAULT_MAX_FRAME_LEN: usize = 256;

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// 读超时（正常现象，已累积的半帧会保留）
    #[error("Read timeout")]
    Timeout,
    /// 对端关闭（EOF）
    #[error("Link closed")]
    Closed,
    #[error("Frame exceeds {limit} bytes without terminator")]
    FrameTooLong { limit: usize },
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,
}

impl LinkError {
    /// 是否为可忽略的超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout)
    }
}

/// 读半边：阻塞读取一整帧
pub trait LinkReader {
    fn read_frame(&mut self) -> Result<String, LinkError>;
}

/// 写半边：写出原始字节
pub trait LinkWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    fn write_frame(&mut self, frame: &str) -> Result<(), LinkError> {
        self.write(frame.as_bytes())
    }
}

/// 完整的外设链路（读 + 写）
pub trait PeripheralLink: LinkReader + LinkWriter {}

impl<T: LinkReader + LinkWriter> PeripheralLink for T {}

/// 可拆分的链路
///
/// 拆分后原链路不再可用（消费 `self`）。
pub trait SplittableLink: PeripheralLink {
    type Reader: LinkReader;
    type Writer: LinkWriter;
    fn split(self) -> Result<(Self::Reader, Self::Writer), LinkError>;
}

//! 基于 `Read`/`Write` 的链路实现
//!
//! 串口设备在 Linux 上就是一个字符设备文件，波特率等 termios 设置由
//! 外部（udev 规则或 `stty`）完成，这里只负责帧的读写。

use crate::{DEFAULT_MAX_FRAME_LEN, LinkError, LinkReader, LinkWriter, SplittableLink};
use rover_protocol::FRAME_TERMINATOR_BYTE;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::Path;
use tracing::{trace, warn};

/// 帧累积读取器
///
/// 逐字节读取直到遇到 `;`，返回的帧包含结束符。
/// 读超时不会丢弃已累积的半帧，下次调用继续累积。
pub struct FrameReader<R> {
    inner: BufReader<R>,
    buffer: Vec<u8>,
    max_frame_len: usize,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_frame_len(inner, DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            buffer: Vec::with_capacity(32),
            max_frame_len,
        }
    }

    /// 当前已累积但尚未完成的字节数
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

impl<R: Read> LinkReader for FrameReader<R> {
    fn read_frame(&mut self) -> Result<String, LinkError> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(_) => {
                    self.buffer.push(byte[0]);
                    if byte[0] == FRAME_TERMINATOR_BYTE {
                        let raw = std::mem::take(&mut self.buffer);
                        let frame = String::from_utf8(raw).map_err(|_| LinkError::InvalidUtf8)?;
                        trace!("Link RX frame: {}", frame.trim());
                        return Ok(frame);
                    }
                    if self.buffer.len() >= self.max_frame_len {
                        warn!(
                            "Discarding {} bytes without frame terminator",
                            self.buffer.len()
                        );
                        self.buffer.clear();
                        return Err(LinkError::FrameTooLong {
                            limit: self.max_frame_len,
                        });
                    }
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Err(LinkError::Timeout);
                },
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// 帧写出器
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> LinkWriter for FrameWriter<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.inner.write_all(bytes)?;
        self.inner.flush()?;
        Ok(())
    }
}

/// 由独立读写端组成的链路
pub struct StreamLink<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl<R: Read, W: Write> StreamLink<R, W> {
    pub fn from_parts(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }
}

impl StreamLink<File, File> {
    /// 打开串口设备（读写模式），读写两端共享同一个文件描述
    ///
    /// # 错误
    /// - `LinkError::Io`: 设备不存在或无权限
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LinkError> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let reader = file.try_clone()?;
        Ok(Self::from_parts(reader, file))
    }
}

impl<R: Read, W: Write> LinkReader for StreamLink<R, W> {
    fn read_frame(&mut self) -> Result<String, LinkError> {
        self.reader.read_frame()
    }
}

impl<R: Read, W: Write> LinkWriter for StreamLink<R, W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.writer.write(bytes)
    }
}

impl<R: Read, W: Write> SplittableLink for StreamLink<R, W> {
    type Reader = FrameReader<R>;
    type Writer = FrameWriter<W>;

    fn split(self) -> Result<(Self::Reader, Self::Writer), LinkError> {
        Ok((self.reader, self.writer))
    }
}

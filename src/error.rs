//! Error types for ranged-lines
//!
//! ranged-lines 的错误类型

use crate::reader::LineRange;
use std::io;
use thiserror::Error;

/// Error type for ranged-lines operations
///
/// ranged-lines 操作的错误类型
///
/// Configuration and partitioning errors are fatal and returned from
/// [`LineReader::execute`](crate::LineReader::execute) before any worker starts.
/// Decode, read and write errors are scoped to one range and collected into
/// the run's [`Summary`](crate::Summary).
///
/// 配置错误和分片错误是致命的，在任何 worker 启动前由 `execute` 返回。
/// 解码、读取和写入错误只影响单个范围，并汇总到本次运行的 `Summary` 中。
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected input or configuration (empty file, zero threads, unknown encoding)
    ///
    /// 被拒绝的输入或配置（空文件、线程数为 0、未知编码）
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O failure while scanning for line boundaries
    ///
    /// 扫描行边界时的 I/O 错误
    #[error("failed to partition input: {0}")]
    Partition(#[source] io::Error),

    /// Malformed byte sequence for the configured encoding
    ///
    /// 字节序列不符合配置的编码
    #[error("malformed {encoding} sequence in line starting at byte {offset}")]
    Decode { offset: u64, encoding: &'static str },

    /// I/O failure while reading a range of the input
    ///
    /// 读取输入范围时的 I/O 错误
    #[error("failed to read range {range}: {source}")]
    Read {
        range: LineRange,
        #[source]
        source: io::Error,
    },

    /// I/O failure while writing a transformed slice
    ///
    /// 写入转换后的切片时的 I/O 错误
    #[error("failed to write output for range {range}: {source}")]
    OutputWrite {
        range: LineRange,
        #[source]
        source: io::Error,
    },

    /// A worker panicked while processing its range
    ///
    /// worker 在处理其范围时 panic
    #[error("worker for range {range} panicked: {message}")]
    WorkerPanicked { range: LineRange, message: String },

    /// The worker for a range was never started or exited before finishing it
    ///
    /// 范围对应的 worker 未能启动或在完成前退出
    #[error("worker for range {range} never completed")]
    WorkerNotRun { range: LineRange },

    /// Start or end notification failed
    ///
    /// 开始或结束通知失败
    #[error("lifecycle callback failed: {0}")]
    Finalize(#[source] io::Error),

    /// I/O error
    ///
    /// I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Data length does not match the output range
    ///
    /// 数据长度与输出范围不匹配
    #[error("data length {data_len} does not match range length {range_len}")]
    DataLengthMismatch { data_len: usize, range_len: u64 },

    /// Write would go past the end of the output file
    ///
    /// 写入超出输出文件大小
    #[error("write of {len} bytes at offset {offset} exceeds file size {file_size}")]
    WriteExceedsFileSize { offset: u64, len: usize, file_size: u64 },

    /// Input range does not fit inside the output file
    ///
    /// 输入范围超出输出文件
    #[error("range {range} does not fit in output of {file_size} bytes")]
    RangeOutOfBounds { range: LineRange, file_size: u64 },

    /// Input range overlaps one that was already placed in the output
    ///
    /// 输入范围与已放置的范围重叠
    #[error("range {range} overlaps a range already placed in the output")]
    RangeOverlap { range: LineRange },

    /// Buffer too small for range
    ///
    /// 缓冲区太小
    #[error("buffer length {buffer_len} is smaller than range length {range_len}")]
    BufferTooSmall { buffer_len: usize, range_len: u64 },
}

impl Error {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    /// Whether this error rejected the run before any worker started
    ///
    /// 此错误是否在任何 worker 启动前就拒绝了本次运行
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::Partition(_))
    }
}

/// Convert from Error to io::Error for compatibility
///
/// 从 Error 转换到 io::Error 以保持兼容性
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(io_err) | Error::Partition(io_err) | Error::Finalize(io_err) => io_err,
            Error::Read { source, .. } | Error::OutputWrite { source, .. } => source,
            Error::Decode { .. } => io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
            other => io::Error::new(io::ErrorKind::InvalidInput, other.to_string()),
        }
    }
}

/// Result type alias using our custom Error type
///
/// 使用自定义 Error 类型的 Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;

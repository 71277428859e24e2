//! Reader configuration
//!
//! 读取器配置

use crate::error::{Error, Result};
use encoding_rs::Encoding;
use std::num::NonZeroUsize;

/// Default window size: 1 MiB
///
/// 默认窗口大小：1 MiB
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Default character encoding label
///
/// 默认字符编码标签
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// How line terminators are recognized
///
/// 行终止符的识别方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TerminatorPolicy {
    /// Every `\r` and every `\n` is its own one-byte terminator.
    /// A `\r\n` pair therefore yields an empty line between the two bytes.
    ///
    /// 每个 `\r` 和 `\n` 都是独立的单字节终止符。
    #[default]
    Bytewise,

    /// `\r\n` is a single terminator; bare `\r` and bare `\n` still terminate.
    ///
    /// `\r\n` 视为一个终止符；单独的 `\r` 和 `\n` 仍然是终止符。
    CrLfAware,
}

/// How a worker pulls the bytes of its range
///
/// worker 读取其范围字节的方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ReadMode {
    /// Map each window of the range read-only
    ///
    /// 以只读方式映射范围的每个窗口
    #[default]
    Mapped,

    /// Read each window through a private file handle
    ///
    /// 通过私有文件句柄读取每个窗口
    Buffered,
}

/// Options recognized by [`LineReader`](crate::LineReader)
///
/// [`LineReader`](crate::LineReader) 识别的选项
///
/// Setters are chainable and never fail; the values are validated when the
/// reader is constructed.
///
/// 设置方法可链式调用且不会失败；取值在构造读取器时校验。
///
/// # Examples
///
/// ```
/// use ranged_lines::{Config, TerminatorPolicy};
///
/// let config = Config::default()
///     .threads(4)
///     .encoding("UTF-8")
///     .buffer_size(64 * 1024)
///     .terminators(TerminatorPolicy::CrLfAware);
/// assert_eq!(config.thread_count(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    threads: usize,
    encoding: String,
    buffer_size: usize,
    terminators: TerminatorPolicy,
    read_mode: ReadMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 1,
            encoding: DEFAULT_ENCODING.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            terminators: TerminatorPolicy::default(),
            read_mode: ReadMode::default(),
        }
    }
}

impl Config {
    /// Number of partitions and workers (must be at least 1)
    ///
    /// 分片和 worker 的数量（至少为 1）
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Encoding label understood by `encoding_rs` (`"UTF-8"`, `"GBK"`, `"latin1"`, ...)
    ///
    /// `encoding_rs` 可识别的编码标签
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = label.into();
        self
    }

    /// Maximum bytes held per worker window; `0` reads each range as one window
    ///
    /// 每个 worker 窗口的最大字节数；`0` 表示整个范围作为一个窗口
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// How `\r` and `\n` are recognized as line terminators
    ///
    /// `\r` 和 `\n` 作为行终止符的识别方式
    pub fn terminators(mut self, policy: TerminatorPolicy) -> Self {
        self.terminators = policy;
        self
    }

    /// Whether workers map or read their ranges
    ///
    /// worker 映射还是读取其范围
    pub fn read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }

    /// Configured number of workers
    ///
    /// 配置的 worker 数量
    #[inline]
    pub fn thread_count(&self) -> usize {
        self.threads
    }

    /// Configured encoding label, as given
    ///
    /// 配置的编码标签（原样）
    #[inline]
    pub fn encoding_label(&self) -> &str {
        &self.encoding
    }

    /// Configured window size in bytes
    ///
    /// 配置的窗口字节数
    #[inline]
    pub fn window_size(&self) -> usize {
        self.buffer_size
    }

    /// Configured terminator policy
    ///
    /// 配置的终止符策略
    #[inline]
    pub fn terminator_policy(&self) -> TerminatorPolicy {
        self.terminators
    }

    /// Configured read mode
    ///
    /// 配置的读取方式
    #[inline]
    pub fn mode(&self) -> ReadMode {
        self.read_mode
    }

    /// Check every option and resolve the encoding
    ///
    /// 校验所有选项并解析编码
    pub(crate) fn validate(&self) -> Result<Settings> {
        let threads = NonZeroUsize::new(self.threads)
            .ok_or_else(|| Error::invalid_input("thread count must be at least 1"))?;

        let label = self.encoding.trim();
        if label.is_empty() {
            return Err(Error::invalid_input("character encoding must not be empty"));
        }
        let encoding = Encoding::for_label(label.as_bytes()).ok_or_else(|| {
            Error::invalid_input(format!("unknown character encoding `{label}`"))
        })?;
        // Lines are found by scanning raw bytes for `\n`/`\r` and each range is
        // decoded on its own, so the encoding must be ASCII-compatible and
        // stateless, and must encode back to itself.
        if encoding != encoding.output_encoding() || encoding == encoding_rs::ISO_2022_JP {
            return Err(Error::invalid_input(format!(
                "character encoding `{}` cannot be split on line terminator bytes",
                encoding.name()
            )));
        }

        Ok(Settings {
            threads,
            encoding,
            buffer_size: self.buffer_size,
            terminators: self.terminators,
            read_mode: self.read_mode,
        })
    }
}

/// Validated configuration used by one reader
#[derive(Debug, Clone, Copy)]
pub(crate) struct Settings {
    pub(crate) threads: NonZeroUsize,
    pub(crate) encoding: &'static Encoding,
    pub(crate) buffer_size: usize,
    pub(crate) terminators: TerminatorPolicy,
    pub(crate) read_mode: ReadMode,
}

impl Settings {
    /// Window length for a range of `range_len` bytes
    pub(crate) fn window_for(&self, range_len: u64) -> u64 {
        match self.buffer_size {
            0 => range_len,
            size => (size as u64).min(range_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.thread_count(), 1);
        assert_eq!(config.encoding_label(), "UTF-8");
        assert_eq!(config.window_size(), DEFAULT_BUFFER_SIZE);
        assert_eq!(config.terminator_policy(), TerminatorPolicy::Bytewise);
        assert_eq!(config.mode(), ReadMode::Mapped);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = Config::default().threads(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_empty_encoding_rejected() {
        let err = Config::default().encoding("  ").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let err = Config::default().encoding("klingon").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_encoding_labels_resolve() {
        let settings = Config::default().encoding("gbk").validate().unwrap();
        assert_eq!(settings.encoding, encoding_rs::GBK);

        let settings = Config::default().encoding("utf8").validate().unwrap();
        assert_eq!(settings.encoding, encoding_rs::UTF_8);
    }

    #[test]
    fn test_non_ascii_compatible_encodings_rejected() {
        for label in ["UTF-16LE", "utf-16be", "iso-2022-kr", "ISO-2022-JP"] {
            let err = Config::default().encoding(label).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{label}");
        }
        assert!(Config::default().encoding("shift_jis").validate().is_ok());
    }

    #[test]
    fn test_window_for() {
        let settings = Config::default().buffer_size(4).validate().unwrap();
        assert_eq!(settings.window_for(10), 4);
        assert_eq!(settings.window_for(3), 3);

        let unbounded = Config::default().buffer_size(0).validate().unwrap();
        assert_eq!(unbounded.window_for(10), 10);
    }
}

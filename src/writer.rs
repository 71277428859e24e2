//! Slice writer: places transformed slices in the output and completes the file lifecycle
//!
//! 切片写入器：将转换后的切片放入输出，并完成文件生命周期

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{OutputFile, Placement, Placer};
use crate::reader::{Line, LineReader, Slice, SliceListener, Summary};
use crate::transform::{CharReverse, LineTransform};
use encoding_rs::Encoding;
use parking_lot::RwLock;
use std::io;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Where the transformed bytes end up
///
/// 转换后的字节写到哪里
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write a separate file, leaving the input untouched
    ///
    /// 写入单独的文件，不修改输入
    File(PathBuf),

    /// Write a temporary file beside the input and atomically rename it over
    /// the input once every slice has been written
    ///
    /// 在输入旁写入临时文件，所有切片写完后原子地重命名覆盖输入
    ReplaceInput,
}

struct Sink {
    file: OutputFile,
    placer: Placer,
    temp: Option<NamedTempFile>,
}

/// [`SliceListener`] that transforms each slice and writes it to its placed region
///
/// 转换每个切片并写入其放置区域的 [`SliceListener`]
///
/// With [`Placement::Mirrored`] the entries of a slice are written back to
/// front, so combined with [`CharReverse`] the output is the input reversed
/// line by line and character by character. Terminator markers are written
/// as they appeared in the input.
///
/// 使用 [`Placement::Mirrored`] 时切片中的项从后向前写入，配合 [`CharReverse`]
/// 输出即为按行、按字符反转的输入。终止符按输入中的原样写出。
pub struct SliceWriter {
    input: PathBuf,
    target: OutputTarget,
    placement: Placement,
    encoding: &'static Encoding,
    transform: Box<dyn LineTransform>,
    sink: RwLock<Option<Sink>>,
}

impl SliceWriter {
    pub fn new(
        input: impl AsRef<Path>,
        target: OutputTarget,
        placement: Placement,
        transform: Box<dyn LineTransform>,
    ) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            target,
            placement,
            encoding: encoding_rs::UTF_8,
            transform,
            sink: RwLock::new(None),
        }
    }

    /// Encoding used to turn transformed lines back into bytes
    ///
    /// 将转换后的行重新编码为字节所用的编码
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[inline]
    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    /// Bytes for one slice, in the order its placement requires
    fn render(&self, slice: &Slice) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(slice.size() as usize);
        let lines = slice.lines();

        if self.placement.reverses_lines() {
            for line in lines.iter().rev() {
                self.render_line(line, &mut out)?;
            }
        } else {
            for line in lines {
                self.render_line(line, &mut out)?;
            }
        }
        Ok(out)
    }

    fn render_line(&self, line: &Line, out: &mut Vec<u8>) -> io::Result<()> {
        match line {
            Line::Terminator(t) => out.extend_from_slice(t.as_bytes()),
            Line::Text(text) => {
                let transformed = self.transform.apply(text);
                let (bytes, _, unmappable) = self.encoding.encode(&transformed);
                if unmappable {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("line not representable in {}", self.encoding.name()),
                    ));
                }
                out.extend_from_slice(&bytes);
            }
        }
        Ok(())
    }

    fn open_sink(&self, len: NonZeroU64) -> io::Result<Sink> {
        match &self.target {
            OutputTarget::File(path) => {
                if is_same_file(&self.input, path) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("output {} is the input file", path.display()),
                    ));
                }
                let (file, placer) = OutputFile::create(path, len, self.placement)?;
                Ok(Sink { file, placer, temp: None })
            }
            OutputTarget::ReplaceInput => {
                let dir = match self.input.parent() {
                    Some(dir) if !dir.as_os_str().is_empty() => dir,
                    _ => Path::new("."),
                };
                let temp = NamedTempFile::new_in(dir)?;
                let (file, placer) = OutputFile::from_file(temp.as_file(), len, self.placement)?;
                Ok(Sink { file, placer, temp: Some(temp) })
            }
        }
    }
}

/// Whether `a` and `b` name the same existing file, hard links included
fn is_same_file(a: &Path, b: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        match (std::fs::metadata(a), std::fs::metadata(b)) {
            (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
            _ => false,
        }
    }
    #[cfg(not(unix))]
    {
        match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl SliceListener for SliceWriter {
    fn on_start(&self, input_len: NonZeroU64) -> io::Result<()> {
        let sink = self.open_sink(input_len)?;
        *self.sink.write() = Some(sink);
        Ok(())
    }

    fn on_slice(&self, slice: Slice) -> io::Result<()> {
        let guard = self.sink.read();
        let sink = guard
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "output not started"))?;

        let placed = sink.placer.place(slice.range())?;
        let bytes = self.render(&slice)?;
        let receipt = sink.file.write_range(placed, &bytes)?;
        sink.file.flush_range(receipt)?;
        Ok(())
    }

    fn on_end(&self, summary: &Summary) -> io::Result<()> {
        let Some(sink) = self.sink.write().take() else {
            return Ok(());
        };

        // Safety: finalize runs after every worker has returned from on_slice.
        unsafe { sink.file.sync_all()? };
        let Sink { file, placer, temp } = sink;
        drop(file);
        drop(placer);

        if let Some(temp) = temp {
            if summary.is_complete() {
                temp.persist(&self.input)?;
                log::info!("replaced {} with transformed output", self.input.display());
            } else {
                log::warn!(
                    "{} slice(s) failed; leaving {} untouched",
                    summary.failures().len(),
                    self.input.display()
                );
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SliceWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceWriter")
            .field("input", &self.input)
            .field("target", &self.target)
            .field("placement", &self.placement)
            .field("encoding", &self.encoding.name())
            .finish()
    }
}

/// Transform `input` line by line into `target`
///
/// 将 `input` 逐行转换写入 `target`
///
/// The configuration is validated and the input inspected before any output
/// file is created.
///
/// 在创建任何输出文件之前先校验配置并检查输入。
pub fn transform_file(
    input: impl AsRef<Path>,
    target: OutputTarget,
    config: Config,
    placement: Placement,
    transform: Box<dyn LineTransform>,
) -> Result<Summary> {
    let input = input.as_ref();
    let reader = LineReader::new(input, config)?;
    if let OutputTarget::File(path) = &target {
        if is_same_file(input, path) {
            return Err(Error::invalid_input(format!(
                "output {} is the input file; use OutputTarget::ReplaceInput",
                path.display()
            )));
        }
    }
    let writer =
        SliceWriter::new(input, target, placement, transform).with_encoding(reader.encoding());
    reader.execute(&writer)
}

/// Reverse `input` character by character into `target`
///
/// 将 `input` 按字符反转写入 `target`
///
/// ```
/// use ranged_lines::{reverse_file, Config, OutputTarget};
/// # fn main() -> ranged_lines::Result<()> {
/// # let dir = tempfile::tempdir()?;
/// let input = dir.path().join("input.txt");
/// std::fs::write(&input, "ab\ncd\n")?;
///
/// let summary = reverse_file(&input, OutputTarget::ReplaceInput, Config::default().threads(2))?;
///
/// assert_eq!(summary.lines(), 2);
/// assert_eq!(std::fs::read_to_string(&input)?, "\ndc\nba");
/// # Ok(())
/// # }
/// ```
pub fn reverse_file(
    input: impl AsRef<Path>,
    target: OutputTarget,
    config: Config,
) -> Result<Summary> {
    transform_file(
        input,
        target,
        config,
        Placement::Mirrored,
        Box::new(CharReverse),
    )
}

//! Parallel line-aligned reader
//!
//! 并行按行对齐读取器
//!
//! [`LineReader::execute`] splits the input into line-aligned [`LineRange`]s,
//! decodes each range on its own worker thread and hands every resulting
//! [`Slice`] to a [`SliceListener`]. Workers complete in any order; a
//! [`CompletionBarrier`] runs the finalize step once, after the last worker
//! has delivered its slice.
//!
//! [`LineReader::execute`] 将输入切分为按行对齐的 [`LineRange`]，
//! 在各自的 worker 线程上解码每个范围，并把得到的 [`Slice`] 交给 [`SliceListener`]。
//! worker 可以任意顺序完成；[`CompletionBarrier`] 在最后一个 worker 交付切片后
//! 执行一次收尾步骤。
//!
//! ```
//! use ranged_lines::{Config, LineReader, Slice, SliceListener};
//! use parking_lot::Mutex;
//! # use std::io::Write;
//! # fn main() -> ranged_lines::Result<()> {
//! # let mut input = tempfile::NamedTempFile::new()?;
//! # input.write_all(b"ab\ncd\nef\n")?;
//!
//! #[derive(Default)]
//! struct Collect(Mutex<Vec<Slice>>);
//!
//! impl SliceListener for Collect {
//!     fn on_slice(&self, slice: Slice) -> std::io::Result<()> {
//!         self.0.lock().push(slice);
//!         Ok(())
//!     }
//! }
//!
//! let reader = LineReader::new(input.path(), Config::default().threads(2))?;
//! let collect = Collect::default();
//! let summary = reader.execute(&collect)?;
//!
//! assert_eq!(summary.lines(), 3);
//! assert!(summary.is_complete());
//! # Ok(())
//! # }
//! ```

mod barrier;
mod partition;
mod slice;
mod worker;

#[cfg(test)]
mod tests;

pub use barrier::{Arrival, BarrierState, CompletionBarrier};
pub use partition::{LineRange, partition};
pub use slice::{Line, Slice, Terminator};

use crate::config::{Config, Settings};
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fs::File;
use std::io;
use std::num::{NonZeroU64, NonZeroUsize};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use worker::Source;

/// Monotonic count of decoded lines
///
/// 已解码行数的单调计数器
///
/// Diagnostic only; incremented once per decoded line by the workers and read
/// at finalize.
///
/// 仅用于诊断；worker 每解码一行递增一次，在收尾时读取。
#[derive(Debug, Default)]
pub struct LineCounter(AtomicU64);

impl LineCounter {
    /// Create a counter starting at zero
    ///
    /// 创建一个从零开始的计数器
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one decoded line
    ///
    /// 记录一行已解码的行
    #[inline]
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Lines counted so far
    ///
    /// 目前已计数的行数
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Callbacks driven by [`LineReader::execute`]
///
/// 由 [`LineReader::execute`] 驱动的回调
///
/// `on_slice` is called concurrently from several workers and must serialize
/// access to any shared sink it writes to, unless each call writes to a
/// region no other call touches.
///
/// `on_slice` 会被多个 worker 并发调用，必须对共享输出进行串行化，
/// 除非每次调用写入的区域互不重叠。
pub trait SliceListener: Sync {
    /// Called once, before any worker starts
    ///
    /// 在任何 worker 启动前调用一次
    fn on_start(&self, input_len: NonZeroU64) -> io::Result<()> {
        let _ = input_len;
        Ok(())
    }

    /// Called once per non-empty range with its decoded slice
    ///
    /// 每个非空范围调用一次，传入解码后的切片
    fn on_slice(&self, slice: Slice) -> io::Result<()>;

    /// Called once from finalize, after every `on_slice` call has returned
    ///
    /// 在所有 `on_slice` 返回后，从收尾步骤中调用一次
    fn on_end(&self, summary: &Summary) -> io::Result<()> {
        let _ = summary;
        Ok(())
    }
}

/// Failure of one worker, tied to the range it owned
///
/// 单个 worker 的失败，关联其负责的范围
#[derive(Debug)]
pub struct SliceFailure {
    pub range: LineRange,
    pub error: Error,
}

/// Aggregate result of one [`LineReader::execute`] run
///
/// 一次 [`LineReader::execute`] 运行的汇总结果
#[derive(Debug)]
pub struct Summary {
    input_len: u64,
    ranges: Vec<LineRange>,
    lines: u64,
    elapsed: Duration,
    failures: Vec<SliceFailure>,
}

impl Summary {
    /// Input size in bytes
    ///
    /// 输入的字节数
    #[inline]
    pub fn input_len(&self) -> u64 {
        self.input_len
    }

    /// Ranges computed by the partitioner, in file order
    ///
    /// 分片器计算出的范围，按文件顺序排列
    #[inline]
    pub fn ranges(&self) -> &[LineRange] {
        &self.ranges
    }

    /// Total lines decoded across all workers
    ///
    /// 所有 worker 解码的总行数
    #[inline]
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Time from the first worker spawn to finalize
    ///
    /// 从第一个 worker 启动到收尾的耗时
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Failed ranges, ordered by range start
    ///
    /// 失败的范围，按起始位置排序
    #[inline]
    pub fn failures(&self) -> &[SliceFailure] {
        &self.failures
    }

    /// Whether every range was delivered successfully
    ///
    /// 是否所有范围都已成功交付
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Parallel reader over one input file
///
/// 单个输入文件的并行读取器
#[derive(Debug)]
pub struct LineReader {
    path: PathBuf,
    settings: Settings,
}

impl LineReader {
    /// Validate `config` for reading `path`
    ///
    /// 校验用于读取 `path` 的配置
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a rejected configuration. The file itself is
    /// inspected by [`execute`](Self::execute).
    pub fn new(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            settings: config.validate()?,
        })
    }

    /// Input file path
    ///
    /// 输入文件路径
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoding lines are decoded with
    ///
    /// 解码行所用的编码
    #[inline]
    pub fn encoding(&self) -> &'static encoding_rs::Encoding {
        self.settings.encoding
    }

    /// Compute the ranges `execute` would process, without processing them
    ///
    /// 计算 `execute` 将处理的范围，但不处理
    pub fn ranges(&self) -> Result<Vec<LineRange>> {
        self.open().map(|(_, _, ranges)| ranges)
    }

    fn open(&self) -> Result<(File, NonZeroU64, Vec<LineRange>)> {
        let file = File::open(&self.path).map_err(|err| {
            Error::invalid_input(format!("cannot open {}: {err}", self.path.display()))
        })?;
        let len = NonZeroU64::new(file.metadata().map_err(Error::Partition)?.len())
            .ok_or_else(|| Error::invalid_input("input file is empty"))?;
        let ranges = partition(&file, len, self.settings.threads, self.settings.terminators)?;
        Ok((file, len, ranges))
    }

    /// Process the whole input, delivering one slice per range to `listener`
    ///
    /// 处理整个输入，为每个范围向 `listener` 交付一个切片
    ///
    /// Blocks until finalize has run. Per-range failures do not stop other
    /// workers and are reported in the returned [`Summary`].
    ///
    /// 阻塞直到收尾完成。单个范围的失败不会中止其他 worker，并记录在返回的 [`Summary`] 中。
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`]: missing or empty input
    /// - [`Error::Partition`]: I/O failure while computing ranges
    /// - [`Error::Finalize`]: `on_start` or `on_end` failed
    pub fn execute<L: SliceListener + ?Sized>(&self, listener: &L) -> Result<Summary> {
        let (file, len, ranges) = self.open()?;
        let workers = NonZeroUsize::new(ranges.len())
            .ok_or_else(|| Error::invalid_input("input produced no ranges"))?;

        listener.on_start(len).map_err(Error::Finalize)?;

        let started = Instant::now();
        let counter = LineCounter::new();
        let input = RwLock::new(Some(file));
        let failures = Mutex::new(Vec::new());

        let barrier = CompletionBarrier::new(workers, || -> Result<Summary> {
            // Every worker has arrived; nobody holds the input any more.
            drop(input.write().take());

            let mut failures = std::mem::take(&mut *failures.lock());
            failures.sort_by_key(|f: &SliceFailure| f.range.start());
            let summary = Summary {
                input_len: len.get(),
                ranges: ranges.clone(),
                lines: counter.get(),
                elapsed: started.elapsed(),
                failures,
            };
            log::info!("total time spent = {}ms", summary.elapsed.as_millis());
            log::info!("total lines processed = {}", summary.lines);

            listener.on_end(&summary).map_err(Error::Finalize)?;
            Ok(summary)
        });

        let source = Source {
            path: &self.path,
            file: &input,
            settings: &self.settings,
            counter: &counter,
        };
        let arrivals = barrier
            .arrivals()
            .ok_or_else(|| Error::invalid_input("barrier tokens already issued"))?;

        thread::scope(|s| {
            for (index, (range, arrival)) in ranges.iter().copied().zip(arrivals).enumerate() {
                let source = &source;
                let assignment = Assignment {
                    range,
                    failures: &failures,
                    arrival: Some(arrival),
                };
                let spawned = thread::Builder::new()
                    .name(format!("slice-{index}"))
                    .spawn_scoped(s, move || {
                        assignment.finish(run_worker(source, listener, range));
                    });
                if let Err(err) = spawned {
                    // The dropped assignment already recorded the range as failed.
                    log::error!("could not spawn worker for slice {range}: {err}");
                }
            }
        });

        barrier
            .into_outcome()
            .unwrap_or_else(|| Err(Error::invalid_input("finalize did not run")))
    }
}

/// A range handed to one worker, together with its barrier token
///
/// Dropping an assignment without [`finish`](Self::finish) records the range
/// as [`Error::WorkerNotRun`] before the token arrives, so finalize never
/// sees a run as complete while a range was skipped.
struct Assignment<'a, 'b, 'f, T> {
    range: LineRange,
    failures: &'a Mutex<Vec<SliceFailure>>,
    arrival: Option<Arrival<'b, 'f, T>>,
}

impl<T> Assignment<'_, '_, '_, T> {
    /// Record the worker's outcome, then arrive and wait for finalize
    fn finish(mut self, outcome: Result<()>) {
        if let Err(error) = outcome {
            log::warn!("slice {} failed: {error}", self.range);
            self.failures.lock().push(SliceFailure {
                range: self.range,
                error,
            });
        }
        if let Some(arrival) = self.arrival.take() {
            arrival.arrive();
        }
    }
}

impl<T> Drop for Assignment<'_, '_, '_, T> {
    fn drop(&mut self) {
        if let Some(arrival) = self.arrival.take() {
            self.failures.lock().push(SliceFailure {
                range: self.range,
                error: Error::WorkerNotRun { range: self.range },
            });
            drop(arrival);
        }
    }
}

/// Body of one worker; panics are turned into errors for its range
fn run_worker<L: SliceListener + ?Sized>(
    source: &Source<'_>,
    listener: &L,
    range: LineRange,
) -> Result<()> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
        if let Some(slice) = worker::read_slice(source, range)? {
            listener
                .on_slice(slice)
                .map_err(|source| Error::OutputWrite { range, source })?;
        }
        Ok(())
    }));

    outcome.unwrap_or_else(|payload| {
        Err(Error::WorkerPanicked {
            range,
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

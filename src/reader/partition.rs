//! Line-aligned range partitioner
//!
//! 按行对齐的范围分片器

use crate::config::TerminatorPolicy;
use crate::error::{Error, Result};
use memchr::memchr2;
use std::fmt;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::num::{NonZeroU64, NonZeroUsize};
use std::ops::Range;

/// Scan buffer used while searching for a boundary
const SCAN_BUFFER_SIZE: usize = 8 * 1024;

/// Line-aligned input range
///
/// 按行对齐的输入范围
///
/// Represents a range `[start, end)` of the input file produced by
/// [`partition`]. Every range except possibly the last one ends right after a
/// line terminator, and the ranges of one partition are contiguous and
/// non-overlapping. Ranges can only be created by the partitioner.
///
/// 表示由 [`partition`] 生成的输入文件范围 `[start, end)`。
/// 除最后一个范围外，每个范围都恰好在行终止符之后结束；
/// 同一次分片的范围连续且不重叠。范围只能由分片器创建。
///
/// # Range Format
///
/// Uses half-open interval `[start, end)`; [`last`](Self::last) returns the
/// inclusive offset of the final byte.
///
/// For example: `LineRange { start: 0, end: 6 }` covers bytes 0-5 and `last()` is `Some(5)`
///
/// # 范围格式
///
/// 使用左闭右开区间 `[start, end)`；[`last`](Self::last) 返回最后一个字节的偏移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineRange {
    /// Start position (inclusive)
    ///
    /// 起始位置（包含）
    start: u64,

    /// End position (exclusive)
    ///
    /// 结束位置（不包含）
    end: u64,
}

impl LineRange {
    #[inline]
    pub(crate) fn from_range_unchecked(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Get the start position
    ///
    /// 获取起始位置
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Get the end position (exclusive)
    ///
    /// 获取结束位置（不包含）
    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Offset of the final byte, `None` for an empty range
    ///
    /// 最后一个字节的偏移，空范围返回 `None`
    #[inline]
    pub fn last(&self) -> Option<u64> {
        if self.is_empty() { None } else { Some(self.end - 1) }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn as_range(&self) -> Range<u64> {
        self.start..self.end
    }
}

impl From<LineRange> for Range<u64> {
    #[inline]
    fn from(range: LineRange) -> Self {
        range.as_range()
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Split `len` bytes of `input` into line-aligned ranges
///
/// 将 `input` 的 `len` 字节切分为按行对齐的范围
///
/// Each range is nominally `len / threads` bytes and is extended forward until
/// it ends on a terminator byte or reaches the end of the input. The result is
/// ordered by offset and covers `[0, len)` exactly. It holds fewer ranges than
/// `threads` when lines are long, and can hold a few more when the remainder
/// of `len / threads` leaves room for extra short ranges.
///
/// 每个范围名义大小为 `len / threads` 字节，并向后延伸直到终止符或文件末尾。
/// 结果按偏移排序并恰好覆盖 `[0, len)`。当行很长时范围数少于 `threads`；
/// 当 `len / threads` 的余数足够时可能多出几个较短的范围。
///
/// # Errors
///
/// Any I/O error while seeking or scanning is returned as [`Error::Partition`].
pub fn partition<R: Read + Seek>(
    input: R,
    len: NonZeroU64,
    threads: NonZeroUsize,
    policy: TerminatorPolicy,
) -> Result<Vec<LineRange>> {
    let len = len.get();
    let last = len - 1;
    let nominal = (len / threads.get() as u64).max(1);
    let mut scanner = BufReader::with_capacity(SCAN_BUFFER_SIZE, input);
    let mut ranges = Vec::with_capacity(threads.get());
    let mut start = 0u64;

    while start <= last {
        let candidate = start + nominal - 1;
        let end = if candidate >= last {
            last
        } else {
            boundary_from(&mut scanner, candidate, last, policy).map_err(Error::Partition)?
        };

        let range = LineRange::from_range_unchecked(start, end + 1);
        log::debug!("slice range = {range}");
        ranges.push(range);
        start = end + 1;
    }

    Ok(ranges)
}

/// Offset of the first terminator at or after `from`, clamped to `last`
fn boundary_from<R: Read + Seek>(
    scanner: &mut BufReader<R>,
    from: u64,
    last: u64,
    policy: TerminatorPolicy,
) -> std::io::Result<u64> {
    scanner.seek(SeekFrom::Start(from))?;
    let mut pos = from;

    loop {
        let buf = scanner.fill_buf()?;
        if buf.is_empty() {
            // File shrank under us; the last known byte still closes the range.
            return Ok(last);
        }
        match memchr2(b'\n', b'\r', buf) {
            Some(i) => {
                let found = pos + i as u64;
                let is_cr = buf[i] == b'\r';
                scanner.consume(i + 1);
                if found >= last {
                    return Ok(last);
                }
                if is_cr && policy == TerminatorPolicy::CrLfAware && next_is_lf(scanner)? {
                    return Ok(found + 1);
                }
                return Ok(found);
            }
            None => {
                let n = buf.len();
                scanner.consume(n);
                pos += n as u64;
                if pos > last {
                    return Ok(last);
                }
            }
        }
    }
}

fn next_is_lf<R: Read>(scanner: &mut BufReader<R>) -> std::io::Result<bool> {
    Ok(scanner.fill_buf()?.first() == Some(&b'\n'))
}

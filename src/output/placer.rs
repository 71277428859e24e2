//! Output placement
//!
//! 输出放置

use super::range::OutputRange;
use crate::error::{Error, Result};
use crate::reader::LineRange;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::num::NonZeroU64;
use std::str::FromStr;

/// Where an input range lands in the output file
///
/// 输入范围在输出文件中的位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Placement {
    /// `start` → `file_len - start - size`; lines are written in reverse order
    ///
    /// `start` → `file_len - start - size`；行按逆序写入
    #[default]
    Mirrored,

    /// `start` → `start`; lines are written in input order
    ///
    /// `start` → `start`；行按输入顺序写入
    Identity,
}

impl Placement {
    /// Output offset of an input region of `size` bytes at `start`
    ///
    /// 位于 `start`、大小为 `size` 字节的输入区域对应的输出偏移
    #[inline]
    pub fn offset(&self, start: u64, size: u64, file_len: u64) -> u64 {
        match self {
            Placement::Mirrored => file_len - start - size,
            Placement::Identity => start,
        }
    }

    /// Whether lines of a slice are emitted back to front
    ///
    /// 切片中的行是否从后向前输出
    #[inline]
    pub fn reverses_lines(&self) -> bool {
        matches!(self, Placement::Mirrored)
    }
}

impl FromStr for Placement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mirrored" | "mirror" => Ok(Placement::Mirrored),
            "identity" | "in-place" => Ok(Placement::Identity),
            other => Err(Error::invalid_input(format!("unknown placement `{other}`"))),
        }
    }
}

/// Maps input ranges to non-overlapping output ranges
///
/// 将输入范围映射为不重叠的输出范围
///
/// Both placements are bijections on `[0, file_len)`, so disjoint input ranges
/// map to disjoint output ranges. The placer remembers every input range it
/// has placed and rejects any overlap, which makes each returned
/// [`OutputRange`] exclusively owned by its caller.
///
/// 两种放置方式在 `[0, file_len)` 上都是双射，因此不相交的输入范围映射为不相交的输出范围。
/// 放置器记录所有已放置的输入范围并拒绝重叠，使每个返回的 [`OutputRange`] 由调用者独占。
///
/// # Example
///
/// ```
/// # use ranged_lines::{OutputFile, Placement, Result};
/// # use std::num::NonZeroU64;
/// # fn main() -> Result<()> {
/// # let dir = tempfile::tempdir()?;
/// # let path = dir.path().join("output.txt");
/// let (_file, placer) = OutputFile::create(&path, NonZeroU64::new(6).unwrap(), Placement::Mirrored)?;
/// assert_eq!(placer.placement().offset(0, 2, 6), 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Placer {
    placement: Placement,

    /// Total output size
    ///
    /// 输出总大小
    total_size: NonZeroU64,

    /// Placed input ranges, start → end
    ///
    /// 已放置的输入范围，start → end
    claimed: Mutex<BTreeMap<u64, u64>>,
}

impl Placer {
    #[inline]
    pub(crate) fn new(total_size: NonZeroU64, placement: Placement) -> Self {
        Self {
            placement,
            total_size,
            claimed: Mutex::new(BTreeMap::new()),
        }
    }

    /// Place `range`, claiming its output region
    ///
    /// 放置 `range` 并占用其输出区域
    ///
    /// # Errors
    /// - [`Error::RangeOutOfBounds`] if the range ends past the output size
    /// - [`Error::RangeOverlap`] if it overlaps a range placed earlier
    pub fn place(&self, range: LineRange) -> Result<OutputRange> {
        let total = self.total_size.get();
        if range.end() > total {
            return Err(Error::RangeOutOfBounds { range, file_size: total });
        }

        let start = self.placement.offset(range.start(), range.len(), total);
        let placed = OutputRange::new(range, start, start + range.len());
        if range.is_empty() {
            return Ok(placed);
        }

        let mut claimed = self.claimed.lock();
        let before = claimed.range(..=range.start()).next_back();
        let after = claimed.range(range.start()..).next();
        let overlaps = before.is_some_and(|(_, &end)| end > range.start())
            || after.is_some_and(|(&start, _)| start < range.end());
        if overlaps {
            return Err(Error::RangeOverlap { range });
        }
        claimed.insert(range.start(), range.end());

        Ok(placed)
    }

    #[inline]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    #[inline]
    pub fn total_size(&self) -> NonZeroU64 {
        self.total_size
    }

    /// Bytes not yet covered by a placed range
    ///
    /// 尚未被已放置范围覆盖的字节数
    pub fn remaining(&self) -> u64 {
        let placed: u64 = self.claimed.lock().iter().map(|(start, end)| end - start).sum();
        self.total_size.get() - placed
    }
}

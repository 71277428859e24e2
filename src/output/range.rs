//! Output range and write receipt types
//!
//! 输出范围和写入凭据类型

use crate::reader::LineRange;
use std::ops::Range;

/// Placed output range
///
/// 已放置的输出范围
///
/// Represents the region `[start, end)` of the output file that receives one
/// input [`LineRange`]. This type can only be created through a
/// [`Placer`](super::Placer), which refuses to place overlapping input ranges,
/// so two `OutputRange`s of the same placer never overlap.
///
/// 表示输出文件中接收某个输入 [`LineRange`] 的区域 `[start, end)`。
/// 此类型只能通过 [`Placer`](super::Placer) 创建，它拒绝放置重叠的输入范围，
/// 因此同一放置器产生的 `OutputRange` 互不重叠。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputRange {
    /// Input range this region mirrors
    ///
    /// 此区域对应的输入范围
    source: LineRange,

    start: u64,

    end: u64,
}

impl OutputRange {
    #[inline]
    pub(crate) fn new(source: LineRange, start: u64, end: u64) -> Self {
        debug_assert_eq!(end - start, source.len());
        Self { source, start, end }
    }

    #[inline]
    pub fn source(&self) -> LineRange {
        self.source
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.end
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

impl From<OutputRange> for Range<u64> {
    #[inline]
    fn from(range: OutputRange) -> Self {
        range.as_range()
    }
}

/// Write receipt
///
/// 写入凭据
///
/// Proof that an [`OutputRange`] has been fully written; required to flush it.
///
/// 证明某个 [`OutputRange`] 已被完整写入；刷新该范围时需要此凭据。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriteReceipt {
    range: OutputRange,
}

impl WriteReceipt {
    #[inline]
    pub(crate) fn new(range: OutputRange) -> Self {
        Self { range }
    }

    #[inline]
    pub fn range(&self) -> OutputRange {
        self.range
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.range.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

//! Type-safe output file
//!
//! 类型安全的输出文件

use super::output_file_inner::OutputFileInner;
use super::placer::{Placement, Placer};
use super::range::{OutputRange, WriteReceipt};
use crate::error::{Error, Result};
use std::fs::File;
use std::num::NonZeroU64;
use std::path::Path;

/// Type-safe memory-mapped output file
///
/// 类型安全的内存映射输出文件
///
/// Writes go through [`OutputRange`]s minted by the paired [`Placer`], so
/// concurrent writers can never touch the same bytes.
///
/// 写入通过配对的 [`Placer`] 生成的 [`OutputRange`] 进行，
/// 因此并发写入者不会触及相同的字节。
///
/// # Examples
///
/// ```
/// # use ranged_lines::{OutputFile, Placement, Result};
/// # use std::num::NonZeroU64;
/// # fn main() -> Result<()> {
/// # let dir = tempfile::tempdir()?;
/// # let path = dir.path().join("output.txt");
/// let (file, placer) = OutputFile::create(&path, NonZeroU64::new(6).unwrap(), Placement::Identity)?;
/// assert_eq!(file.size().get(), 6);
/// assert_eq!(placer.remaining(), 6);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OutputFile {
    inner: OutputFileInner,
}

impl OutputFile {
    /// Create the output at `path` with `size` bytes and its placer
    ///
    /// 在 `path` 创建 `size` 字节的输出文件及其放置器
    pub fn create(
        path: impl AsRef<Path>,
        size: NonZeroU64,
        placement: Placement,
    ) -> Result<(Self, Placer)> {
        let inner = OutputFileInner::create(path, size)?;
        Ok((Self { inner }, Placer::new(size, placement)))
    }

    /// Use an already opened read-write file as the output
    ///
    /// 使用已打开的读写文件作为输出
    pub fn from_file(
        file: &File,
        size: NonZeroU64,
        placement: Placement,
    ) -> Result<(Self, Placer)> {
        let inner = OutputFileInner::from_file(file, size)?;
        Ok((Self { inner }, Placer::new(size, placement)))
    }

    /// Write `data` to a placed range; `data` must fill it exactly
    ///
    /// 向已放置的范围写入 `data`；`data` 必须恰好填满该范围
    ///
    /// # Errors
    /// [`Error::DataLengthMismatch`] if `data.len()` differs from the range length
    #[inline]
    pub fn write_range(&self, range: OutputRange, data: &[u8]) -> Result<WriteReceipt> {
        if data.len() as u64 != range.len() {
            return Err(Error::DataLengthMismatch {
                data_len: data.len(),
                range_len: range.len(),
            });
        }

        // Safety: ranges minted by one Placer never overlap.
        unsafe { self.inner.write_at(range.start(), data)?; }

        Ok(WriteReceipt::new(range))
    }

    /// Read a placed range into `buf`
    ///
    /// 将已放置的范围读入 `buf`
    pub fn read_range(&self, range: OutputRange, buf: &mut [u8]) -> Result<usize> {
        let len = range.len() as usize;

        if buf.len() < len {
            return Err(Error::BufferTooSmall {
                buffer_len: buf.len(),
                range_len: range.len(),
            });
        }

        // Safety: the range is owned by the caller, nobody else writes it.
        unsafe { self.inner.read_at(range.start(), &mut buf[..len]) }
    }

    /// Durably flush a written range
    ///
    /// 将已写入的范围持久化刷新
    pub fn flush_range(&self, receipt: WriteReceipt) -> Result<()> {
        let range = receipt.range();
        // Safety: the receipt proves the write to this range has finished.
        unsafe { self.inner.flush_range(range.start(), range.len() as usize) }
    }

    /// Durably flush the whole file
    ///
    /// 将整个文件持久化刷新
    ///
    /// # Safety
    ///
    /// Callers must ensure no writes are in progress.
    ///
    /// 调用者需确保没有正在进行的写入。
    pub unsafe fn sync_all(&self) -> Result<()> {
        unsafe { self.inner.sync_all() }
    }

    #[inline]
    pub fn size(&self) -> NonZeroU64 {
        self.inner.size()
    }
}

impl std::fmt::Debug for OutputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputFile")
            .field("inner", &self.inner)
            .finish()
    }
}

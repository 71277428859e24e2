//! Unsafe lock-free output file based on memmap2
//!
//! 基于 memmap2 的 Unsafe 无锁输出文件

use crate::error::{Error, Result};
use memmap2::MmapMut;
use std::cell::UnsafeCell;
use std::fs::{File, OpenOptions};
use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;

/// Memory-mapped output file (Unsafe lock-free version)
///
/// 基于内存映射的输出文件（Unsafe 无锁版本）
///
/// ⚠️ **Warning**: Users must ensure that concurrent writes do not overlap.
/// [`OutputFile`](super::OutputFile) + [`Placer`](super::Placer) enforce this
/// for slices of one partition.
///
/// ⚠️ **警告**：用户需自行保证并发写入的范围不重叠。
/// [`OutputFile`](super::OutputFile) + [`Placer`](super::Placer) 为同一次分片的切片保证这一点。
///
/// # Features
///
/// - **Zero-copy writes**: slices are copied straight into mapped memory
/// - **Lock-free concurrency**: workers write their own regions without locking
/// - **Reference counting**: cloned and shared among workers
///
/// # 特性
///
/// - **零拷贝写入**：切片直接复制到映射内存
/// - **无锁并发**：worker 写入各自区域无需加锁
/// - **引用计数**：可克隆并在 worker 间共享
#[derive(Clone)]
pub struct OutputFileInner {
    /// Shared memory map
    ///
    /// 共享的内存映射
    mmap: Arc<UnsafeCell<MmapMut>>,

    /// File size
    ///
    /// 文件大小
    size: NonZeroU64,
}

impl OutputFileInner {
    /// Create (or truncate) the file at `path` and map `size` bytes of it
    ///
    /// 创建（或截断）`path` 处的文件并映射 `size` 字节
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, resized or mapped
    ///
    /// # 错误
    /// 如果无法创建、调整大小或映射文件，返回错误
    pub fn create(path: impl AsRef<Path>, size: NonZeroU64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        Self::from_file(&file, size)
    }

    /// Resize an already opened read-write file to `size` and map it
    ///
    /// 将已打开的读写文件调整为 `size` 并映射
    pub fn from_file(file: &File, size: NonZeroU64) -> Result<Self> {
        file.set_len(size.get())?;

        // Safety: the mapping is only written through ranges handed out by a Placer.
        let mmap = unsafe { MmapMut::map_mut(file)? };

        Ok(Self {
            #[allow(clippy::arc_with_non_send_sync)]
            mmap: Arc::new(UnsafeCell::new(mmap)),
            size,
        })
    }

    /// Write data at the given offset
    ///
    /// 在指定位置写入数据
    ///
    /// # Safety
    ///
    /// Concurrent calls must not write to overlapping regions.
    ///
    /// 并发调用不能写入重叠的区域。
    #[inline]
    pub unsafe fn write_at(&self, offset: u64, data: &[u8]) -> Result<usize> {
        let len = data.len();
        let end = offset.saturating_add(len as u64);

        if end > self.size.get() {
            return Err(Error::WriteExceedsFileSize {
                offset,
                len,
                file_size: self.size.get(),
            });
        }

        let offset = offset as usize;
        unsafe {
            let mmap = &mut *self.mmap.get();
            mmap[offset..offset + len].copy_from_slice(data);
        }

        Ok(len)
    }

    /// Read data at the given offset; returns the number of bytes read
    ///
    /// 从指定位置读取数据；返回读取的字节数
    ///
    /// # Safety
    ///
    /// No concurrent write may touch the region being read.
    ///
    /// 不能有并发写入与读取区域重叠。
    pub unsafe fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.size.get() {
            return Ok(0);
        }

        let available = (self.size.get() - offset).min(buf.len() as u64) as usize;
        let offset = offset as usize;

        unsafe {
            let mmap = &*self.mmap.get();
            buf[..available].copy_from_slice(&mmap[offset..offset + available]);
        }

        Ok(available)
    }

    /// Synchronously flush one region to disk
    ///
    /// 同步将一个区域刷新到磁盘
    ///
    /// # Safety
    ///
    /// Must not race with writes to the same region.
    pub unsafe fn flush_range(&self, offset: u64, len: usize) -> Result<()> {
        if offset.saturating_add(len as u64) > self.size.get() {
            return Err(Error::WriteExceedsFileSize {
                offset,
                len,
                file_size: self.size.get(),
            });
        }
        if len == 0 {
            return Ok(());
        }

        unsafe {
            let mmap = &*self.mmap.get();
            Ok(mmap.flush_range(offset as usize, len)?)
        }
    }

    /// Synchronously flush the whole mapping to disk
    ///
    /// 同步将整个映射刷新到磁盘
    ///
    /// # Safety
    ///
    /// Callers must ensure no writes are in progress.
    ///
    /// 调用者需确保没有正在进行的写入。
    pub unsafe fn sync_all(&self) -> Result<()> {
        unsafe {
            let mmap = &*self.mmap.get();
            Ok(mmap.flush()?)
        }
    }

    #[inline]
    pub fn size(&self) -> NonZeroU64 {
        self.size
    }
}

impl std::fmt::Debug for OutputFileInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputFileInner")
            .field("size", &self.size)
            .field("mmap", &"MmapMut")
            .finish()
    }
}

// Safety: concurrent access is restricted to non-overlapping regions by the
// unsafe contracts above.
unsafe impl Send for OutputFileInner {}
unsafe impl Sync for OutputFileInner {}

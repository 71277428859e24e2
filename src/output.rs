//! Memory-mapped output sink based on memmap2
//!
//! 基于 memmap2 的内存映射输出
//!
//! Provides two implementations:
//! - [`OutputFileInner`]: unsafe version, users must ensure writes do not overlap
//! - [`OutputFile`]: safe version, writes only through [`OutputRange`]s minted by a [`Placer`]
//!
//! 提供两种实现：
//! - [`OutputFileInner`]: unsafe 版本，用户需自行保证写入不重叠
//! - [`OutputFile`]: 安全版本，只能通过 [`Placer`] 生成的 [`OutputRange`] 写入
//!
//! Every slice worker places its input range, writes the transformed bytes
//! into the placed region and flushes it, all without locking: the placer
//! proves the regions disjoint.
//!
//! 每个切片 worker 放置其输入范围，将转换后的字节写入对应区域并刷新，
//! 全程无需加锁：放置器保证各区域互不相交。
//!
//! ```
//! # use ranged_lines::{OutputFile, Placement, Result};
//! # use std::num::NonZeroU64;
//! # fn main() -> Result<()> {
//! # let dir = tempfile::tempdir()?;
//! # let path = dir.path().join("output.txt");
//! use ranged_lines::{LineReader, Config};
//! # std::fs::write(dir.path().join("in.txt"), b"ab\ncd\n")?;
//! let ranges = LineReader::new(dir.path().join("in.txt"), Config::default().threads(2))?.ranges()?;
//!
//! let (file, placer) = OutputFile::create(&path, NonZeroU64::new(6).unwrap(), Placement::Mirrored)?;
//!
//! std::thread::scope(|s| {
//!     for range in &ranges {
//!         let (file, placer) = (&file, &placer);
//!         s.spawn(move || -> Result<()> {
//!             let out = placer.place(*range)?;
//!             let receipt = file.write_range(out, &vec![b'x'; out.len() as usize])?;
//!             file.flush_range(receipt)
//!         });
//!     }
//! });
//! assert_eq!(std::fs::read(&path)?, b"xxxxxx");
//! # Ok(())
//! # }
//! ```

mod output_file;
mod output_file_inner;
mod placer;
mod range;


pub use output_file::OutputFile;
pub use output_file_inner::OutputFileInner;
pub use placer::{Placement, Placer};
pub use range::{OutputRange, WriteReceipt};

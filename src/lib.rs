//! Parallel line-aligned file transformation
//!
//! 并行按行对齐的文件转换库
//!
//! This library splits a large text file into line-aligned byte ranges, decodes
//! each range on its own worker thread and writes a transformed version of
//! every range into a memory-mapped output, without locks between workers.
//!
//! 本库将大型文本文件切分为按行对齐的字节范围，在各自的 worker 线程上解码，
//! 并将每个范围的转换结果写入内存映射输出，worker 之间无需加锁。
//!
//! # Features
//!
//! - **Line-aligned partitioning**: ranges never split a line
//! - **Windowed reads**: each worker maps or reads its range in bounded windows
//! - **Exactly-once finalize**: a [`CompletionBarrier`] runs the end step after the last worker
//! - **Disjoint writes**: a [`Placer`] proves output regions never overlap
//! - **Atomic replacement**: the input can be replaced only after every slice was written
//!
//! # 特性
//!
//! - **按行对齐分片**：范围不会切断任何一行
//! - **窗口化读取**：每个 worker 以有界窗口映射或读取其范围
//! - **恰好一次收尾**：[`CompletionBarrier`] 在最后一个 worker 之后执行收尾
//! - **不相交写入**：[`Placer`] 保证输出区域互不重叠
//! - **原子替换**：只有所有切片写入成功后才会替换输入
//!
//! # Quick Start
//!
//! ## Reverse a file
//!
//! ## 反转文件
//!
//! ```
//! use ranged_lines::{reverse_file, Config, OutputTarget, Result};
//! # fn main() -> Result<()> {
//! # let dir = tempfile::tempdir()?;
//! # let input = dir.path().join("input.txt");
//! # let output = dir.path().join("output.txt");
//! std::fs::write(&input, "hello\nworld\n")?;
//!
//! let summary = reverse_file(&input, OutputTarget::File(output.clone()), Config::default().threads(4))?;
//!
//! assert!(summary.is_complete());
//! assert_eq!(std::fs::read_to_string(&output)?, "\ndlrow\nolleh");
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom listener
//!
//! ## 自定义监听器
//!
//! Implement [`SliceListener`] to receive decoded slices directly; see the
//! [`reader`] module.
//!
//! 实现 [`SliceListener`] 直接接收解码后的切片；参见 [`reader`] 模块。
//!
//! # Main Types
//!
//! - [`LineReader`]: Partitions the input and drives the workers
//! - [`SliceListener`]: Receives slices and the end-of-run [`Summary`]
//! - [`SliceWriter`]: Listener that writes transformed slices to an [`OutputFile`]
//! - [`LineTransform`]: Per-line transform ([`CharReverse`], [`XorSwap`])
//! - [`OutputFile`]: Type-safe memory-mapped output
//!
//! # 主要类型
//!
//! - [`LineReader`]: 切分输入并驱动 worker
//! - [`SliceListener`]: 接收切片和运行结束时的 [`Summary`]
//! - [`SliceWriter`]: 将转换后的切片写入 [`OutputFile`] 的监听器
//! - [`LineTransform`]: 逐行转换（[`CharReverse`]、[`XorSwap`]）
//! - [`OutputFile`]: 类型安全的内存映射输出

mod config;
mod error;
pub mod output;
pub mod reader;
mod transform;
mod writer;

pub use config::{Config, DEFAULT_BUFFER_SIZE, DEFAULT_ENCODING, ReadMode, TerminatorPolicy};
pub use error::{Error, Result};
pub use output::{OutputFile, OutputFileInner, OutputRange, Placement, Placer, WriteReceipt};
pub use reader::{
    Arrival, BarrierState, CompletionBarrier, Line, LineCounter, LineRange, LineReader, Slice,
    SliceFailure, SliceListener, Summary, Terminator, partition,
};
pub use transform::{CharReverse, LineTransform, TransformKind, XorSwap};
pub use writer::{OutputTarget, SliceWriter, reverse_file, transform_file};

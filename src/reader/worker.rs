//! Slice worker: read one range window by window and decode it
//!
//! 切片 worker：逐窗口读取一个范围并解码

use super::LineCounter;
use super::partition::LineRange;
use super::slice::{LineDecoder, Slice};
use crate::config::{ReadMode, Settings};
use crate::error::{Error, Result};
use memmap2::MmapOptions;
use parking_lot::RwLock;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Shared, read-only view of the input used by every worker
pub(crate) struct Source<'a> {
    pub(crate) path: &'a Path,
    /// Handle shared by mapped reads; closed at finalize
    pub(crate) file: &'a RwLock<Option<File>>,
    pub(crate) settings: &'a Settings,
    pub(crate) counter: &'a LineCounter,
}

/// Decode `range` into a [`Slice`]; `None` for an empty range
///
/// 将 `range` 解码为 [`Slice`]；空范围返回 `None`
pub(crate) fn read_slice(source: &Source<'_>, range: LineRange) -> Result<Option<Slice>> {
    if range.is_empty() {
        return Ok(None);
    }

    let settings = source.settings;
    let mut decoder =
        LineDecoder::new(range.start(), settings.encoding, settings.terminators, source.counter);
    let window = settings.window_for(range.len());

    match settings.read_mode {
        ReadMode::Mapped => read_mapped(source, range, window, &mut decoder)?,
        ReadMode::Buffered => read_buffered(source, range, window, &mut decoder)?,
    }

    Ok(Some(Slice::new(range, decoder.finish()?)))
}

fn read_mapped(
    source: &Source<'_>,
    range: LineRange,
    window: u64,
    decoder: &mut LineDecoder<'_>,
) -> Result<()> {
    let read_error = |source: io::Error| Error::Read { range, source };
    let mut offset = range.start();

    while offset < range.end() {
        let len = window.min(range.end() - offset);
        let map = {
            let guard = source.file.read();
            let file = guard.as_ref().ok_or_else(|| {
                read_error(io::Error::new(io::ErrorKind::NotConnected, "input already closed"))
            })?;
            // Safety: the input is opened read-only and each worker maps only its own range.
            unsafe { MmapOptions::new().offset(offset).len(len as usize).map(file) }
                .map_err(read_error)?
        };
        decoder.feed(&map)?;
        offset += len;
    }

    Ok(())
}

fn read_buffered(
    source: &Source<'_>,
    range: LineRange,
    window: u64,
    decoder: &mut LineDecoder<'_>,
) -> Result<()> {
    let read_error = |source: io::Error| Error::Read { range, source };

    let mut file = File::open(source.path).map_err(read_error)?;
    file.seek(SeekFrom::Start(range.start())).map_err(read_error)?;
    let mut reader = file.take(range.len());
    let mut buf = vec![0u8; window as usize];
    let mut remaining = range.len();

    while remaining > 0 {
        let len = window.min(remaining) as usize;
        reader.read_exact(&mut buf[..len]).map_err(read_error)?;
        decoder.feed(&buf[..len])?;
        remaining -= len as u64;
    }

    Ok(())
}

//! Decoded slices and the incremental line decoder
//!
//! 解码后的切片与增量行解码器

use super::LineCounter;
use super::partition::LineRange;
use crate::config::TerminatorPolicy;
use crate::error::{Error, Result};
use encoding_rs::Encoding;
use memchr::memchr2;
use std::mem;

/// Line terminator as it appeared in the input
///
/// 输入中出现的行终止符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminator {
    /// `\n`
    Lf,
    /// `\r`
    Cr,
    /// `\r\n`, only produced under [`TerminatorPolicy::CrLfAware`]
    CrLf,
}

impl Terminator {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Terminator::Lf => "\n",
            Terminator::Cr => "\r",
            Terminator::CrLf => "\r\n",
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// Number of input bytes this terminator occupies
    ///
    /// 此终止符在输入中占用的字节数
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.as_bytes().len()
    }
}

/// One entry of a slice: decoded line content or a terminator marker
///
/// 切片中的一项：解码后的行内容或终止符标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Decoded content without its terminator (may be empty)
    ///
    /// 不含终止符的解码内容（可能为空）
    Text(String),

    /// Terminator that followed the previous text entry
    ///
    /// 紧随前一个文本项的终止符
    Terminator(Terminator),
}

impl Line {
    pub const LF: Line = Line::Terminator(Terminator::Lf);
    pub const CR: Line = Line::Terminator(Terminator::Cr);
    pub const CRLF: Line = Line::Terminator(Terminator::CrLf);

    pub fn text(content: impl Into<String>) -> Self {
        Line::Text(content.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Line::Text(text) => text,
            Line::Terminator(t) => t.as_str(),
        }
    }

    #[inline]
    pub fn is_terminator(&self) -> bool {
        matches!(self, Line::Terminator(_))
    }
}

/// Decoded content of one [`LineRange`]
///
/// 一个 [`LineRange`] 解码后的内容
///
/// `lines` keeps input order, with a [`Line::Terminator`] after every
/// terminated line, so writing all entries back out reproduces the range's
/// byte length for length-preserving encodings.
///
/// `lines` 保持输入顺序，每个已终止的行后都跟有一个 [`Line::Terminator`]，
/// 因此对保持长度的编码，按序写回所有项可还原该范围的字节长度。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    range: LineRange,
    lines: Vec<Line>,
}

impl Slice {
    pub(crate) fn new(range: LineRange, lines: Vec<Line>) -> Self {
        Self { range, lines }
    }

    /// Input range this slice was decoded from
    ///
    /// 此切片对应的输入范围
    #[inline]
    pub fn range(&self) -> LineRange {
        self.range
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.range.start()
    }

    /// Size of the input range in bytes
    ///
    /// 输入范围的字节数
    #[inline]
    pub fn size(&self) -> u64 {
        self.range.len()
    }

    #[inline]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<Line> {
        self.lines
    }

    /// Number of decoded text lines (terminator markers excluded)
    ///
    /// 解码的文本行数（不含终止符标记）
    pub fn line_count(&self) -> usize {
        self.lines.iter().filter(|l| !l.is_terminator()).count()
    }
}

/// Turns a stream of byte windows into [`Line`] entries
///
/// 将字节窗口流转换为 [`Line`] 项
///
/// Lines may span windows; bytes are accumulated until a terminator arrives.
pub(crate) struct LineDecoder<'c> {
    encoding: &'static Encoding,
    policy: TerminatorPolicy,
    counter: &'c LineCounter,
    pending: Vec<u8>,
    /// Absolute offset of the first pending byte
    line_start: u64,
    /// Absolute offset of the next byte to be fed
    position: u64,
    after_cr: bool,
    lines: Vec<Line>,
}

impl<'c> LineDecoder<'c> {
    pub(crate) fn new(
        start: u64,
        encoding: &'static Encoding,
        policy: TerminatorPolicy,
        counter: &'c LineCounter,
    ) -> Self {
        Self {
            encoding,
            policy,
            counter,
            pending: Vec::new(),
            line_start: start,
            position: start,
            after_cr: false,
            lines: Vec::new(),
        }
    }

    /// Feed the next window of the range
    pub(crate) fn feed(&mut self, mut window: &[u8]) -> Result<()> {
        while !window.is_empty() {
            match memchr2(b'\n', b'\r', window) {
                Some(i) => {
                    self.push_content(&window[..i]);
                    self.terminate(window[i])?;
                    window = &window[i + 1..];
                }
                None => {
                    self.push_content(window);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Flush an unterminated tail and hand back the entries
    pub(crate) fn finish(mut self) -> Result<Vec<Line>> {
        if !self.pending.is_empty() {
            self.flush_line()?;
        }
        Ok(self.lines)
    }

    fn push_content(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.after_cr = false;
        self.pending.extend_from_slice(bytes);
        self.position += bytes.len() as u64;
    }

    fn terminate(&mut self, byte: u8) -> Result<()> {
        self.position += 1;

        if byte == b'\n' && self.after_cr && self.policy == TerminatorPolicy::CrLfAware {
            if let Some(last) = self.lines.last_mut() {
                *last = Line::CRLF;
            }
            self.after_cr = false;
            self.line_start = self.position;
            return Ok(());
        }

        self.flush_line()?;
        let (marker, after_cr) = match byte {
            b'\r' => (Line::CR, true),
            _ => (Line::LF, false),
        };
        self.lines.push(marker);
        self.after_cr = after_cr;
        self.line_start = self.position;
        Ok(())
    }

    fn flush_line(&mut self) -> Result<()> {
        let bytes = mem::take(&mut self.pending);
        let text = self
            .encoding
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .ok_or(Error::Decode {
                offset: self.line_start,
                encoding: self.encoding.name(),
            })?
            .into_owned();
        self.counter.increment();
        self.lines.push(Line::Text(text));
        // Reuse the allocation for the next line.
        self.pending = bytes;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(windows: &[&[u8]], policy: TerminatorPolicy) -> (Vec<Line>, u64) {
        let counter = LineCounter::new();
        let mut decoder = LineDecoder::new(0, encoding_rs::UTF_8, policy, &counter);
        for window in windows {
            decoder.feed(window).unwrap();
        }
        let lines = decoder.finish().unwrap();
        (lines, counter.get())
    }

    #[test]
    fn test_two_terminated_lines() {
        let (lines, count) = decode(&[b"ab\ncd\n"], TerminatorPolicy::Bytewise);
        assert_eq!(
            lines,
            vec![Line::text("ab"), Line::LF, Line::text("cd"), Line::LF]
        );
        assert_eq!(count, 2);
    }

    #[test]
    fn test_unterminated_tail_has_no_marker() {
        let (lines, count) = decode(&[b"ab\ncd"], TerminatorPolicy::Bytewise);
        assert_eq!(lines, vec![Line::text("ab"), Line::LF, Line::text("cd")]);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_line_spanning_windows() {
        let (lines, _) = decode(&[b"hel", b"lo\nwor", b"ld"], TerminatorPolicy::Bytewise);
        assert_eq!(
            lines,
            vec![Line::text("hello"), Line::LF, Line::text("world")]
        );
    }

    #[test]
    fn test_consecutive_terminators_yield_empty_lines() {
        let (lines, count) = decode(&[b"a\n\nb"], TerminatorPolicy::Bytewise);
        assert_eq!(
            lines,
            vec![Line::text("a"), Line::LF, Line::text(""), Line::LF, Line::text("b")]
        );
        assert_eq!(count, 3);
    }

    #[test]
    fn test_bytewise_crlf_is_two_terminators() {
        let (lines, count) = decode(&[b"a\r\nb"], TerminatorPolicy::Bytewise);
        assert_eq!(
            lines,
            vec![Line::text("a"), Line::CR, Line::text(""), Line::LF, Line::text("b")]
        );
        assert_eq!(count, 3);
    }

    #[test]
    fn test_crlf_aware_merges_pair() {
        let (lines, count) = decode(&[b"a\r\nb\rc\n"], TerminatorPolicy::CrLfAware);
        assert_eq!(
            lines,
            vec![
                Line::text("a"),
                Line::CRLF,
                Line::text("b"),
                Line::CR,
                Line::text("c"),
                Line::LF,
            ]
        );
        assert_eq!(count, 3);
    }

    #[test]
    fn test_crlf_aware_pair_split_across_windows() {
        let (lines, _) = decode(&[b"a\r", b"\nb"], TerminatorPolicy::CrLfAware);
        assert_eq!(lines, vec![Line::text("a"), Line::CRLF, Line::text("b")]);
    }

    #[test]
    fn test_crlf_aware_cr_then_content_then_lf() {
        let (lines, _) = decode(&[b"a\rb\n"], TerminatorPolicy::CrLfAware);
        assert_eq!(
            lines,
            vec![Line::text("a"), Line::CR, Line::text("b"), Line::LF]
        );
    }

    #[test]
    fn test_multibyte_character_split_across_windows() {
        let bytes = "héllo\n".as_bytes();
        let (lines, _) = decode(&[&bytes[..2], &bytes[2..]], TerminatorPolicy::Bytewise);
        assert_eq!(lines, vec![Line::text("héllo"), Line::LF]);
    }

    #[test]
    fn test_invalid_utf8_reports_line_offset() {
        let counter = LineCounter::new();
        let mut decoder =
            LineDecoder::new(100, encoding_rs::UTF_8, TerminatorPolicy::Bytewise, &counter);
        decoder.feed(b"ok\n").unwrap();
        let err = decoder.feed(b"\xff\xfe\n").unwrap_err();

        match err {
            Error::Decode { offset, encoding } => {
                assert_eq!(offset, 103);
                assert_eq!(encoding, "UTF-8");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn test_single_byte_encoding() {
        let counter = LineCounter::new();
        let mut decoder = LineDecoder::new(
            0,
            encoding_rs::WINDOWS_1252,
            TerminatorPolicy::Bytewise,
            &counter,
        );
        decoder.feed(b"caf\xe9\n").unwrap();
        let lines = decoder.finish().unwrap();
        assert_eq!(lines, vec![Line::text("café"), Line::LF]);
    }

    #[test]
    fn test_slice_accessors() {
        let range = LineRange::from_range_unchecked(10, 16);
        let slice = Slice::new(
            range,
            vec![Line::text("ab"), Line::LF, Line::text("cd"), Line::LF],
        );
        assert_eq!(slice.start(), 10);
        assert_eq!(slice.size(), 6);
        assert_eq!(slice.line_count(), 2);
        assert_eq!(slice.lines()[1].as_str(), "\n");
    }
}

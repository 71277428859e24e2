//! Per-line transform strategies
//!
//! 逐行转换策略

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Pure `line -> line` transform applied to every text line of a slice
///
/// 应用于切片中每个文本行的纯函数 `line -> line`
///
/// Implementations must return empty and single-character input unchanged.
/// Closures of the form `Fn(&str) -> String` implement this trait.
///
/// 实现必须原样返回空字符串和单字符输入。`Fn(&str) -> String` 形式的闭包也实现了此 trait。
pub trait LineTransform: Send + Sync {
    fn apply(&self, line: &str) -> String;
}

impl<F> LineTransform for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    #[inline]
    fn apply(&self, line: &str) -> String {
        self(line)
    }
}

/// Reverses the characters of a line
///
/// 反转一行中的字符
#[derive(Debug, Clone, Copy, Default)]
pub struct CharReverse;

impl LineTransform for CharReverse {
    fn apply(&self, line: &str) -> String {
        if line.chars().nth(1).is_none() {
            return line.to_string();
        }
        line.chars().rev().collect()
    }
}

/// Reverses a line by XOR-swapping scalar values from both ends inward
///
/// 从两端向内通过异或交换标量值来反转一行
#[derive(Debug, Clone, Copy, Default)]
pub struct XorSwap;

impl LineTransform for XorSwap {
    fn apply(&self, line: &str) -> String {
        let mut scalars: Vec<u32> = line.chars().map(u32::from).collect();
        if scalars.len() <= 1 {
            return line.to_string();
        }

        let (mut begin, mut end) = (0, scalars.len() - 1);
        while begin < end {
            scalars[begin] ^= scalars[end];
            scalars[end] ^= scalars[begin];
            scalars[begin] ^= scalars[end];
            begin += 1;
            end -= 1;
        }

        // A full swap only permutes values that were valid chars.
        scalars.into_iter().filter_map(char::from_u32).collect()
    }
}

/// Built-in transform selected by name
///
/// 按名称选择的内置转换
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TransformKind {
    /// [`CharReverse`]
    #[default]
    Reverse,
    /// [`XorSwap`]
    Xor,
}

impl TransformKind {
    pub fn build(self) -> Box<dyn LineTransform> {
        match self {
            TransformKind::Reverse => Box::new(CharReverse),
            TransformKind::Xor => Box::new(XorSwap),
        }
    }
}

impl FromStr for TransformKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reverse" | "stringbuilder" => Ok(TransformKind::Reverse),
            "xor" => Ok(TransformKind::Xor),
            other => Err(Error::invalid_input(format!("unknown transform `{other}`"))),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransformKind::Reverse => "reverse",
            TransformKind::Xor => "xor",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_basic() {
        assert_eq!(CharReverse.apply("ab"), "ba");
        assert_eq!(CharReverse.apply("héllo wörld"), "dlröw olléh");
    }

    #[test]
    fn test_short_input_unchanged() {
        for t in [TransformKind::Reverse.build(), TransformKind::Xor.build()] {
            assert_eq!(t.apply(""), "");
            assert_eq!(t.apply("x"), "x");
            assert_eq!(t.apply("é"), "é");
        }
    }

    #[test]
    fn test_xor_matches_reverse() {
        for line in ["ab", "abc", "racecar!", "日本語テキスト", "a\u{1F600}b"] {
            assert_eq!(XorSwap.apply(line), CharReverse.apply(line));
        }
    }

    #[test]
    fn test_reverse_round_trip() {
        let line = "the quick brown fox";
        assert_eq!(CharReverse.apply(&CharReverse.apply(line)), line);
    }

    #[test]
    fn test_xor_parity() {
        let line = "parity check";
        let mut current = line.to_string();
        for round in 1..=6 {
            current = XorSwap.apply(&current);
            if round % 2 == 0 {
                assert_eq!(current, line, "even round {round}");
            } else {
                assert_ne!(current, line, "odd round {round}");
            }
        }
    }

    #[test]
    fn test_byte_length_preserved() {
        let line = "ünïcödé and ascii";
        assert_eq!(CharReverse.apply(line).len(), line.len());
        assert_eq!(XorSwap.apply(line).len(), line.len());
    }

    #[test]
    fn test_closure_transform() {
        let upper = |line: &str| line.to_ascii_uppercase();
        assert_eq!(upper.apply("abc"), "ABC");
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("reverse".parse::<TransformKind>().unwrap(), TransformKind::Reverse);
        assert_eq!("XOR".parse::<TransformKind>().unwrap(), TransformKind::Xor);
        assert!("rot13".parse::<TransformKind>().is_err());
        assert_eq!(TransformKind::Xor.to_string(), "xor");
    }
}

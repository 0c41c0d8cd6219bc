// WDB - Watch-display Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::{fmt, str::FromStr};

use eyre::{bail, Error, Result};
use serde::{Deserialize, Serialize};

/// Display format selector, written as a single letter after a `/`.
///
/// Only [`DisplayFormat::Instruction`] is an examine format: the displayed value is
/// taken as an address and a number of items are dumped from there. Every other
/// format prints the value once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DisplayFormat {
    /// Natural format of the value (no letter)
    #[default]
    Natural,
    /// Hexadecimal (`x`)
    Hex,
    /// Signed decimal (`d`)
    Decimal,
    /// Unsigned decimal (`u`)
    Unsigned,
    /// Character (`c`)
    Char,
    /// Zero-terminated string (`s`)
    String,
    /// Byte (`b`)
    Byte,
    /// 16-bit word (`w`)
    Word,
    /// 64-bit giant word (`g`)
    Giant,
    /// Machine instruction (`i`)
    Instruction,
}

impl DisplayFormat {
    /// Map a format letter to its format
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'x' => Self::Hex,
            'd' => Self::Decimal,
            'u' => Self::Unsigned,
            'c' => Self::Char,
            's' => Self::String,
            'b' => Self::Byte,
            'w' => Self::Word,
            'g' => Self::Giant,
            'i' => Self::Instruction,
            _ => return None,
        })
    }

    /// Format letter, `None` for the natural format
    pub fn as_char(self) -> Option<char> {
        match self {
            Self::Natural => None,
            Self::Hex => Some('x'),
            Self::Decimal => Some('d'),
            Self::Unsigned => Some('u'),
            Self::Char => Some('c'),
            Self::String => Some('s'),
            Self::Byte => Some('b'),
            Self::Word => Some('w'),
            Self::Giant => Some('g'),
            Self::Instruction => Some('i'),
        }
    }

    /// Whether values in this format are dumped through the memory examiner
    pub fn is_examine(self) -> bool {
        matches!(self, Self::Instruction)
    }
}

impl fmt::Display for DisplayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_char() {
            Some(c) => write!(f, "{c}"),
            None => f.write_str("natural"),
        }
    }
}

impl FromStr for DisplayFormat {
    type Err = Error;

    /// Parses a single format letter, or `natural` (also the empty string).
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "natural" {
            return Ok(Self::Natural);
        }

        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => match Self::from_char(c) {
                Some(format) => Ok(format),
                None => bail!("Unknown display format '{c}'"),
            },
            _ => bail!("Display format must be a single letter, got: {s}"),
        }
    }
}

impl TryFrom<String> for DisplayFormat {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DisplayFormat> for String {
    fn from(format: DisplayFormat) -> Self {
        format.to_string()
    }
}

/// A `/[count][letter]` format specification as typed after `display` or `print`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    /// Number of items to dump for examine formats
    pub count: usize,
    /// Selected format
    pub format: DisplayFormat,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self { count: 1, format: DisplayFormat::Natural }
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        if self.count != 1 {
            write!(f, "{}", self.count)?;
        }
        if let Some(c) = self.format.as_char() {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for FormatSpec {
    type Err = Error;

    /// Parses a format specification.
    /// Format: `/[count][letter]`
    /// Examples:
    /// - `/x` - hexadecimal, count 1
    /// - `/4i` - four instructions
    /// - `/3` - natural format, count 3
    fn from_str(s: &str) -> Result<Self> {
        let Some(body) = s.trim().strip_prefix('/') else {
            bail!("Format specification must start with '/', got: {s}");
        };

        let digits_end = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
        let (digits, letter) = body.split_at(digits_end);

        let count = if digits.is_empty() {
            1
        } else {
            match digits.parse::<usize>() {
                Ok(0) => bail!("Repeat count must be at least 1"),
                Ok(n) => n,
                Err(e) => bail!("Invalid repeat count '{digits}': {e}"),
            }
        };

        let format = if letter.is_empty() {
            DisplayFormat::Natural
        } else {
            letter.parse::<DisplayFormat>()?
        };

        Ok(Self { count, format })
    }
}

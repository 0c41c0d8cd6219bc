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

use eyre::Result;

use crate::FormatSpec;

/// Normalize an expression by replacing any contiguous whitespace with a single space
pub fn normalize_expression(expr: &str) -> String {
    expr.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a leading `/[count][letter]` format specification off a command argument.
///
/// The remainder is returned normalized. Arguments without a leading `/` yield
/// `None` and the whole normalized argument.
pub fn split_format_prefix(arg: &str) -> Result<(Option<FormatSpec>, String)> {
    let trimmed = arg.trim_start();
    if !trimmed.starts_with('/') {
        return Ok((None, normalize_expression(trimmed)));
    }

    let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let spec = trimmed[..end].parse::<FormatSpec>()?;
    Ok((Some(spec), normalize_expression(&trimmed[end..])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DisplayFormat;

    #[test]
    fn test_normalize_expression_mixed_whitespace() {
        assert_eq!(normalize_expression("a  \t\n  b \r\n c"), "a b c");
    }

    #[test]
    fn test_normalize_expression_leading_trailing_whitespace() {
        assert_eq!(normalize_expression("  a + b  "), "a + b");
        assert_eq!(normalize_expression("\t\n&count\n\t"), "&count");
    }

    #[test]
    fn test_normalize_expression_only_whitespace() {
        assert_eq!(normalize_expression(""), "");
        assert_eq!(normalize_expression("\t\n\r"), "");
    }

    #[test]
    fn test_split_format_prefix_without_spec() {
        let (spec, rest) = split_format_prefix("  total +   1 ").unwrap();
        assert_eq!(spec, None);
        assert_eq!(rest, "total + 1");
    }

    #[test]
    fn test_split_format_prefix_with_spec() {
        let (spec, rest) = split_format_prefix("/4i  &main").unwrap();
        assert_eq!(spec, Some(FormatSpec { count: 4, format: DisplayFormat::Instruction }));
        assert_eq!(rest, "&main");

        let (spec, rest) = split_format_prefix("/x").unwrap();
        assert_eq!(spec, Some(FormatSpec { count: 1, format: DisplayFormat::Hex }));
        assert_eq!(rest, "");
    }

    #[test]
    fn test_split_format_prefix_invalid_spec() {
        assert!(split_format_prefix("/0 x").is_err());
        assert!(split_format_prefix("/q x").is_err());
    }
}

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

// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! WDB Common - Shared functionality for WDB components
//!
//! This crate provides the types shared by the display engine and the `wdb`
//! shell: frame symbols, display formats, expression text helpers, logging
//! setup and module-gated assertions.

/// Common types used throughout WDB, including frame symbols and display formats
pub mod types;

/// Expression text helpers such as whitespace normalization and format prefixes
pub mod expression;
/// Logging setup and utilities for consistent logging across WDB components
pub mod logging;
/// Assertion macros that can be switched on per module through `WDB_ASSERT`
pub mod macros;

pub use expression::*;
pub use types::*;

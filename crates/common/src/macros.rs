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

//! Path-based conditional assertion macros for WDB
//!
//! The assertions in this module only run when the `WDB_ASSERT` environment
//! variable selects the module they are written in, much like `RUST_LOG`
//! selects log targets. They guard invariants that are too costly to check on
//! every call in normal sessions, such as the slot-store bookkeeping.
//!
//! # Environment Variable Syntax
//!
//! - **Enable all assertions**: `WDB_ASSERT=*` or `WDB_ASSERT=all`
//! - **Enable a crate or module and its children**: `WDB_ASSERT=wdb_engine::display`
//! - **Multiple targets**: `WDB_ASSERT=wdb_engine::display,wdb_common` (comma-separated)
//!
//! When `WDB_ASSERT` is not set or empty, all assertions are disabled.
//!
//! # Usage in Code
//!
//! ```ignore
//! use wdb_common::{wdb_assert, wdb_assert_eq};
//!
//! wdb_assert!(capacity % GRANULARITY == 0, "capacity {} not aligned", capacity);
//! wdb_assert_eq!(live, expected);
//! ```

use once_cell::sync::Lazy;
use std::env;

/// Assertion target patterns read once from `WDB_ASSERT`
static ASSERTION_TARGETS: Lazy<Vec<String>> =
    Lazy::new(|| parse_targets(env::var("WDB_ASSERT").ok().as_deref()));

fn parse_targets(value: Option<&str>) -> Vec<String> {
    value
        .map(|val| {
            val.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
        })
        .unwrap_or_default()
}

fn matches_targets(targets: &[String], module_path: &str) -> bool {
    targets
        .iter()
        .any(|target| target == "*" || target == "all" || module_path.starts_with(target.as_str()))
}

/// Check if assertions are enabled for the given module path
///
/// Used by the assertion macros; `module_path` is normally `module_path!()`.
pub fn is_assertion_enabled(module_path: &str) -> bool {
    matches_targets(&ASSERTION_TARGETS, module_path)
}

/// Marks the assertion branch as unlikely
#[cold]
#[inline(never)]
pub fn cold_path() {}

/// Assert a condition only when enabled via the `WDB_ASSERT` environment variable.
#[macro_export]
macro_rules! wdb_assert {
    ($($arg:tt)*) => {
        if $crate::macros::is_assertion_enabled(module_path!()) {
            $crate::macros::cold_path();
            assert!($($arg)*);
        }
    };
}

/// Assert two expressions are equal only when enabled via `WDB_ASSERT`.
#[macro_export]
macro_rules! wdb_assert_eq {
    ($($arg:tt)*) => {
        if $crate::macros::is_assertion_enabled(module_path!()) {
            $crate::macros::cold_path();
            assert_eq!($($arg)*);
        }
    };
}

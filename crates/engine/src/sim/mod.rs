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

//! A simulated debuggee driving the display registry.
//!
//! The debuggee is described by a [`Scenario`] (functions with locals, globals,
//! strings and a disassembly listing) and evaluates a small integer expression
//! language over it.

mod debuggee;
pub use debuggee::*;

pub mod expr;
pub use expr::{parse_expression, SimExpr};

mod scenario;
pub use scenario::*;

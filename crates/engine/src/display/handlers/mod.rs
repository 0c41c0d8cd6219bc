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

//! Handler traits through which the display registry reaches the debugger.
//!
//! The registry never parses, evaluates or formats anything itself. It relies
//! on three collaborators:
//!
//! - [`ExpressionHandler`] - Clones, evaluates and renders parsed expressions
//! - [`FrameHandler`] - Describes the function owning the current execution point
//! - [`ValueFormatter`] - Prints evaluated values and dumps memory
//!
//! [`DisplayHandler`] bundles the three and is implemented automatically for any
//! type that provides all of them, such as
//! [`SimulatedDebuggee`](crate::sim::SimulatedDebuggee).

use std::fmt;

use eyre::Result;
use wdb_common::{DisplayFormat, FrameSymbol};

/// An expression clone together with its binding information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonedExpression<E> {
    /// The cloned expression, owned by whoever receives it
    pub expr: E,
    /// Whether the clone references a variable local to the current function
    pub has_local_binding: bool,
}

/// Handler trait for expression handles.
///
/// Releasing an expression is dropping it: an owner holds each handle exactly
/// once and the handle's `Drop` gives back whatever the engine associated with it.
pub trait ExpressionHandler {
    /// Parsed expression handle
    type Expr;
    /// Result of evaluating an expression
    type Value;

    /// Clone `expr`, binding its identifiers against the current frame.
    ///
    /// The flag in the result tells whether any identifier bound to a variable
    /// local to the current function.
    fn clone_expression(&self, expr: &Self::Expr) -> ClonedExpression<Self::Expr>;

    /// Evaluate `expr` at the current execution point.
    ///
    /// # Errors
    /// Fails when the expression can no longer be resolved, e.g. a referenced
    /// variable went out of scope or was optimized away.
    fn evaluate(&self, expr: &Self::Expr) -> Result<Self::Value>;

    /// Textual form of `expr`
    fn render(&self, expr: &Self::Expr) -> String;

    /// Interpret `value` as a target address
    fn value_as_address(&self, value: &Self::Value) -> Result<u64>;
}

/// Handler trait for frame introspection.
pub trait FrameHandler {
    /// Symbol of the function owning the current frame.
    ///
    /// Returns `None` when the debuggee is not stopped in a valid frame.
    fn current_frame_symbol(&self) -> Option<FrameSymbol>;
}

/// Handler trait for value output.
pub trait ValueFormatter<V> {
    /// Print `value` once in `format`, indented by `offset` columns.
    ///
    /// Writes no trailing newline.
    fn print_scalar(
        &self,
        out: &mut dyn fmt::Write,
        value: &V,
        format: DisplayFormat,
        offset: usize,
    ) -> fmt::Result;

    /// Dump `count` items of `format` starting at `address`.
    ///
    /// The first item continues the current output line; every item line ends
    /// with a newline.
    fn examine_memory(
        &self,
        out: &mut dyn fmt::Write,
        address: u64,
        count: usize,
        format: DisplayFormat,
    ) -> fmt::Result;
}

/// Everything the display registry needs from the debugger.
pub trait DisplayHandler:
    ExpressionHandler + FrameHandler + ValueFormatter<<Self as ExpressionHandler>::Value>
{
}

impl<T> DisplayHandler for T where
    T: ExpressionHandler + FrameHandler + ValueFormatter<<T as ExpressionHandler>::Value>
{
}

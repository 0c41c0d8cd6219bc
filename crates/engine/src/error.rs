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

//! Errors surfaced by display registry operations.

use std::fmt;

use thiserror::Error;

/// Environment failures that abort a whole registry operation.
///
/// Bad display numbers are not errors: they are reported on the output sink
/// and the command counts as handled (see
/// [`CommandStatus`](crate::display::CommandStatus)).
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The debuggee is not stopped in a valid frame
    #[error("no current frame: the debuggee is not stopped in a valid frame")]
    NoFrame,
    /// The output sink rejected a write
    #[error("failed to write display output")]
    Output(#[from] fmt::Error),
}

/// Result type of display registry operations
pub type DisplayResult<T> = std::result::Result<T, DisplayError>;

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

//! Watch displays: expressions re-evaluated every time the debuggee stops.
//!
//! # Main Components
//!
//! - [`DisplayRegistry`] - Public surface: add, list, print, enable/disable, delete
//! - [`WatchSlots`] - Gap-tolerant slot store backing the registry
//! - [`handlers`] - Traits through which the registry reaches the debugger
//!
//! # Basic Usage
//!
//! ```rust,ignore
//! use wdb_engine::{display::DisplayRegistry, sim::SimulatedDebuggee};
//!
//! let debuggee = SimulatedDebuggee::default();
//! let mut registry = DisplayRegistry::new();
//!
//! let expr = debuggee.parse("counter + 1")?;
//! let number = registry.add(&debuggee, &expr, 1, DisplayFormat::Natural)?;
//!
//! let mut out = String::new();
//! registry.print_all(&debuggee, &mut out)?;
//! ```

pub mod handlers;

mod registry;
pub use registry::*;

mod slots;
pub use slots::*;

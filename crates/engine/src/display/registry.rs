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

//! The display registry: user-registered expressions re-printed on demand.

use std::fmt::{self, Write as _};

use tracing::{debug, info, warn};
use wdb_common::{DisplayFormat, FrameSymbol};

use super::{
    handlers::{DisplayHandler, FrameHandler},
    slots::WatchSlots,
};
use crate::{DisplayError, DisplayResult};

/// Display number that selects every display in [`DisplayRegistry::delete`]
pub const ALL_DISPLAYS: i64 = -1;

/// Whether a display takes part in automatic printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    /// Printed by [`DisplayRegistry::print_all`] while in scope
    Enabled,
    /// Listed, but never evaluated automatically
    Disabled,
}

/// Outcome of a command addressing a display by number.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The command took effect
    Applied,
    /// The number named no live display; reported on the output sink
    InvalidDisplayNumber,
}

/// One registered display.
#[derive(Debug)]
pub struct WatchRecord<E> {
    expression: E,
    repeat_count: usize,
    format: DisplayFormat,
    state: DisplayState,
    bound_frame: Option<FrameSymbol>,
}

impl<E> WatchRecord<E> {
    /// The owned expression clone
    pub fn expression(&self) -> &E {
        &self.expression
    }

    /// Items dumped per print for examine formats
    pub fn repeat_count(&self) -> usize {
        self.repeat_count
    }

    /// Display format
    pub fn format(&self) -> DisplayFormat {
        self.format
    }

    /// Current state
    pub fn state(&self) -> DisplayState {
        self.state
    }

    /// Whether the display takes part in automatic printing
    pub fn is_enabled(&self) -> bool {
        self.state == DisplayState::Enabled
    }

    /// Function the expression's locals belong to, for scope-bound displays
    pub fn bound_frame(&self) -> Option<&FrameSymbol> {
        self.bound_frame.as_ref()
    }

    /// Whether the display is meaningful while `frame` is current
    pub fn in_scope(&self, frame: &FrameSymbol) -> bool {
        self.bound_frame.as_ref().is_none_or(|bound| bound.same_function(frame))
    }
}

/// Registry of displays, addressed by stable 1-based display numbers.
///
/// The registry owns one clone of every registered expression and drops it when
/// the display is deleted, when all displays are reset, or when the registry
/// itself is dropped.
#[derive(Debug)]
pub struct DisplayRegistry<E> {
    slots: WatchSlots<WatchRecord<E>>,
}

impl<E> Default for DisplayRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> DisplayRegistry<E> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { slots: WatchSlots::new() }
    }

    /// Register `expr` as a new display and return its display number.
    ///
    /// The registry keeps its own clone of `expr`. When the clone references
    /// locals of the current function, the display is bound to the current frame
    /// and only printed while that function is current.
    ///
    /// # Errors
    /// [`DisplayError::NoFrame`] when the expression needs a frame and there is
    /// none; nothing is registered in that case.
    pub fn add<H>(
        &mut self,
        handler: &H,
        expr: &E,
        repeat_count: usize,
        format: DisplayFormat,
    ) -> DisplayResult<usize>
    where
        H: DisplayHandler<Expr = E>,
    {
        let cloned = handler.clone_expression(expr);
        let bound_frame = if cloned.has_local_binding {
            // The clone is dropped on this early return
            Some(current_frame(handler)?)
        } else {
            None
        };

        let bound = bound_frame.as_ref().map(|frame| frame.name().to_owned());
        let index = self.slots.allocate(WatchRecord {
            expression: cloned.expr,
            repeat_count,
            format,
            state: DisplayState::Enabled,
            bound_frame,
        });

        let number = index + 1;
        info!(
            number,
            %format,
            repeat_count,
            bound = ?bound,
            "Added display"
        );
        Ok(number)
    }

    /// Write one line per display: number, expression and scope annotations.
    ///
    /// Expressions are never evaluated.
    ///
    /// # Errors
    /// [`DisplayError::NoFrame`] when there is no current frame to check scopes against.
    pub fn list<H>(&self, handler: &H, out: &mut dyn fmt::Write) -> DisplayResult<()>
    where
        H: DisplayHandler<Expr = E>,
    {
        let frame = current_frame(handler)?;

        for (index, record) in self.slots.iter() {
            write!(out, "{}: {}", index + 1, handler.render(&record.expression))?;
            if let Some(bound) = &record.bound_frame {
                write!(out, " in {}", bound.name())?;
            }

            let annotation = match record.state {
                DisplayState::Disabled => " (disabled)",
                DisplayState::Enabled if !record.in_scope(&frame) => " (out of scope)",
                DisplayState::Enabled => "",
            };
            writeln!(out, "{annotation}")?;
        }
        Ok(())
    }

    /// Evaluate and print every enabled display that is in scope.
    ///
    /// Disabled and out-of-scope displays are skipped silently. A display whose
    /// expression fails to evaluate is disabled and the others are still printed.
    ///
    /// # Errors
    /// [`DisplayError::NoFrame`] when there is no current frame.
    pub fn print_all<H>(&mut self, handler: &H, out: &mut dyn fmt::Write) -> DisplayResult<()>
    where
        H: DisplayHandler<Expr = E>,
    {
        let frame = current_frame(handler)?;

        for index in 0..self.slots.high_water() {
            let due = self
                .slots
                .get(index)
                .is_some_and(|record| record.is_enabled() && record.in_scope(&frame));
            if due {
                self.print_slot(handler, out, index)?;
            }
        }
        Ok(())
    }

    /// Evaluate and print display `number`, whatever its scope.
    ///
    /// A disabled display prints a `(disabled)` marker instead of a value.
    pub fn print_one<H>(
        &mut self,
        handler: &H,
        out: &mut dyn fmt::Write,
        number: i64,
    ) -> DisplayResult<CommandStatus>
    where
        H: DisplayHandler<Expr = E>,
    {
        let Some(index) = self.live_index(number) else {
            return report_invalid(out, number);
        };
        self.print_slot(handler, out, index)?;
        Ok(CommandStatus::Applied)
    }

    /// Delete display `number`, or every display for [`ALL_DISPLAYS`].
    ///
    /// Deleting everything also recompacts the store to its base capacity.
    pub fn delete(&mut self, out: &mut dyn fmt::Write, number: i64) -> DisplayResult<CommandStatus> {
        if number == ALL_DISPLAYS {
            let released = self.slots.reset_all();
            info!(released, "Deleted all displays");
            return Ok(CommandStatus::Applied);
        }

        let Some(index) = self.live_index(number) else {
            return report_invalid(out, number);
        };

        // Dropping the record releases its expression
        drop(self.slots.free(index));
        self.slots.maybe_shrink();
        info!(number, "Deleted display");
        Ok(CommandStatus::Applied)
    }

    /// Enable or disable display `number`.
    ///
    /// A display that becomes enabled while in scope is printed right away.
    ///
    /// # Errors
    /// [`DisplayError::NoFrame`] when there is no current frame.
    pub fn set_enabled<H>(
        &mut self,
        handler: &H,
        out: &mut dyn fmt::Write,
        number: i64,
        enabled: bool,
    ) -> DisplayResult<CommandStatus>
    where
        H: DisplayHandler<Expr = E>,
    {
        let frame = current_frame(handler)?;

        let Some(index) = self.live_index(number) else {
            return report_invalid(out, number);
        };
        let Some(record) = self.slots.get_mut(index) else {
            return report_invalid(out, number);
        };

        record.state = if enabled { DisplayState::Enabled } else { DisplayState::Disabled };
        debug!(number, enabled, "Changed display state");

        if enabled && record.in_scope(&frame) {
            self.print_slot(handler, out, index)?;
        }
        Ok(CommandStatus::Applied)
    }

    /// Display `number`, if it is live
    pub fn get(&self, number: i64) -> Option<&WatchRecord<E>> {
        self.slots.get(self.live_index(number)?)
    }

    /// Live displays with their display numbers, in number order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &WatchRecord<E>)> {
        self.slots.iter().map(|(index, record)| (index + 1, record))
    }

    /// Number of live displays
    pub fn len(&self) -> usize {
        self.slots.live_count()
    }

    /// Whether no display is registered
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Highest display number in use, 0 when empty
    pub fn high_water(&self) -> usize {
        self.slots.high_water()
    }

    /// Capacity of the underlying slot store
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Slot index of display `number` if it names a live display
    fn live_index(&self, number: i64) -> Option<usize> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.slots.get(index).map(|_| index)
    }

    fn print_slot<H>(
        &mut self,
        handler: &H,
        out: &mut dyn fmt::Write,
        index: usize,
    ) -> DisplayResult<()>
    where
        H: DisplayHandler<Expr = E>,
    {
        let Some(record) = self.slots.get_mut(index) else {
            return Ok(());
        };
        let number = index + 1;
        let text = handler.render(&record.expression);

        if !record.is_enabled() {
            writeln!(out, "{number}: {text} = (disabled)")?;
            return Ok(());
        }

        let evaluated = handler.evaluate(&record.expression).and_then(|value| {
            if record.format.is_examine() {
                handler.value_as_address(&value).map(Evaluated::Address)
            } else {
                Ok(Evaluated::Scalar(value))
            }
        });

        match evaluated {
            Err(err) => {
                warn!(number, expression = %text, error = %err, "Disabling display after evaluation failure");
                record.state = DisplayState::Disabled;
                writeln!(out, "Unable to evaluate expression {text}")?;
                writeln!(out, "Disabling display {number} ...")?;
            }
            Ok(Evaluated::Address(address)) => {
                write!(out, "{number}: {text} = ")?;
                handler.examine_memory(out, address, record.repeat_count, record.format)?;
            }
            Ok(Evaluated::Scalar(value)) => {
                write!(out, "{number}: {text} = ")?;
                handler.print_scalar(out, &value, record.format, 0)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }
}

enum Evaluated<V> {
    Address(u64),
    Scalar(V),
}

fn current_frame<H: FrameHandler + ?Sized>(handler: &H) -> DisplayResult<FrameSymbol> {
    handler.current_frame_symbol().ok_or(DisplayError::NoFrame)
}

fn report_invalid(out: &mut dyn fmt::Write, number: i64) -> DisplayResult<CommandStatus> {
    debug!(number, "Rejected display number");
    writeln!(out, "Invalid display number")?;
    Ok(CommandStatus::InvalidDisplayNumber)
}

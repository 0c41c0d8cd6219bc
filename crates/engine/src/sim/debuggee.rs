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

//! A debuggee simulated from a [`Scenario`].
//!
//! The simulated debuggee keeps a call stack of frames, each holding the locals
//! of one function, and a byte-addressable memory made of the scenario's
//! globals and strings. It implements every handler the display registry needs.

use std::{collections::BTreeMap, fmt, path::Path};

use eyre::{bail, eyre, Result};
use tracing::{debug, trace};
use wdb_common::{DisplayFormat, FrameSymbol};

use super::{
    expr::{parse_expression, Binding, SimExpr, VarRef, VariableScope},
    scenario::{FunctionInfo, Scenario},
};
use crate::display::handlers::{ClonedExpression, ExpressionHandler, FrameHandler, ValueFormatter};

/// Symbol tag of function symbols
pub const SYM_TAG_FUNCTION: u32 = 5;

/// Items per row when dumping memory
const ITEMS_PER_ROW: usize = 4;

#[derive(Debug, Clone)]
struct Frame {
    /// Index into the scenario's functions
    function: usize,
    locals: BTreeMap<String, i64>,
}

/// A debuggee stopped at the top of a simulated call stack.
#[derive(Debug, Clone)]
pub struct SimulatedDebuggee {
    scenario: Scenario,
    frames: Vec<Frame>,
}

impl Default for SimulatedDebuggee {
    fn default() -> Self {
        Self::new_unchecked(Scenario::default())
    }
}

impl SimulatedDebuggee {
    /// Create a debuggee stopped in the innermost function of the scenario's stack
    pub fn from_scenario(scenario: Scenario) -> Result<Self> {
        scenario.validate()?;
        Ok(Self::new_unchecked(scenario))
    }

    /// Load a scenario file and create a debuggee from it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_scenario(Scenario::load(path)?)
    }

    fn new_unchecked(mut scenario: Scenario) -> Self {
        scenario.code.sort_by_key(|line| line.address);

        let mut debuggee = Self { scenario, frames: Vec::new() };
        let stack = debuggee.scenario.stack.clone();
        for name in &stack {
            if let Some(function) = debuggee.function_index(name) {
                debuggee.push_frame(function);
            }
        }
        debuggee
    }

    /// The scenario this debuggee was built from
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Parse an expression whose identifiers all name a visible variable.
    ///
    /// Identifiers are bound later, when the expression is cloned.
    pub fn parse(&self, text: &str) -> Result<SimExpr> {
        let expr = parse_expression(text)?;
        if let Some(var) = expr.variables().into_iter().find(|var| !self.is_visible(&var.name)) {
            bail!("No symbol \"{}\" in current context", var.name);
        }
        Ok(expr)
    }

    /// Enter `function`, making it the current frame
    pub fn call(&mut self, function: &str) -> Result<FrameSymbol> {
        let Some(index) = self.function_index(function) else {
            bail!("No function named '{function}'");
        };
        self.push_frame(index);
        debug!(function, depth = self.frames.len(), "Entered function");
        Ok(self.function_symbol(index))
    }

    /// Return from the current function; the caller becomes current.
    ///
    /// Returning from the outermost function leaves no current frame.
    pub fn finish(&mut self) -> Result<String> {
        let Some(frame) = self.frames.pop() else {
            bail!("The program is not being run");
        };
        let name = self.scenario.functions[frame.function].name.clone();
        debug!(function = %name, depth = self.frames.len(), "Returned from function");
        Ok(name)
    }

    /// Assign `value` to a local of the current function or, failing that, a global
    pub fn set_variable(&mut self, name: &str, value: i64) -> Result<()> {
        if let Some(slot) = self.frames.last_mut().and_then(|frame| frame.locals.get_mut(name)) {
            *slot = value;
            return Ok(());
        }
        if let Some(global) = self.scenario.globals.iter_mut().find(|g| g.name == name) {
            global.value = value;
            return Ok(());
        }
        bail!("No symbol \"{name}\" in current context")
    }

    /// Remove a local from the current frame, as when the compiler optimizes it away
    pub fn forget_local(&mut self, name: &str) -> Result<()> {
        match self.frames.last_mut().and_then(|frame| frame.locals.remove(name)) {
            Some(_) => Ok(()),
            None => bail!("No local \"{name}\" in current frame"),
        }
    }

    /// Frame symbols of the call stack, innermost first
    pub fn backtrace(&self) -> Vec<FrameSymbol> {
        self.frames.iter().rev().map(|frame| self.function_symbol(frame.function)).collect()
    }

    /// Name of the current function, if stopped in a frame
    pub fn current_function(&self) -> Option<&str> {
        self.frames.last().map(|frame| self.scenario.functions[frame.function].name.as_str())
    }

    /// Parse, bind and evaluate `text` at the current execution point
    pub fn evaluate_text(&self, text: &str) -> Result<(SimExpr, i64)> {
        let parsed = self.parse(text)?;
        let cloned = self.clone_expression(&parsed);
        let value = self.evaluate(&cloned.expr)?;
        Ok((cloned.expr, value))
    }

    fn function_index(&self, name: &str) -> Option<usize> {
        self.scenario.functions.iter().position(|f| f.name == name)
    }

    fn push_frame(&mut self, function: usize) {
        let locals = self.scenario.functions[function]
            .locals
            .iter()
            .map(|local| (local.name.clone(), local.value))
            .collect();
        self.frames.push(Frame { function, locals });
    }

    fn function_symbol(&self, index: usize) -> FrameSymbol {
        let FunctionInfo { name, address, size, .. } = &self.scenario.functions[index];
        FrameSymbol::new(name, *address)
            .with_size(*size)
            .with_module_base(self.scenario.module_base)
            .with_indices(0, u32::try_from(index + 1).unwrap_or(u32::MAX))
            .with_flags(0, SYM_TAG_FUNCTION)
    }

    fn is_visible(&self, name: &str) -> bool {
        self.current_locals().is_some_and(|locals| locals.contains_key(name))
            || self.scenario.globals.iter().any(|g| g.name == name)
    }

    fn current_locals(&self) -> Option<&BTreeMap<String, i64>> {
        self.frames.last().map(|frame| &frame.locals)
    }

    fn read_byte(&self, address: u64) -> Option<u8> {
        for global in &self.scenario.globals {
            if let Some(offset) = address.checked_sub(global.address).filter(|o| *o < global.size) {
                return Some((global.value >> (8 * offset)) as u8);
            }
        }
        for string in &self.scenario.strings {
            let bytes = string.text.as_bytes();
            match address.checked_sub(string.address).map(|o| o as usize) {
                Some(offset) if offset < bytes.len() => return Some(bytes[offset]),
                Some(offset) if offset == bytes.len() => return Some(0),
                _ => {}
            }
        }
        None
    }

    /// Little-endian integer of `size` bytes, zero-extended
    fn read_unsigned(&self, address: u64, size: u64) -> Option<u64> {
        (0..size).rev().try_fold(0u64, |acc, offset| {
            let byte = self.read_byte(address.checked_add(offset)?)?;
            Some((acc << 8) | u64::from(byte))
        })
    }

    fn read_c_string(&self, address: u64) -> Option<String> {
        let mut bytes = Vec::new();
        let mut cursor = address;
        loop {
            match self.read_byte(cursor)? {
                0 => break,
                byte => bytes.push(byte),
            }
            cursor = cursor.checked_add(1)?;
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn format_scalar(&self, value: i64, format: DisplayFormat) -> String {
        let bits = value as u64;
        match format {
            DisplayFormat::Natural | DisplayFormat::Decimal => value.to_string(),
            DisplayFormat::Unsigned => bits.to_string(),
            DisplayFormat::Hex | DisplayFormat::Instruction => format!("{bits:#x}"),
            DisplayFormat::Byte => format!("{:#04x}", bits as u8),
            DisplayFormat::Word => format!("{:#06x}", bits as u16),
            DisplayFormat::Giant => format!("{bits:#018x}"),
            DisplayFormat::Char => format_char(bits as u8),
            DisplayFormat::String => match self.read_c_string(bits) {
                Some(text) => format!("{text:?}"),
                None => format!("<cannot read string at {bits:#x}>"),
            },
        }
    }

    fn examine_instructions(&self, out: &mut dyn fmt::Write, address: u64, count: usize) -> fmt::Result {
        let code = &self.scenario.code;
        let Some(start) = code.iter().position(|line| line.address == address) else {
            return writeln!(out, "Cannot read memory at 0x{address:08x}");
        };
        for line in code[start..].iter().take(count) {
            writeln!(out, "0x{:08x}: {}", line.address, line.text)?;
        }
        Ok(())
    }

    fn examine_strings(&self, out: &mut dyn fmt::Write, address: u64, count: usize) -> fmt::Result {
        let mut cursor = address;
        for _ in 0..count {
            let Some(text) = self.read_c_string(cursor) else {
                return writeln!(out, "Cannot read memory at 0x{cursor:08x}");
            };
            writeln!(out, "0x{cursor:08x}: {text:?}")?;
            cursor = cursor.saturating_add(text.len() as u64 + 1);
        }
        Ok(())
    }

    fn examine_items(
        &self,
        out: &mut dyn fmt::Write,
        address: u64,
        count: usize,
        format: DisplayFormat,
    ) -> fmt::Result {
        let size = item_size(format);
        let mut cursor = address;
        for i in 0..count {
            let column = i % ITEMS_PER_ROW;
            let Some(bits) = self.read_unsigned(cursor, size) else {
                if column != 0 {
                    writeln!(out)?;
                }
                return writeln!(out, "Cannot read memory at 0x{cursor:08x}");
            };

            if column == 0 {
                if i != 0 {
                    writeln!(out)?;
                }
                write!(out, "0x{cursor:08x}:")?;
            }
            write!(out, " {}", format_item(bits, size, format))?;
            cursor = cursor.saturating_add(size);
        }
        if count != 0 {
            writeln!(out)?;
        }
        Ok(())
    }
}

fn item_size(format: DisplayFormat) -> u64 {
    match format {
        DisplayFormat::Byte | DisplayFormat::Char => 1,
        DisplayFormat::Word => 2,
        DisplayFormat::Giant => 8,
        _ => 4,
    }
}

/// Format a memory item of `size` bytes
fn format_item(bits: u64, size: u64, format: DisplayFormat) -> String {
    let width = (size * 2) as usize;
    let shift = 64 - 8 * size;
    let signed = ((bits << shift) as i64) >> shift;
    match format {
        DisplayFormat::Natural | DisplayFormat::Decimal => signed.to_string(),
        DisplayFormat::Unsigned => bits.to_string(),
        DisplayFormat::Char => format_char(bits as u8),
        _ => format!("0x{bits:0width$x}"),
    }
}

fn format_char(byte: u8) -> String {
    format!("'{}'", std::ascii::escape_default(byte))
}

impl VariableScope for SimulatedDebuggee {
    fn read(&self, var: &VarRef) -> Result<i64> {
        let local = || self.current_locals().and_then(|locals| locals.get(&var.name)).copied();
        let global = || self.scenario.globals.iter().find(|g| g.name == var.name).map(|g| g.value);

        let value = match var.binding {
            Binding::Local => local(),
            Binding::Global => global(),
            Binding::Unresolved => local().or_else(global),
        };
        value.ok_or_else(|| eyre!("No symbol \"{}\" in current context", var.name))
    }

    fn address_of(&self, var: &VarRef) -> Result<u64> {
        let is_local = match var.binding {
            Binding::Local => true,
            Binding::Global => false,
            Binding::Unresolved => {
                self.current_locals().is_some_and(|locals| locals.contains_key(&var.name))
            }
        };
        if is_local {
            bail!("Address requested for local variable \"{}\" held in a register", var.name);
        }

        self.scenario
            .globals
            .iter()
            .find(|g| g.name == var.name)
            .map(|g| g.address)
            .ok_or_else(|| eyre!("No symbol \"{}\" in current context", var.name))
    }
}

impl ExpressionHandler for SimulatedDebuggee {
    type Expr = SimExpr;
    type Value = i64;

    fn clone_expression(&self, expr: &SimExpr) -> ClonedExpression<SimExpr> {
        let locals = self.current_locals();
        let (expr, has_local_binding) =
            expr.bind(&|name| locals.is_some_and(|locals| locals.contains_key(name)));
        trace!(%expr, has_local_binding, "Cloned expression");
        ClonedExpression { expr, has_local_binding }
    }

    fn evaluate(&self, expr: &SimExpr) -> Result<i64> {
        expr.eval(self)
    }

    fn render(&self, expr: &SimExpr) -> String {
        expr.to_string()
    }

    fn value_as_address(&self, value: &i64) -> Result<u64> {
        u64::try_from(*value).map_err(|_| eyre!("Value {value} is not a valid address"))
    }
}

impl FrameHandler for SimulatedDebuggee {
    fn current_frame_symbol(&self) -> Option<FrameSymbol> {
        self.frames.last().map(|frame| self.function_symbol(frame.function))
    }
}

impl ValueFormatter<i64> for SimulatedDebuggee {
    fn print_scalar(
        &self,
        out: &mut dyn fmt::Write,
        value: &i64,
        format: DisplayFormat,
        offset: usize,
    ) -> fmt::Result {
        write!(out, "{:offset$}{}", "", self.format_scalar(*value, format))
    }

    fn examine_memory(
        &self,
        out: &mut dyn fmt::Write,
        address: u64,
        count: usize,
        format: DisplayFormat,
    ) -> fmt::Result {
        match format {
            DisplayFormat::Instruction => self.examine_instructions(out, address, count),
            DisplayFormat::String => self.examine_strings(out, address, count),
            _ => self.examine_items(out, address, count, format),
        }
    }
}

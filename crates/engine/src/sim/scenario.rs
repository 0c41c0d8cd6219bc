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

//! Scenario files describing a simulated debuggee.
//!
//! A scenario is a TOML document:
//!
//! ```toml
//! module_base = 0x400000
//! stack = ["main"]
//!
//! [[globals]]
//! name = "counter"
//! address = 0x404000
//! value = 3
//! size = 4
//!
//! [[functions]]
//! name = "main"
//! address = 0x401000
//! size = 0x40
//! locals = [{ name = "argc", value = 1 }]
//!
//! [[code]]
//! address = 0x401000
//! text = "push   %ebp"
//!
//! [[strings]]
//! address = 0x405000
//! text = "hello"
//! ```

use std::{fs, path::Path, str::FromStr};

use eyre::{bail, Result, WrapErr};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A global variable living in debuggee memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVariable {
    /// Symbol name
    pub name: String,
    /// Address of the first byte
    pub address: u64,
    /// Initial value
    pub value: i64,
    /// Width in bytes: 1, 2, 4 or 8
    #[serde(default = "default_global_size")]
    pub size: u64,
}

fn default_global_size() -> u64 {
    4
}

/// A local variable with its value on function entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariable {
    /// Variable name
    pub name: String,
    /// Initial value
    #[serde(default)]
    pub value: i64,
}

/// A function of the debuggee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Symbol name
    pub name: String,
    /// Entry address
    pub address: u64,
    /// Code size in bytes
    #[serde(default)]
    pub size: u64,
    /// Locals created on entry
    #[serde(default)]
    pub locals: Vec<LocalVariable>,
}

/// One disassembled instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLine {
    /// Instruction address
    pub address: u64,
    /// Instruction text
    pub text: String,
}

/// A NUL-terminated string in debuggee memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringData {
    /// Address of the first character
    pub address: u64,
    /// Contents, without the terminator
    pub text: String,
}

/// Complete description of a simulated debuggee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Load address of the main module
    pub module_base: u64,
    /// Global variables
    pub globals: Vec<GlobalVariable>,
    /// Functions that can appear on the call stack
    pub functions: Vec<FunctionInfo>,
    /// Disassembly listing
    pub code: Vec<CodeLine>,
    /// String constants
    pub strings: Vec<StringData>,
    /// Initial call stack, outermost function first
    pub stack: Vec<String>,
}

impl Default for Scenario {
    fn default() -> Self {
        let global = |name: &str, address, value, size| GlobalVariable {
            name: name.to_string(),
            address,
            value,
            size,
        };
        let local = |name: &str, value| LocalVariable { name: name.to_string(), value };
        let code = |address, text: &str| CodeLine { address, text: text.to_string() };

        Self {
            module_base: 0x400000,
            globals: vec![
                global("counter", 0x404000, 3, 4),
                global("limit", 0x404004, 100, 4),
                global("flags", 0x404008, 0x5a, 1),
                global("total", 0x404010, 0, 8),
                global("greeting", 0x404018, 0x405000, 8),
            ],
            functions: vec![
                FunctionInfo {
                    name: "main".into(),
                    address: 0x401000,
                    size: 0x40,
                    locals: vec![local("argc", 1), local("i", 0)],
                },
                FunctionInfo {
                    name: "compute".into(),
                    address: 0x401040,
                    size: 0x30,
                    locals: vec![local("acc", 0), local("i", 5)],
                },
                FunctionInfo {
                    name: "helper".into(),
                    address: 0x401070,
                    size: 0x20,
                    locals: vec![local("tmp", 42)],
                },
            ],
            code: vec![
                code(0x401000, "push   %ebp"),
                code(0x401001, "mov    %esp,%ebp"),
                code(0x401003, "sub    $0x10,%esp"),
                code(0x401006, "call   0x401040 <compute>"),
                code(0x40100b, "leave"),
                code(0x40100c, "ret"),
                code(0x401040, "push   %ebp"),
                code(0x401041, "mov    %esp,%ebp"),
                code(0x401043, "mov    0x404000,%eax"),
                code(0x401048, "add    %eax,0x404010"),
                code(0x40104e, "pop    %ebp"),
                code(0x40104f, "ret"),
                code(0x401070, "mov    $0x2a,%eax"),
                code(0x401075, "ret"),
            ],
            strings: vec![StringData { address: 0x405000, text: "hello".into() }],
            stack: vec!["main".into()],
        }
    }
}

impl FromStr for Scenario {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(s).wrap_err("Failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }
}

impl Scenario {
    /// Load and validate a scenario file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read scenario file {}", path.display()))?;
        content.parse().wrap_err_with(|| format!("Invalid scenario file {}", path.display()))
    }

    /// Check names are unique, stack entries exist and global widths are valid
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = self.functions.iter().map(|f| f.name.as_str()).duplicates().next() {
            bail!("Function '{name}' is defined more than once");
        }
        if let Some(name) = self.globals.iter().map(|g| g.name.as_str()).duplicates().next() {
            bail!("Global '{name}' is defined more than once");
        }
        for function in &self.functions {
            if let Some(name) = function.locals.iter().map(|l| l.name.as_str()).duplicates().next() {
                bail!("Local '{name}' is defined more than once in '{}'", function.name);
            }
        }
        if let Some(global) = self.globals.iter().find(|g| ![1, 2, 4, 8].contains(&g.size)) {
            bail!("Global '{}' has unsupported size {}", global.name, global.size);
        }
        if let Some(name) = self.stack.iter().find(|name| self.function(name).is_none()) {
            bail!("Stack entry '{name}' does not name a function");
        }
        Ok(())
    }

    /// Function named `name`
    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }
}

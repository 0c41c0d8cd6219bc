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

//! Frame symbol descriptors and their identity rule.

use std::fmt;

/// Maximum number of name bytes a frame symbol keeps.
///
/// Frame inspectors fill the name into a bounded buffer; longer names are cut at
/// the last character boundary that fits.
pub const MAX_SYMBOL_NAME_LEN: usize = 256;

/// Metadata identifying the function that owns an execution point.
///
/// Two descriptors denote the same function when every metadata field and the
/// name are equal. Fields that an inspector does not know stay at zero, so a
/// descriptor built through [`FrameSymbol::new`] and the `with_*` setters always
/// has one canonical form and derived equality is well defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameSymbol {
    /// Start address of the function
    pub address: u64,
    /// Size of the function body in bytes
    pub size: u64,
    /// Load address of the module that contains the function
    pub module_base: u64,
    /// Type index of the function in the module's debug information
    pub type_index: u32,
    /// Symbol index in the module's debug information
    pub index: u32,
    /// Symbol flags reported by the inspector
    pub flags: u32,
    /// Symbol tag (kind of symbol) reported by the inspector
    pub tag: u32,
    name: String,
}

impl FrameSymbol {
    /// Create a descriptor for the function `name` starting at `address`.
    ///
    /// Every other metadata field starts at zero.
    pub fn new(name: &str, address: u64) -> Self {
        Self {
            address,
            size: 0,
            module_base: 0,
            type_index: 0,
            index: 0,
            flags: 0,
            tag: 0,
            name: bounded_name(name).to_string(),
        }
    }

    /// Set the size of the function body
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Set the module load address
    pub fn with_module_base(mut self, module_base: u64) -> Self {
        self.module_base = module_base;
        self
    }

    /// Set the debug-information type and symbol indices
    pub fn with_indices(mut self, type_index: u32, index: u32) -> Self {
        self.type_index = type_index;
        self.index = index;
        self
    }

    /// Set the symbol flags and tag
    pub fn with_flags(mut self, flags: u32, tag: u32) -> Self {
        self.flags = flags;
        self.tag = tag;
        self
    }

    /// Name of the function, bounded to [`MAX_SYMBOL_NAME_LEN`] bytes
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `self` and `other` identify the same function.
    pub fn same_function(&self, other: &Self) -> bool {
        self == other
    }
}

impl fmt::Display for FrameSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn bounded_name(name: &str) -> &str {
    if name.len() <= MAX_SYMBOL_NAME_LEN {
        return name;
    }
    let mut end = MAX_SYMBOL_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

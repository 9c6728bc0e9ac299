// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Object layout and the bump allocator that constructs objects at runtime.

use snek_frontend::{Literal, VarDef};

use crate::abi;
use crate::emit::Instr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    pub name: String,
    pub offset: i32,
    pub default: Literal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLayout {
    pub name: String,
    pub fields: Vec<FieldSlot>,
}

impl ClassLayout {
    /// Fields are laid out in declaration order after the header word.
    pub fn new(name: &str, fields: &[VarDef]) -> Self {
        let fields = fields
            .iter()
            .zip(0..)
            .map(|(f, index): (&VarDef, i32)| FieldSlot {
                name: f.name.clone(),
                offset: abi::HEADER_BYTES + abi::WORD_BYTES * index,
                default: f.value,
            })
            .collect();
        Self {
            name: name.to_string(),
            fields,
        }
    }

    pub fn offset_of(&self, field: &str) -> Option<i32> {
        self.fields.iter().find(|f| f.name == field).map(|f| f.offset)
    }

    pub fn size_bytes(&self) -> i32 {
        abi::HEADER_BYTES + abi::WORD_BYTES * self.fields.len() as i32
    }
}

pub fn literal_value(lit: Literal) -> i32 {
    match lit {
        Literal::None | Literal::False => 0,
        Literal::True => 1,
        Literal::Number(n) => n,
    }
}

/// Owner of the heap pointer global. Allocation never frees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapAllocator {
    pointer: &'static str,
    start: i32,
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self {
            pointer: abi::HEAP_PTR,
            start: abi::HEAP_START,
        }
    }
}

impl HeapAllocator {
    pub fn declaration(&self) -> String {
        format!("(global {} (mut i32) (i32.const {}))", self.pointer, self.start)
    }

    /// Leaves the address of a fresh, initialized instance on the stack.
    ///
    /// Defaults are stored and the pointer is bumped past the object *before*
    /// `__init__` runs, so objects allocated by the constructor never overlap it.
    pub fn construct(&self, layout: &ClassLayout) -> Vec<Instr> {
        let mut out = Vec::with_capacity(layout.fields.len() * 5 + 10);
        for field in &layout.fields {
            out.push(Instr::global_get(self.pointer));
            out.push(Instr::i32_const(field.offset));
            out.push(Instr::op("i32.add"));
            out.push(Instr::i32_const(literal_value(field.default)));
            out.push(Instr::op("i32.store"));
        }

        out.push(Instr::global_get(self.pointer));
        out.push(Instr::local_set(abi::ALLOC_LOCAL));

        out.push(Instr::global_get(self.pointer));
        out.push(Instr::i32_const(layout.size_bytes()));
        out.push(Instr::op("i32.add"));
        out.push(Instr::global_set(self.pointer));

        out.push(Instr::local_get(abi::ALLOC_LOCAL));
        out.push(Instr::call(&abi::method_symbol(&layout.name, snek_frontend::typechecker::INIT)));
        out.push(Instr::op("drop"));
        out.push(Instr::local_get(abi::ALLOC_LOCAL));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snek_frontend::Type;

    fn field(name: &str, value: Literal) -> VarDef {
        VarDef {
            name: name.into(),
            ty: Type::Int,
            value,
        }
    }

    #[test]
    fn fields_follow_the_header() {
        let fields = [field("n", Literal::Number(456)), field("d", Literal::Number(789))];
        let layout = ClassLayout::new("Rat", &fields);
        assert_eq!(layout.offset_of("n"), Some(4));
        assert_eq!(layout.offset_of("d"), Some(8));
        assert_eq!(layout.offset_of("x"), None);
        assert_eq!(layout.size_bytes(), 12);
    }

    #[test]
    fn pointer_is_bumped_before_the_constructor_runs() {
        let layout = ClassLayout::new("P", &[field("x", Literal::True)]);
        let code = HeapAllocator::default().construct(&layout);
        let bump = code
            .iter()
            .position(|i| *i == Instr::global_set(abi::HEAP_PTR))
            .unwrap();
        let init = code.iter().position(|i| *i == Instr::call("$P$__init__")).unwrap();
        assert!(bump < init);
        assert_eq!(code.last(), Some(&Instr::local_get(abi::ALLOC_LOCAL)));
        assert!(code.contains(&Instr::i32_const(1)));
    }
}

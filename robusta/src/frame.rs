//! Per-call activation records: the operand stack, the local-variable slots,
//! and the frame itself.
//!
//! The operand stack has a fixed capacity (the method's `max_stack`) and an
//! explicit top-of-stack index with the invariant `-1 <= tos < capacity`.
//! Violating it is a fault that kills the thread; it is never surfaced to
//! Java code.

use std::sync::Arc;

use robusta_base::class::{ClData, MethodRec};
use robusta_base::classfile::parser::ExceptionTableEntry;
use robusta_base::classfile::CPool;
use robusta_base::string_pool::NameIndex;

use crate::value::JvmValue;
use crate::FatalError;

/// Operand stack with explicit top-of-stack index.
#[derive(Debug, Clone)]
pub struct OpStack {
    slots: Vec<JvmValue>,
    tos: i32,
}

impl OpStack {
    #[must_use]
    pub fn new(max_stack: u16) -> OpStack {
        OpStack {
            slots: vec![JvmValue::Null; usize::from(max_stack)],
            tos: -1,
        }
    }

    /// Current top-of-stack index; -1 when empty.
    #[must_use]
    pub fn tos(&self) -> i32 {
        self.tos
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tos < 0
    }

    pub fn push(&mut self, value: impl Into<JvmValue>) -> Result<(), FatalError> {
        let next = self.tos + 1;
        if next >= self.slots.len() as i32 {
            return Err(FatalError::OperandStackOverflow);
        }
        self.tos = next;
        self.slots[next as usize] = value.into();
        Ok(())
    }

    pub fn pop(&mut self) -> Result<JvmValue, FatalError> {
        if self.tos < 0 {
            return Err(FatalError::OperandStackUnderflow);
        }
        let value = self.slots[self.tos as usize];
        self.tos -= 1;
        Ok(value)
    }

    /// Discard every value; used when control transfers to an exception
    /// handler.
    pub fn clear(&mut self) {
        self.tos = -1;
    }

    pub fn peek(&self) -> Result<JvmValue, FatalError> {
        if self.tos < 0 {
            return Err(FatalError::OperandStackUnderflow);
        }
        Ok(self.slots[self.tos as usize])
    }

    /// Peek `depth` slots below the top (0 = top).
    pub fn peek_at(&self, depth: i32) -> Result<JvmValue, FatalError> {
        let index = self.tos - depth;
        if index < 0 {
            return Err(FatalError::OperandStackUnderflow);
        }
        Ok(self.slots[index as usize])
    }

    pub fn pop_int(&mut self) -> Result<i64, FatalError> {
        self.pop()?
            .into_int()
            .ok_or(FatalError::ExpectedStackInt)
    }

    pub fn pop_long(&mut self) -> Result<i64, FatalError> {
        self.pop()?
            .into_long()
            .ok_or(FatalError::ExpectedStackLong)
    }

    pub fn pop_float(&mut self) -> Result<f64, FatalError> {
        self.pop()?
            .into_float()
            .ok_or(FatalError::ExpectedStackFloat)
    }

    pub fn pop_double(&mut self) -> Result<f64, FatalError> {
        self.pop()?
            .into_double()
            .ok_or(FatalError::ExpectedStackDouble)
    }

    /// Pop a reference; `None` is null.
    pub fn pop_ref(&mut self) -> Result<Option<crate::heap::ObjRef>, FatalError> {
        self.pop()?
            .into_reference()
            .ok_or(FatalError::ExpectedStackReference)
    }
}

/// One local-variable slot. Longs and doubles occupy the slot they were
/// stored at plus a `Top` continuation at the next index, preserving the
/// two-slot numbering compiled code assumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Local {
    Empty,
    /// The upper half of a long/double stored at the previous index.
    Top,
    Value(JvmValue),
}

#[derive(Debug, Clone, Default)]
pub struct Locals {
    slots: Vec<Local>,
}

impl Locals {
    #[must_use]
    pub fn new(max_locals: u16) -> Locals {
        Locals {
            slots: vec![Local::Empty; usize::from(max_locals)],
        }
    }

    /// Build the callee's locals from popped arguments, expanding category-2
    /// values to their two-slot form and padding to `max_locals`.
    #[must_use]
    pub fn from_args(args: Vec<JvmValue>, max_locals: u16) -> Locals {
        let mut locals = Locals::default();
        for arg in args {
            locals.push_transform(arg);
        }
        if locals.slots.len() < usize::from(max_locals) {
            locals.slots.resize(usize::from(max_locals), Local::Empty);
        }
        locals
    }

    /// Append a value, adding the `Top` continuation for category-2 values.
    pub fn push_transform(&mut self, value: JvmValue) {
        let is_cat2 = value.is_category_2();
        self.slots.push(Local::Value(value));
        if is_cat2 {
            self.slots.push(Local::Top);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: u16) -> Option<&Local> {
        self.slots.get(usize::from(index))
    }

    /// Read the value at a slot; `Empty` and `Top` slots are faults.
    pub fn load(&self, index: u16) -> Result<JvmValue, FatalError> {
        match self.get(index) {
            Some(Local::Value(value)) => Ok(*value),
            _ => Err(FatalError::ExpectedLocalValue(index)),
        }
    }

    /// Store a value at a slot, marking the continuation slot for category-2
    /// values. Grows the slot vector if compiled maxima were undersized.
    pub fn store(&mut self, index: u16, value: JvmValue) {
        let index = usize::from(index);
        let needed = index + if value.is_category_2() { 2 } else { 1 };
        if self.slots.len() < needed {
            self.slots.resize(needed, Local::Empty);
        }
        let is_cat2 = value.is_category_2();
        self.slots[index] = Local::Value(value);
        if is_cat2 {
            self.slots[index + 1] = Local::Top;
        }
    }
}

/// Activation record of one in-progress method call.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Interned name of the class declaring the method.
    pub class: NameIndex,
    /// Interned method name.
    pub method: NameIndex,
    pub descriptor: String,
    /// The class record owning the bytecode and the constant pool.
    pub cldata: Arc<ClData>,
    pub method_index: usize,
    pub pc: usize,
    pub locals: Locals,
    pub stack: OpStack,
    /// Owning thread id. Frames never migrate between threads.
    pub thread: u64,
    /// While an invoke is outstanding, the width of that invoke
    /// instruction. The PC stays on the invoke (so exception tables match)
    /// and advances by this amount when the callee returns.
    pub return_pc_advance: usize,
}

impl Frame {
    #[must_use]
    pub fn new(
        class: NameIndex,
        method: NameIndex,
        descriptor: String,
        cldata: Arc<ClData>,
        method_index: usize,
        locals: Locals,
        thread: u64,
    ) -> Frame {
        let max_stack = cldata.methods[method_index]
            .code
            .as_ref()
            .map_or(0, |code| code.max_stack);
        Frame {
            class,
            method,
            descriptor,
            cldata,
            method_index,
            pc: 0,
            locals,
            stack: OpStack::new(max_stack),
            thread,
            return_pc_advance: 0,
        }
    }

    #[must_use]
    pub fn method_rec(&self) -> &MethodRec {
        &self.cldata.methods[self.method_index]
    }

    /// The method's bytecode; empty for methods without a body.
    #[must_use]
    pub fn bytecode(&self) -> &[u8] {
        self.method_rec()
            .code
            .as_ref()
            .map_or(&[], |code| code.code.as_slice())
    }

    #[must_use]
    pub fn exception_table(&self) -> &[ExceptionTableEntry] {
        self.method_rec()
            .code
            .as_ref()
            .map_or(&[], |code| code.exception_table.as_slice())
    }

    #[must_use]
    pub fn cp(&self) -> &CPool {
        &self.cldata.cp
    }

    /// Test scaffolding: a frame over raw bytecode with generous maxima,
    /// attached to no real class.
    #[cfg(test)]
    pub(crate) fn with_code(code: Vec<u8>) -> Frame {
        use robusta_base::access_flags::MethodAccessFlags;
        use robusta_base::class::MethodRec;
        use robusta_base::classfile::parser::CodeAttribute;

        let mut cldata = ClData::synthesized(0, 0, Vec::new());
        cldata.methods.push(MethodRec {
            name: "test".to_owned(),
            descriptor: "()V".to_owned(),
            access_flags: MethodAccessFlags::STATIC,
            code: Some(CodeAttribute {
                max_stack: 32,
                max_locals: 16,
                code,
                exception_table: Vec::new(),
                attributes: Vec::new(),
            }),
            attributes: Vec::new(),
        });

        Frame::new(
            0,
            0,
            "()V".to_owned(),
            Arc::new(cldata),
            0,
            Locals::new(16),
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tos_tracks_push_and_pop() {
        let mut stack = OpStack::new(4);
        assert_eq!(stack.tos(), -1);
        stack.push(JvmValue::Int(34)).unwrap();
        stack.push(JvmValue::Int(21)).unwrap();
        assert_eq!(stack.tos(), 1);
        assert_eq!(stack.pop().unwrap(), JvmValue::Int(21));
        assert_eq!(stack.tos(), 0);
    }

    #[test]
    fn underflow_and_overflow_are_faults() {
        let mut stack = OpStack::new(1);
        assert_eq!(stack.pop(), Err(FatalError::OperandStackUnderflow));
        assert_eq!(stack.peek(), Err(FatalError::OperandStackUnderflow));
        stack.push(JvmValue::Int(1)).unwrap();
        assert_eq!(
            stack.push(JvmValue::Int(2)),
            Err(FatalError::OperandStackOverflow)
        );
    }

    #[test]
    fn category_2_locals_take_two_slots() {
        let mut locals = Locals::new(4);
        locals.store(1, JvmValue::Long(7));
        assert_eq!(locals.load(1).unwrap(), JvmValue::Long(7));
        assert_eq!(locals.get(2), Some(&Local::Top));
        assert!(locals.load(2).is_err());
    }

    #[test]
    fn args_expand_into_slots() {
        let locals = Locals::from_args(
            vec![JvmValue::Int(1), JvmValue::Double(2.0), JvmValue::Int(3)],
            8,
        );
        assert_eq!(locals.load(0).unwrap(), JvmValue::Int(1));
        assert_eq!(locals.load(1).unwrap(), JvmValue::Double(2.0));
        assert_eq!(locals.get(2), Some(&Local::Top));
        assert_eq!(locals.load(3).unwrap(), JvmValue::Int(3));
        assert_eq!(locals.len(), 8);
    }
}

// PairVM Machine Storage
// Operand stack, global memory bank and return stack

use crate::error::{FatalError, HaltReason, VmResult};

use super::value::Value;

/// Fixed-capacity operand stack. Overflow and underflow are fatal.
#[derive(Debug, Clone)]
pub struct OperandStack {
    values: Vec<Value>,
    capacity: usize,
}

impl OperandStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: Value) -> VmResult<()> {
        if self.values.len() >= self.capacity {
            return Err(FatalError::StackOverflow {
                capacity: self.capacity,
            });
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<Value> {
        self.values.pop().ok_or(FatalError::StackUnderflow)
    }

    pub fn peek(&self) -> VmResult<Value> {
        self.values.last().copied().ok_or(FatalError::EmptyStackPeek)
    }

    /// Top of stack, if any, without failing
    pub fn top(&self) -> Option<Value> {
        self.values.last().copied()
    }

    /// Slots `[0, stack_pointer]`, bottom first
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Global memory bank. An empty slot is an invalid one.
#[derive(Debug, Clone)]
pub struct MemoryBank {
    slots: Vec<Option<Value>>,
}

impl MemoryBank {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    fn slot_index(&self, index: i64) -> Option<usize> {
        usize::try_from(index).ok().filter(|i| *i < self.slots.len())
    }

    pub fn store(&mut self, index: i64, value: Value) -> Result<(), HaltReason> {
        let i = self
            .slot_index(index)
            .ok_or(HaltReason::MemoryIndexOutOfRange { index })?;
        self.slots[i] = Some(value);
        Ok(())
    }

    pub fn load(&self, index: i64) -> Result<Value, HaltReason> {
        let i = self
            .slot_index(index)
            .ok_or(HaltReason::MemoryIndexOutOfRange { index })?;
        self.slots[i].ok_or(HaltReason::InvalidLoad { index })
    }

    /// Clear a slot's valid flag. Returns the value it held.
    pub fn invalidate(&mut self, index: i64) -> Option<Value> {
        let i = self.slot_index(index)?;
        self.slots[i].take()
    }

    pub fn is_valid(&self, index: i64) -> bool {
        self.slot_index(index)
            .map_or(false, |i| self.slots[i].is_some())
    }

    /// Values of every valid slot
    pub fn valid_values(&self) -> impl Iterator<Item = Value> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }
}

/// Return addresses pushed by CALL
#[derive(Debug, Clone)]
pub struct ReturnStack {
    addresses: Vec<usize>,
    capacity: usize,
}

impl ReturnStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            addresses: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, address: usize) -> Result<(), HaltReason> {
        if self.addresses.len() >= self.capacity {
            return Err(HaltReason::ReturnStackOverflow);
        }
        self.addresses.push(address);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<usize, HaltReason> {
        self.addresses.pop().ok_or(HaltReason::ReturnStackUnderflow)
    }

    pub fn depth(&self) -> usize {
        self.addresses.len()
    }
}

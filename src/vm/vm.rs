// PairVM Virtual Machine
// Stack-based VM: operand stack, memory bank, return stack and a collected heap
//
// Collection is synchronous: before each instruction the loop checks the
// heap's threshold and, if it has been reached, collects with the current
// stack and memory bank as roots. GC forces the same path.

use tracing::{error, warn};

use crate::bytecode::{Chunk, OpCode};
use crate::config::VmConfig;
use crate::error::{FatalError, HaltReason, VmResult};

use super::gc::{self, CollectionReport, GcStats};
use super::heap::Heap;
use super::object::ObjectKind;
use super::stack::{MemoryBank, OperandStack, ReturnStack};
use super::value::{ObjRef, Value};

/// Execution state. `Halted` and `Faulted` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmState {
    Running,
    Halted(HaltReason),
    Faulted(FatalError),
}

/// What a finished run left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub reason: HaltReason,
    pub top: Option<Value>,
    pub instructions: u64,
}

/// Interrupts raised while executing one instruction
enum Trap {
    Halt(HaltReason),
    Fatal(FatalError),
}

impl From<HaltReason> for Trap {
    fn from(reason: HaltReason) -> Self {
        Trap::Halt(reason)
    }
}

impl From<FatalError> for Trap {
    fn from(err: FatalError) -> Self {
        Trap::Fatal(err)
    }
}

/// Which half of a pair an instruction touches
#[derive(Clone, Copy)]
enum Field {
    Left,
    Right,
}

/// The PairVM Virtual Machine
pub struct VM {
    chunk: Chunk,
    pc: usize,
    stack: OperandStack,
    memory: MemoryBank,
    returns: ReturnStack,
    heap: Heap,
    state: VmState,
    instruction_count: u64,
    /// Whether to print GC statistics when collection runs
    gc_stats_enabled: bool,
}

impl VM {
    pub fn new(chunk: Chunk) -> Self {
        Self::with_config(chunk, &VmConfig::default())
    }

    pub fn with_config(chunk: Chunk, config: &VmConfig) -> Self {
        Self {
            chunk,
            pc: 0,
            stack: OperandStack::new(config.stack_capacity),
            memory: MemoryBank::new(config.memory_size),
            returns: ReturnStack::new(config.return_stack_capacity),
            heap: Heap::new(config),
            state: VmState::Running,
            instruction_count: 0,
            gc_stats_enabled: config.gc_stats,
        }
    }

    /// Enable or disable GC statistics printing
    pub fn set_gc_stats_enabled(&mut self, enabled: bool) {
        self.gc_stats_enabled = enabled;
    }

    pub fn gc_stats_enabled(&self) -> bool {
        self.gc_stats_enabled
    }

    /// Run until the VM halts. A fatal error is returned as `Err` and leaves
    /// the VM faulted.
    pub fn run(&mut self) -> VmResult<RunOutcome> {
        loop {
            match &self.state {
                VmState::Running => {}
                VmState::Halted(reason) => {
                    return Ok(RunOutcome {
                        reason: reason.clone(),
                        top: self.stack.top(),
                        instructions: self.instruction_count,
                    });
                }
                VmState::Faulted(err) => return Err(err.clone()),
            }
            self.step()?;
        }
    }

    /// Execute a single instruction. Does nothing once halted.
    pub fn step(&mut self) -> VmResult<()> {
        match &self.state {
            VmState::Running => {}
            VmState::Halted(_) => return Ok(()),
            VmState::Faulted(err) => return Err(err.clone()),
        }

        self.maybe_collect_garbage();

        match self.execute_one() {
            Ok(()) => Ok(()),
            Err(Trap::Halt(reason)) => {
                if reason.is_error() {
                    warn!(pc = self.pc, %reason, "vm halted");
                }
                self.state = VmState::Halted(reason);
                Ok(())
            }
            Err(Trap::Fatal(err)) => {
                error!(pc = self.pc, %err, "fatal vm error");
                self.state = VmState::Faulted(err.clone());
                Err(err)
            }
        }
    }

    /// Run garbage collection if threshold is reached
    fn maybe_collect_garbage(&mut self) {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    /// Force garbage collection
    pub fn collect_garbage(&mut self) -> CollectionReport {
        self.collect_with_pending(&[])
    }

    /// Collect with `pending` treated as extra roots. Operands already
    /// popped by an allocating instruction are only reachable from here.
    fn collect_with_pending(&mut self, pending: &[Value]) -> CollectionReport {
        let mut roots = gc::enumerate_roots(&self.stack, &self.memory);
        roots.extend_from_slice(pending);
        let report = self.heap.collect(&roots);

        if self.gc_stats_enabled {
            eprintln!("{}", gc::format_collection(self.heap.stats(), &report));
        }
        report
    }

    fn execute_one(&mut self) -> Result<(), Trap> {
        let word = self.fetch()?;
        self.instruction_count += 1;
        let opcode = OpCode::try_from(word).map_err(HaltReason::UnknownOpcode)?;

        match opcode {
            OpCode::Push => {
                let value = self.fetch()?;
                self.stack.push(Value::Int(value))?;
            }

            OpCode::Pop => {
                self.stack.pop()?;
            }

            OpCode::Dup => {
                let value = self.stack.peek()?;
                self.stack.push(value)?;
            }

            OpCode::Add => self.binary_op("ADD", |a, b| Ok(a.wrapping_add(b)))?,
            OpCode::Sub => self.binary_op("SUB", |a, b| Ok(a.wrapping_sub(b)))?,
            OpCode::Mul => self.binary_op("MUL", |a, b| Ok(a.wrapping_mul(b)))?,
            OpCode::Div => self.binary_op("DIV", |a, b| {
                if b == 0 {
                    return Err(HaltReason::DivisionByZero);
                }
                Ok(a.wrapping_div(b))
            })?,
            OpCode::Cmp => self.binary_op("CMP", |a, b| Ok(i64::from(a < b)))?,

            OpCode::Halt => return Err(HaltReason::Requested.into()),

            OpCode::Jmp => {
                let address = self.fetch()?;
                self.jump(address)?;
            }

            OpCode::Jz | OpCode::Jnz => {
                let address = self.fetch()?;
                let op = opcode.name();
                let condition = self.pop_int(op)?;
                if (condition == 0) == (opcode == OpCode::Jz) {
                    self.jump(address)?;
                }
            }

            OpCode::Store => {
                let index = self.fetch()?;
                let value = self.stack.pop()?;
                self.memory.store(index, value)?;
            }

            OpCode::Load => {
                let index = self.fetch()?;
                let value = self.memory.load(index)?;
                self.stack.push(value)?;
            }

            OpCode::Call => {
                let address = self.fetch()?;
                self.returns.push(self.pc)?;
                self.jump(address)?;
            }

            OpCode::Ret => {
                self.pc = self.returns.pop()?;
            }

            OpCode::NewPair => {
                // Right was pushed last
                let right = self.stack.pop()?;
                let left = self.stack.pop()?;
                let pair =
                    self.allocate_object(&[left, right], |heap| heap.allocate_pair(left, right))?;
                self.stack.push(Value::Obj(pair))?;
            }

            OpCode::PairLeft => self.get_field("PAIR_LEFT", Field::Left)?,
            OpCode::PairRight => self.get_field("PAIR_RIGHT", Field::Right)?,
            OpCode::SetLeft => self.set_field("SET_LEFT", Field::Left)?,
            OpCode::SetRight => self.set_field("SET_RIGHT", Field::Right)?,

            OpCode::NewFunction => {
                let entry = self.fetch()?;
                let arity = self.fetch()?;
                let function =
                    self.allocate_object(&[], |heap| heap.allocate_function(entry, arity))?;
                self.stack.push(Value::Obj(function))?;
            }

            OpCode::NewClosure => {
                let environment = self.pop_obj("NEW_CLOSURE")?;
                let function = self.pop_obj("NEW_CLOSURE")?;
                self.expect_kind("NEW_CLOSURE", function, "function", |kind| {
                    matches!(kind, ObjectKind::Function { .. })
                })?;
                let pending = [Value::Obj(function), Value::Obj(environment)];
                let closure = self.allocate_object(&pending, |heap| {
                    heap.allocate_closure(Some(function), Some(environment))
                })?;
                self.stack.push(Value::Obj(closure))?;
            }

            OpCode::Gc => {
                self.collect_garbage();
            }
        }

        Ok(())
    }

    /// Allocate through `alloc`. When the heap is out of room, collect once
    /// and retry before the failure becomes fatal.
    fn allocate_object(
        &mut self,
        pending: &[Value],
        alloc: impl Fn(&mut Heap) -> VmResult<ObjRef>,
    ) -> VmResult<ObjRef> {
        match alloc(&mut self.heap) {
            Err(FatalError::OutOfMemory { .. }) => {
                self.collect_with_pending(pending);
                alloc(&mut self.heap)
            }
            result => result,
        }
    }

    fn fetch(&mut self) -> Result<i64, Trap> {
        let word = self
            .chunk
            .get(self.pc)
            .ok_or(HaltReason::ProgramCounterOutOfRange(self.pc as i64))?;
        self.pc += 1;
        Ok(word)
    }

    fn jump(&mut self, address: i64) -> Result<(), Trap> {
        match usize::try_from(address) {
            Ok(target) if target < self.chunk.len() => {
                self.pc = target;
                Ok(())
            }
            _ => Err(HaltReason::ProgramCounterOutOfRange(address).into()),
        }
    }

    fn binary_op(
        &mut self,
        op: &'static str,
        f: impl FnOnce(i64, i64) -> Result<i64, HaltReason>,
    ) -> Result<(), Trap> {
        let b = self.pop_int(op)?;
        let a = self.pop_int(op)?;
        let result = f(a, b)?;
        self.stack.push(Value::Int(result))?;
        Ok(())
    }

    fn pop_int(&mut self, op: &'static str) -> Result<i64, Trap> {
        let value = self.stack.pop()?;
        value.as_int().ok_or_else(|| {
            HaltReason::TypeMismatch {
                op,
                expected: "integer",
                found: value.type_name(),
            }
            .into()
        })
    }

    fn pop_obj(&mut self, op: &'static str) -> Result<ObjRef, Trap> {
        let value = self.stack.pop()?;
        value.as_obj().ok_or_else(|| {
            HaltReason::TypeMismatch {
                op,
                expected: "object",
                found: value.type_name(),
            }
            .into()
        })
    }

    /// Check the variant behind a handle. A dangling handle is reported as
    /// the wrong variant.
    fn expect_kind(
        &self,
        op: &'static str,
        handle: ObjRef,
        expected: &'static str,
        is_expected: impl Fn(&ObjectKind) -> bool,
    ) -> Result<(), Trap> {
        match self.heap.get(handle) {
            Some(object) if is_expected(&object.kind) => Ok(()),
            Some(object) => Err(HaltReason::WrongVariant {
                op,
                expected,
                found: object.type_name(),
            }
            .into()),
            None => Err(HaltReason::WrongVariant {
                op,
                expected,
                found: "freed",
            }
            .into()),
        }
    }

    fn pop_pair(&mut self, op: &'static str) -> Result<ObjRef, Trap> {
        let handle = self.pop_obj(op)?;
        self.expect_kind(op, handle, "pair", |kind| {
            matches!(kind, ObjectKind::Pair { .. })
        })?;
        Ok(handle)
    }

    fn get_field(&mut self, op: &'static str, field: Field) -> Result<(), Trap> {
        let handle = self.pop_pair(op)?;
        let (left, right) = self.heap.pair(handle).ok_or(HaltReason::WrongVariant {
            op,
            expected: "pair",
            found: "freed",
        })?;
        let value = match field {
            Field::Left => left,
            Field::Right => right,
        };
        self.stack.push(value)?;
        Ok(())
    }

    fn set_field(&mut self, op: &'static str, field: Field) -> Result<(), Trap> {
        let value = self.stack.pop()?;
        let handle = self.pop_pair(op)?;
        if let Some(object) = self.heap.get_mut(handle) {
            if let ObjectKind::Pair { left, right } = &mut object.kind {
                match field {
                    Field::Left => *left = value,
                    Field::Right => *right = value,
                }
            }
        }
        self.stack.push(Value::Obj(handle))?;
        Ok(())
    }

    /// Push a value from the host
    pub fn push(&mut self, value: Value) -> VmResult<()> {
        self.stack.push(value)
    }

    /// Pop a value from the host
    pub fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop()
    }

    pub fn state(&self) -> &VmState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == VmState::Running
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn memory(&self) -> &MemoryBank {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryBank {
        &mut self.memory
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Get GC statistics
    pub fn gc_stats(&self) -> &GcStats {
        self.heap.stats()
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new(Chunk::new())
    }
}

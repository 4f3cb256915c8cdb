pub mod gc;
pub mod heap;
pub mod object;
pub mod stack;
pub mod value;
pub mod vm;

pub use gc::{CollectionReport, GcStats};
pub use heap::Heap;
pub use object::{HeapObject, ObjectKind};
pub use stack::{MemoryBank, OperandStack, ReturnStack};
pub use value::{ObjRef, Value};
pub use vm::{RunOutcome, VmState, VM};

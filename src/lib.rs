// PairVM
// A stack-based bytecode VM with a mark-and-sweep collected heap

pub mod bytecode;
pub mod config;
pub mod error;
pub mod report;
pub mod vm;

pub use bytecode::{Chunk, OpCode};
pub use config::VmConfig;
pub use error::{ConfigError, FatalError, HaltReason, LoadError, VmResult};
pub use vm::{Heap, ObjRef, Value, VM};

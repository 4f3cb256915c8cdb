pub mod chunk;
pub mod loader;
pub mod opcode;

pub use chunk::Chunk;
pub use opcode::OpCode;

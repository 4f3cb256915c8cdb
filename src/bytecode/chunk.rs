// PairVM Bytecode Chunk
// A flat sequence of program words: opcodes followed by their immediates

use std::fmt::Write;

use super::opcode::OpCode;

/// A program. Execution starts at word 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunk {
    pub code: Vec<i64>,
}

impl Chunk {
    pub fn new() -> Self {
        Self { code: Vec::new() }
    }

    pub fn from_code(code: Vec<i64>) -> Self {
        Self { code }
    }

    /// Write a single word
    pub fn write(&mut self, word: i64) -> &mut Self {
        self.code.push(word);
        self
    }

    /// Write an opcode
    pub fn write_op(&mut self, op: OpCode) -> &mut Self {
        self.write(op.into())
    }

    /// Write an opcode and its immediates
    pub fn emit(&mut self, op: OpCode, operands: &[i64]) -> &mut Self {
        debug_assert_eq!(operands.len(), op.operand_count());
        self.write_op(op);
        for operand in operands {
            self.write(*operand);
        }
        self
    }

    pub fn get(&self, address: usize) -> Option<i64> {
        self.code.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Current write offset, used as a jump target
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Disassemble the whole chunk
    pub fn disassemble(&self, name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- {} ---", name);
        let _ = writeln!(out, "{} words", self.code.len());
        let mut offset = 0;
        while offset < self.code.len() {
            offset = self.disassemble_instruction(offset, &mut out);
        }
        out
    }

    /// Disassemble the instruction at `offset`, returning the next offset
    pub fn disassemble_instruction(&self, offset: usize, out: &mut String) -> usize {
        let Some(&word) = self.code.get(offset) else {
            return offset;
        };
        let op = match OpCode::try_from(word) {
            Ok(op) => op,
            Err(unknown) => {
                let _ = writeln!(out, "{:04} .word {}", offset, unknown);
                return offset + 1;
            }
        };

        let _ = write!(out, "{:04} {:<12}", offset, op.name());
        let mut next = offset + 1;
        for _ in 0..op.operand_count() {
            match self.code.get(next) {
                Some(operand) => {
                    let _ = write!(out, " {}", operand);
                }
                None => {
                    let _ = write!(out, " <missing>");
                }
            }
            next += 1;
        }
        out.push('\n');
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_layout() {
        let mut chunk = Chunk::new();
        chunk
            .emit(OpCode::Push, &[10])
            .emit(OpCode::Push, &[20])
            .emit(OpCode::NewPair, &[])
            .emit(OpCode::Halt, &[]);
        assert_eq!(chunk.code, vec![0x01, 10, 0x01, 20, 0x50, 0xff]);
        assert_eq!(chunk.current_offset(), 6);
    }

    #[test]
    fn test_disassemble() {
        let chunk = Chunk::from_code(vec![0x01, 7, 0x30, 0, 0x55, 40, 2, 0x77, 0x20]);
        let text = chunk.disassemble("test");
        assert!(text.contains("0000 PUSH         7"));
        assert!(text.contains("0002 STORE        0"));
        assert!(text.contains("0004 NEW_FUNCTION 40 2"));
        assert!(text.contains("0007 .word 119"));
        assert!(text.contains("0008 JMP          <missing>"));
    }

    #[test]
    fn test_disassemble_past_end() {
        let chunk = Chunk::from_code(vec![0xff]);
        let mut out = String::new();
        assert_eq!(chunk.disassemble_instruction(1, &mut out), 1);
        assert_eq!(chunk.disassemble_instruction(40, &mut out), 40);
        assert!(out.is_empty());
    }
}

// PairVM Bytecode Instructions

/// Bytecode operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations
    Push = 0x01, // Push immediate integer
    Pop = 0x02,  // Pop top of stack
    Dup = 0x03,  // Duplicate top of stack

    // Arithmetic
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Cmp = 0x14, // a < b ? 1 : 0

    // Control flow
    Jmp = 0x20,
    Jz = 0x21,
    Jnz = 0x22,

    // Memory bank
    Store = 0x30,
    Load = 0x31,

    // Subroutines
    Call = 0x40,
    Ret = 0x41,

    // Heap objects
    NewPair = 0x50,
    PairLeft = 0x51,
    PairRight = 0x52,
    SetLeft = 0x53,
    SetRight = 0x54,
    NewFunction = 0x55, // operands: entry, arity
    NewClosure = 0x56,  // [function, env] -> closure

    // Collector
    Gc = 0x60, // Force a collection

    Halt = 0xff,
}

const ALL: [OpCode; 24] = [
    OpCode::Push,
    OpCode::Pop,
    OpCode::Dup,
    OpCode::Add,
    OpCode::Sub,
    OpCode::Mul,
    OpCode::Div,
    OpCode::Cmp,
    OpCode::Jmp,
    OpCode::Jz,
    OpCode::Jnz,
    OpCode::Store,
    OpCode::Load,
    OpCode::Call,
    OpCode::Ret,
    OpCode::NewPair,
    OpCode::PairLeft,
    OpCode::PairRight,
    OpCode::SetLeft,
    OpCode::SetRight,
    OpCode::NewFunction,
    OpCode::NewClosure,
    OpCode::Gc,
    OpCode::Halt,
];

impl OpCode {
    /// Number of immediate words following the opcode
    pub fn operand_count(&self) -> usize {
        match self {
            OpCode::Push
            | OpCode::Jmp
            | OpCode::Jz
            | OpCode::Jnz
            | OpCode::Store
            | OpCode::Load
            | OpCode::Call => 1,
            OpCode::NewFunction => 2,
            _ => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Cmp => "CMP",
            OpCode::Jmp => "JMP",
            OpCode::Jz => "JZ",
            OpCode::Jnz => "JNZ",
            OpCode::Store => "STORE",
            OpCode::Load => "LOAD",
            OpCode::Call => "CALL",
            OpCode::Ret => "RET",
            OpCode::NewPair => "NEW_PAIR",
            OpCode::PairLeft => "PAIR_LEFT",
            OpCode::PairRight => "PAIR_RIGHT",
            OpCode::SetLeft => "SET_LEFT",
            OpCode::SetRight => "SET_RIGHT",
            OpCode::NewFunction => "NEW_FUNCTION",
            OpCode::NewClosure => "NEW_CLOSURE",
            OpCode::Gc => "GC",
            OpCode::Halt => "HALT",
        }
    }

    /// Look up a mnemonic, ignoring case
    pub fn from_name(name: &str) -> Option<OpCode> {
        ALL.iter()
            .copied()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }
}

impl TryFrom<i64> for OpCode {
    type Error = i64;

    fn try_from(word: i64) -> Result<Self, Self::Error> {
        ALL.iter()
            .copied()
            .find(|op| *op as i64 == word)
            .ok_or(word)
    }
}

impl From<OpCode> for i64 {
    fn from(op: OpCode) -> Self {
        op as u8 as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_encoding() {
        assert_eq!(OpCode::try_from(0x50), Ok(OpCode::NewPair));
        assert_eq!(OpCode::try_from(0xff), Ok(OpCode::Halt));
        assert_eq!(OpCode::try_from(0x99), Err(0x99));
        assert_eq!(OpCode::try_from(-1), Err(-1));
        assert_eq!(i64::from(OpCode::Gc), 0x60);
    }

    #[test]
    fn test_mnemonics() {
        for op in ALL {
            assert_eq!(OpCode::from_name(op.name()), Some(op));
        }
        assert_eq!(OpCode::from_name("new_pair"), Some(OpCode::NewPair));
        assert_eq!(OpCode::from_name("FROB"), None);
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(OpCode::Push.operand_count(), 1);
        assert_eq!(OpCode::NewFunction.operand_count(), 2);
        assert_eq!(OpCode::NewPair.operand_count(), 0);
    }
}

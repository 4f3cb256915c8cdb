// PairVM Error Handling
// Two severities: fatal errors end the host, halts stop only the VM

use thiserror::Error;

/// Unrecoverable failures. The VM is left unusable and the host is expected
/// to terminate (the `pairvm` binary exits with status 1).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error("Stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Stack is empty")]
    EmptyStackPeek,

    #[error("Out of memory ({live} live objects)")]
    OutOfMemory { live: usize },
}

/// Why a VM stopped. Everything except `Requested` is a runtime error the
/// host can report before inspecting the final stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HaltReason {
    #[error("halted")]
    Requested,

    #[error("division by zero")]
    DivisionByZero,

    #[error("{op} expects {expected}, got {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{op} expects {expected} object, got {found}")]
    WrongVariant {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("memory index {index} out of range")]
    MemoryIndexOutOfRange { index: i64 },

    #[error("load from invalid memory slot {index}")]
    InvalidLoad { index: i64 },

    #[error("return stack overflow")]
    ReturnStackOverflow,

    #[error("return stack underflow")]
    ReturnStackUnderflow,

    #[error("unknown instruction {0}")]
    UnknownOpcode(i64),

    #[error("program counter {0} out of range")]
    ProgramCounterOutOfRange(i64),
}

impl HaltReason {
    /// True for anything other than an explicit HALT.
    pub fn is_error(&self) -> bool {
        !matches!(self, HaltReason::Requested)
    }
}

/// Problems reading a program from disk or text.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: invalid token '{token}'")]
    InvalidToken { line: usize, token: String },

    #[error("invalid binary program: bad magic")]
    BadMagic,

    #[error("unsupported binary program version {0}")]
    UnsupportedVersion(u8),

    #[error("binary program truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
}

/// Problems building a `VmConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for VM operations that can fail fatally
pub type VmResult<T> = Result<T, FatalError>;

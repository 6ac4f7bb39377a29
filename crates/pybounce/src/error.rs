use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Type error: expected {expected}, got {got}")]
    Type { expected: String, got: String },

    #[error("Name error: '{0}' is not defined")]
    NameError(String),

    #[error("KeyError: '{0}'")]
    KeyError(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Instruction limit exceeded: {0} instructions")]
    InstructionLimitExceeded(u64),

    #[error("Recursion limit exceeded: depth {0}")]
    RecursionLimitExceeded(usize),
}

impl Error {
    /// Whether `try`/`except` in executed code may intercept this error.
    /// Resource-limit errors always propagate to the host.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            Error::InstructionLimitExceeded(_) | Error::RecursionLimitExceeded(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

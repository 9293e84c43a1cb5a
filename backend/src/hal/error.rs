/// Failures reported by the HE capability layer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HeError {
    #[error("invalid encryption parameters: {0}")]
    InvalidParams(String),
    #[error("batch of {len} values exceeds {slots} slots")]
    BatchTooLarge { len: usize, slots: usize },
    #[error("slot count mismatch: expected {expected}, found {found}")]
    SlotMismatch { expected: usize, found: usize },
    #[error("operand bound to key {found:#018x}, expected {expected:#018x}")]
    KeyMismatch { expected: u64, found: u64 },
    #[error("no Galois key for rotation step {step}")]
    MissingGaloisKey { step: i64 },
    #[error("{op} requires a size-2 ciphertext, found size {size}")]
    UnsupportedSize { op: &'static str, size: usize },
    #[error("{op} operands differ in size: {left} and {right}")]
    SizeMismatch { op: &'static str, left: usize, right: usize },
    #[error("noise budget exhausted during {op} ({remaining} bits left on input)")]
    NoiseBudgetExhausted { op: &'static str, remaining: u32 },
    #[error("backend failure: {0}")]
    Backend(String),
}

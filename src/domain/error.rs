// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Typed failures that callers may want to match on.
// Everything else travels as anyhow::Error with context.
//
//   configuration — missing tokenizer, missing checkpoint
//   contract      — malformed batches or dataset lines

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummError {
    #[error("decoding requires a tokenizer, but none was configured (pass --tokenizer)")]
    MissingTokenizer,

    #[error("checkpoint not found at '{}'", .0.display())]
    MissingCheckpoint(PathBuf),

    #[error("a batch must contain exactly 8 tensors, got {0}")]
    BatchArity(usize),

    #[error("tensor '{name}' has batch dimension {found}, expected {expected}")]
    BatchDimMismatch {
        name:     &'static str,
        expected: usize,
        found:    usize,
    },

    #[error("invalid sample at {}:{line}: {reason}", path.display())]
    InvalidSample {
        path:   PathBuf,
        line:   usize,
        reason: String,
    },
}

// ============================================================
// Layer 3 — Parameter Ownership Vocabulary
// ============================================================
// Plain enums describing which optimizer owns a parameter:
//
//   Phase       — phase1 (BERT-style encoder) or phase2 (decoder)
//   DecayClass  — whether AdamW weight decay is applied
//   StepInterval— when a phase's learning-rate schedule advances
//
// The ml layer maps every model parameter onto a
// (Phase, DecayClass) pair once, right after the model is built.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two independently optimized halves of the summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Pretrained-style encoder, small learning rate
    Phase1,
    /// Freshly initialised decoder, large learning rate
    Phase2,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Phase1 => write!(f, "phase1"),
            Phase::Phase2 => write!(f, "phase2"),
        }
    }
}

/// Whether a parameter receives weight decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecayClass {
    Decay,
    /// Biases and normalisation scales/shifts
    NoDecay,
}

impl DecayClass {
    /// Rank-1 parameters are biases or normalisation gamma/beta;
    /// everything with two or more dimensions is a weight matrix
    /// or an embedding table.
    pub fn for_rank(rank: usize) -> Self {
        if rank <= 1 {
            DecayClass::NoDecay
        } else {
            DecayClass::Decay
        }
    }
}

/// Cadence at which a learning-rate schedule advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepInterval {
    /// Once per optimizer step
    Step,
    /// Once per completed epoch
    Epoch,
}

impl fmt::Display for StepInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepInterval::Step  => write!(f, "step"),
            StepInterval::Epoch => write!(f, "epoch"),
        }
    }
}

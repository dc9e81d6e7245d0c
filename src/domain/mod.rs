// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define what the
// summarization trainer works with.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain data, vocabulary enums and traits

// A tokenized source/summary pair
pub mod sample;

// Phase / decay-class / schedule-cadence vocabulary
pub mod params;

// Typed errors for configuration and contract violations
pub mod error;

// Abstractions over data sources and tokenizers
pub mod traits;

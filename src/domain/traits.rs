// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Seams between the training core and its collaborators:
//
//   SampleSource — where tokenized examples come from
//                  (JsonlLoader reads <data_dir>/<split>.jsonl)
//   TokenDecoder — turns predicted ids back into text
//                  (implemented for tokenizers::Tokenizer)
//
// The ml layer only sees these traits, so tests can plug in
// tiny in-memory implementations.

use anyhow::Result;

use crate::domain::sample::SummSample;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce tokenized summarization samples.
pub trait SampleSource {
    /// Load every sample of the named split ("train", "val", "test").
    fn load_split(&self, split: &str) -> Result<Vec<SummSample>>;
}

// ─── TokenDecoder ─────────────────────────────────────────────────────────────
/// Any component that can decode a token id sequence into text.
pub trait TokenDecoder: Send + Sync {
    fn decode_ids(&self, ids: &[u32]) -> Result<String>;
}

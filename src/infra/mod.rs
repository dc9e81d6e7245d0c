// ============================================================
// Layer 6 — Infrastructure
// ============================================================
// Everything that touches the filesystem outside the dataset:
//
//   checkpoint.rs      — weights, config and trainer state
//   tokenizer_store.rs — loads tokenizer.json, implements TokenDecoder
//   metrics.rs         — per-epoch CSV log

pub mod checkpoint;

pub mod tokenizer_store;

pub mod metrics;

// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from tokenized JSON-lines files to tensor batches.
//
//   <data_dir>/<split>.jsonl
//       │
//       ▼
//   JsonlLoader   → parses one SummSample per line
//       │
//       ▼
//   SummDataset   → implements Burn's Dataset trait
//       │
//       ▼
//   SummBatcher   → pads samples into the 8-tensor SummBatch
//       │
//       ▼
//   DataLoader    → feeds batches to the training loop

/// Reads `<split>.jsonl` files into SummSamples
pub mod loader;

/// Implements Burn's Dataset trait for summarization samples
pub mod dataset;

/// Implements Burn's Batcher trait to create 8-tensor batches
pub mod batcher;

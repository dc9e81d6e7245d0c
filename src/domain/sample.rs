// ============================================================
// Layer 3 — SummSample Domain Type
// ============================================================
// One pre-tokenized summarization example: the source document
// and its reference summary, both already converted to token ids.
//
// Token types and CLS positions are optional on disk. Missing
// token types default to segment 0 when the batch is built.
//
// Example (one JSON line):
//   {"src_ids": [0, 512, 77, 2], "src_cls_pos": [0],
//    "tgt_ids": [0, 91, 2]}

use serde::{Deserialize, Serialize};

/// A tokenized source/summary pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummSample {
    /// Source document token ids
    pub src_ids: Vec<u32>,

    /// Segment id per source token (BERT interval segments)
    #[serde(default)]
    pub src_token_type: Vec<u32>,

    /// Index of every sentence-boundary [CLS] token in the source
    #[serde(default)]
    pub src_cls_pos: Vec<u32>,

    /// Reference summary token ids
    pub tgt_ids: Vec<u32>,

    #[serde(default)]
    pub tgt_token_type: Vec<u32>,

    #[serde(default)]
    pub tgt_cls_pos: Vec<u32>,
}

impl SummSample {
    /// Build a sample from source and target ids only.
    pub fn new(src_ids: Vec<u32>, tgt_ids: Vec<u32>) -> Self {
        Self {
            src_ids,
            src_token_type: Vec::new(),
            src_cls_pos:    Vec::new(),
            tgt_ids,
            tgt_token_type: Vec::new(),
            tgt_cls_pos:    Vec::new(),
        }
    }

    /// Check that every id indexes an embedding table of the given
    /// sizes. Returns a description of the first offending field.
    pub fn check_ranges(&self, vocab_size: usize, type_vocab_size: usize) -> Result<(), String> {
        let fields = [
            ("src_ids", &self.src_ids, vocab_size),
            ("tgt_ids", &self.tgt_ids, vocab_size),
            ("src_token_type", &self.src_token_type, type_vocab_size),
            ("tgt_token_type", &self.tgt_token_type, type_vocab_size),
        ];
        for (name, ids, limit) in fields {
            if let Some((pos, id)) = ids.iter().enumerate().find(|&(_, &id)| id as usize >= limit) {
                return Err(format!("{name}[{pos}] = {id} is outside 0..{limit}"));
            }
        }
        Ok(())
    }
}

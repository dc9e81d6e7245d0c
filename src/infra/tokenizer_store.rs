// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the HuggingFace tokenizer.json the samples were encoded
// with, and adapts it to the TokenDecoder trait used by
// SummTask::predict_step.
//
// --tokenizer may point at the file itself or at a directory
// containing tokenizer.json (e.g. the checkpoint directory).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::domain::traits::TokenDecoder;

pub struct TokenizerStore;

impl TokenizerStore {
    /// Resolve a file or directory argument to the tokenizer.json path.
    pub fn resolve(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join("tokenizer.json")
        } else {
            path.to_path_buf()
        }
    }

    /// Load a tokenizer from a tokenizer.json file or its directory.
    pub fn load(path: &Path) -> Result<Tokenizer> {
        let path = Self::resolve(path);
        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Cannot load tokenizer from '{}'", path.display()))?;
        tracing::info!(
            "Loaded tokenizer from '{}' ({} tokens)",
            path.display(),
            tokenizer.get_vocab_size(true)
        );
        Ok(tokenizer)
    }
}

/// Special tokens are kept in the output, so padding positions show
/// up as the pad token.
impl TokenDecoder for Tokenizer {
    fn decode_ids(&self, ids: &[u32]) -> Result<String> {
        self.decode(ids, false)
            .map_err(|e| anyhow::anyhow!("Tokenizer decode error: {e}"))
    }
}

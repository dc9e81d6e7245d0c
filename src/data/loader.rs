// ============================================================
// Layer 4 — JSON-Lines Sample Loader
// ============================================================
// Reads pre-tokenized samples from a data directory laid out as
//
//   <data_dir>/
//     train.jsonl
//     val.jsonl
//     test.jsonl
//
// Each non-blank line is one SummSample serialised as JSON.
// A malformed line aborts the load with its file and line number,
// as does an id outside the model's vocabulary when limits are set.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::error::SummError;
use crate::domain::sample::SummSample;
use crate::domain::traits::SampleSource;

/// Embedding table sizes every loaded id must fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabLimits {
    pub vocab_size:      usize,
    pub type_vocab_size: usize,
}

/// Loads `<split>.jsonl` files from a directory.
pub struct JsonlLoader {
    dir:    PathBuf,
    limits: Option<VocabLimits>,
}

impl JsonlLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), limits: None }
    }

    /// Reject samples whose ids do not fit the model's embeddings.
    pub fn with_limits(mut self, limits: VocabLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Path of the file backing a split
    pub fn split_path(&self, split: &str) -> PathBuf {
        self.dir.join(format!("{split}.jsonl"))
    }

    pub fn has_split(&self, split: &str) -> bool {
        self.split_path(split).is_file()
    }
}

impl SampleSource for JsonlLoader {
    fn load_split(&self, split: &str) -> Result<Vec<SummSample>> {
        let path = self.split_path(split);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read split '{}' from '{}'", split, path.display()))?;

        let samples = parse_jsonl(&path, &text, self.limits)?;
        tracing::info!("Loaded {} '{}' samples from '{}'", samples.len(), split, path.display());
        Ok(samples)
    }
}

fn parse_jsonl(path: &Path, text: &str, limits: Option<VocabLimits>) -> Result<Vec<SummSample>> {
    let mut samples = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let sample: SummSample = serde_json::from_str(line).map_err(|e| SummError::InvalidSample {
            path:   path.to_path_buf(),
            line:   idx + 1,
            reason: e.to_string(),
        })?;

        if sample.src_ids.is_empty() {
            return Err(SummError::InvalidSample {
                path:   path.to_path_buf(),
                line:   idx + 1,
                reason: "src_ids is empty".to_string(),
            }
            .into());
        }
        if let Some(limits) = limits {
            sample
                .check_ranges(limits.vocab_size, limits.type_vocab_size)
                .map_err(|reason| SummError::InvalidSample {
                    path:   path.to_path_buf(),
                    line:   idx + 1,
                    reason,
                })?;
        }
        if sample.tgt_ids.is_empty() {
            tracing::debug!("{}:{} has an empty target; it will contribute zero loss", path.display(), idx + 1);
        }

        samples.push(sample);
    }

    Ok(samples)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_split_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("train.jsonl"),
            "{\"src_ids\": [1, 2, 3], \"tgt_ids\": [4, 5]}\n\n{\"src_ids\": [6], \"tgt_ids\": [7], \"src_cls_pos\": [0]}\n",
        )
        .unwrap();

        let loader  = JsonlLoader::new(dir.path());
        let samples = loader.load_split("train").unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].src_cls_pos, vec![0]);
        assert!(loader.has_split("train"));
        assert!(!loader.has_split("val"));
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("val.jsonl"),
            "{\"src_ids\": [1], \"tgt_ids\": [2]}\nnot json\n",
        )
        .unwrap();

        let err = JsonlLoader::new(dir.path()).load_split("val").unwrap_err();
        match err.downcast_ref::<SummError>() {
            Some(SummError::InvalidSample { line, .. }) => assert_eq!(*line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test.jsonl"), "{\"src_ids\": [], \"tgt_ids\": [2]}\n").unwrap();

        assert!(JsonlLoader::new(dir.path()).load_split("test").is_err());
    }

    #[test]
    fn test_out_of_vocabulary_id_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("val.jsonl"),
            "{\"src_ids\": [1, 2], \"tgt_ids\": [3]}\n\n{\"src_ids\": [1, 99], \"tgt_ids\": [2]}\n",
        )
        .unwrap();

        // Without limits the loader only checks the shape of each line.
        let loader = JsonlLoader::new(dir.path());
        assert_eq!(loader.load_split("val").unwrap().len(), 2);

        let limits = VocabLimits { vocab_size: 6, type_vocab_size: 2 };
        let err = loader.with_limits(limits).load_split("val").unwrap_err();
        match err.downcast_ref::<SummError>() {
            Some(SummError::InvalidSample { line, reason, .. }) => {
                assert_eq!(*line, 3);
                assert!(reason.contains("99"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_token_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("train.jsonl"),
            "{\"src_ids\": [1, 2], \"src_token_type\": [0, 2], \"tgt_ids\": [3]}\n",
        )
        .unwrap();

        let limits = VocabLimits { vocab_size: 6, type_vocab_size: 2 };
        let err = JsonlLoader::new(dir.path()).with_limits(limits).load_split("train").unwrap_err();
        assert!(matches!(err.downcast_ref::<SummError>(), Some(SummError::InvalidSample { line: 1, .. })));
    }

    #[test]
    fn test_missing_split_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonlLoader::new(dir.path()).load_split("train").is_err());
    }
}

// ============================================================
// Layer 4 — Summarization Dataset
// ============================================================
// In-memory split handed to Burn's DataLoader. Items come out in
// file order; shuffling is the training loader's job.

use burn::data::dataset::Dataset;

use crate::domain::sample::SummSample;

/// In-memory split of tokenized summarization samples.
pub struct SummDataset {
    samples: Vec<SummSample>,
}

impl SummDataset {
    pub fn new(samples: Vec<SummSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// Optimizer steps one epoch takes at the given batch size.
    pub fn steps_per_epoch(&self, batch_size: usize) -> usize {
        self.samples.len().div_ceil(batch_size.max(1))
    }
}

impl Dataset<SummSample> for SummDataset {
    fn get(&self, index: usize) -> Option<SummSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ============================================================
// Layer 2 — EvalUseCase (validate / predict)
// ============================================================
// Rebuilds a trained model from its checkpoint directory
// (train_config.json + weights) and either:
//
//   validate — reports the average loss on a split
//   predict  — greedy-decodes every sample of a split into text
//
// Both run on the plain (non-autodiff) backend.

use anyhow::{Context, Result};
use burn::prelude::*;
use std::{fs, path::{Path, PathBuf}, sync::Arc};

use crate::application::train_use_case::TrainConfig;
use crate::data::{dataset::SummDataset, loader::JsonlLoader};
use crate::domain::traits::SampleSource;
use crate::infra::{checkpoint::{CheckpointManager, CheckpointRef}, tokenizer_store::TokenizerStore};
use crate::ml::model::AbsSummModel;
use crate::ml::task::SummTask;
use crate::ml::trainer::{evaluate, load_or_init, predict};

#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub data_dir:   String,
    pub split:      String,
    /// Checkpoint file or directory
    pub checkpoint: PathBuf,
    /// Overrides the stored batch size when set
    pub batch_size: Option<usize>,
    /// tokenizer.json or its directory; required for predict
    pub tokenizer:  Option<PathBuf>,
    /// predict only: also write one prediction per line here
    pub output:     Option<PathBuf>,
}

pub struct EvalUseCase {
    request: EvalRequest,
}

impl EvalUseCase {
    pub fn new(request: EvalRequest) -> Self {
        Self { request }
    }

    fn build_task<B: Backend>(&self, device: &B::Device) -> Result<(SummTask<B, AbsSummModel<B>>, TrainConfig)> {
        let req = &self.request;
        let checkpoint = CheckpointRef::resolve(&req.checkpoint)?;

        let mut cfg = CheckpointManager::load_config(&checkpoint.dir)?;
        if let Some(batch_size) = req.batch_size {
            cfg.batch_size = batch_size;
        }
        cfg.validate()?;

        let (model, _) = load_or_init::<B>(&cfg, Some(&checkpoint.stem), device)?;
        let mut task = SummTask::new(model, cfg.vocab_size);
        if let Some(path) = &req.tokenizer {
            task = task.with_decoder(Arc::new(TokenizerStore::load(path)?));
        }
        Ok((task, cfg))
    }

    fn load_split(&self, cfg: &TrainConfig) -> Result<SummDataset> {
        let req = &self.request;
        let samples = JsonlLoader::new(&req.data_dir)
            .with_limits(cfg.vocab_limits())
            .load_split(&req.split)?;
        tracing::info!("Loaded {} '{}' samples", samples.len(), req.split);
        Ok(SummDataset::new(samples))
    }

    /// Average batch loss on the split, `None` if it is empty.
    pub fn validate<B: Backend>(&self, device: B::Device) -> Result<Option<f64>> {
        let (task, cfg) = self.build_task::<B>(&device)?;
        let loss = evaluate(&task, &cfg, self.load_split(&cfg)?, &device)?;
        match loss {
            Some(loss) => tracing::info!("{} loss: {:.4}", self.request.split, loss),
            None       => tracing::warn!("'{}' split is empty", self.request.split),
        }
        Ok(loss)
    }

    /// One decoded string per sample, in file order.
    pub fn predict<B: Backend>(&self, device: B::Device) -> Result<Vec<String>> {
        let (task, cfg) = self.build_task::<B>(&device)?;
        let predictions = predict(&task, &cfg, self.load_split(&cfg)?, &device)?;

        if let Some(path) = &self.request.output {
            write_lines(path, &predictions)?;
            tracing::info!("Wrote {} predictions to '{}'", predictions.len(), path.display());
        }
        Ok(predictions)
    }
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(path, text).with_context(|| format!("Cannot write predictions to '{}'", path.display()))
}

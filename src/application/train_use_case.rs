// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the training pipeline in order:
//
//   Step 1: Load train / val splits      (Layer 4 - data)
//   Step 2: Build datasets               (Layer 4 - data)
//   Step 3: Save config                  (Layer 6 - infra)
//   Step 4: Run training loop            (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::data::{dataset::SummDataset, loader::{JsonlLoader, VocabLimits}};
use crate::domain::traits::SampleSource;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::AbsSummConfig;
use crate::ml::optim::OptimSettings;
use crate::ml::trainer::{run_training, TrainSummary};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Saved as train_config.json next to the
// checkpoints so `validate` and `predict` can rebuild the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub data_dir:         String,
    pub checkpoint_dir:   String,
    /// Resume from this checkpoint file or directory
    pub load_checkpoint:  Option<String>,
    pub batch_size:       usize,
    pub epochs:           usize,
    pub num_workers:      usize,
    /// Shuffle seed for the training loader
    pub seed:             u64,
    pub pad_id:           u32,
    pub vocab_size:       usize,
    pub max_src_len:      usize,
    pub max_tgt_len:      usize,
    pub d_model:          usize,
    pub num_heads:        usize,
    pub encoder_layers:   usize,
    pub decoder_layers:   usize,
    pub d_ff:             usize,
    pub dropout:          f64,
    pub decoder_start_id: usize,
    pub optim:            OptimSettings,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:         "data".to_string(),
            checkpoint_dir:   "checkpoints".to_string(),
            load_checkpoint:  None,
            batch_size:       8,
            epochs:           10,
            num_workers:      1,
            seed:             42,
            pad_id:           0,
            vocab_size:       30522,
            max_src_len:      512,
            max_tgt_len:      128,
            d_model:          256,
            num_heads:        8,
            encoder_layers:   6,
            decoder_layers:   6,
            d_ff:             1024,
            dropout:          0.1,
            decoder_start_id: 0,
            optim:            OptimSettings::default(),
        }
    }
}

impl TrainConfig {
    /// Architecture of the model this config trains.
    pub fn model_config(&self) -> AbsSummConfig {
        AbsSummConfig::new(self.vocab_size)
            .with_max_src_len(self.max_src_len)
            .with_max_tgt_len(self.max_tgt_len)
            .with_d_model(self.d_model)
            .with_num_heads(self.num_heads)
            .with_encoder_layers(self.encoder_layers)
            .with_decoder_layers(self.decoder_layers)
            .with_d_ff(self.d_ff)
            .with_dropout(self.dropout)
            .with_decoder_start_id(self.decoder_start_id)
    }

    /// Id ranges a sample must respect to be fed to this model.
    pub fn vocab_limits(&self) -> VocabLimits {
        VocabLimits {
            vocab_size:      self.vocab_size,
            type_vocab_size: self.model_config().type_vocab_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be at least 1");
        ensure!(self.vocab_size > 0, "vocab_size must be at least 1");
        ensure!(
            self.d_model % self.num_heads.max(1) == 0 && self.num_heads > 0,
            "d_model ({}) must be divisible by num_heads ({})",
            self.d_model,
            self.num_heads
        );
        ensure!(
            (self.pad_id as usize) < self.vocab_size,
            "pad_id {} is outside the vocabulary ({})",
            self.pad_id,
            self.vocab_size
        );
        ensure!(
            self.decoder_start_id < self.vocab_size,
            "decoder_start_id {} is outside the vocabulary ({})",
            self.decoder_start_id,
            self.vocab_size
        );
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainSummary> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Load the splits ───────────────────────────────────────────
        tracing::info!("Loading samples from '{}'", cfg.data_dir);
        let loader        = JsonlLoader::new(&cfg.data_dir).with_limits(cfg.vocab_limits());
        let train_samples = loader.load_split("train")?;
        let val_samples   = if loader.has_split("val") {
            Some(loader.load_split("val")?)
        } else {
            tracing::warn!("No val split in '{}'; validation is skipped", cfg.data_dir);
            None
        };
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.as_ref().map_or(0, Vec::len)
        );

        // ── Step 2: Build Burn datasets ───────────────────────────────────────
        let train_dataset = SummDataset::new(train_samples);
        let val_dataset   = val_samples.map(SummDataset::new);

        // ── Step 3: Save config so checkpoints can be reloaded ────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;

        // ── Step 4: Run training loop (Layer 5) ───────────────────────────────
        run_training::<B>(cfg, train_dataset, val_dataset, &ckpt_manager, device)
    }
}

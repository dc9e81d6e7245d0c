// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk.gz file) — every encoder and decoder parameter
//   2. latest_epoch.json            — which epoch was last saved
//   3. train_config.json            — model architecture + optimizer settings
//   4. trainer_state.json           — epoch, global step, schedule positions
//
// The config is needed to rebuild the exact architecture before the
// weights can be loaded into it; the trainer state lets a resumed run
// continue both learning-rate schedules where they stopped.
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk.gz
//     model_epoch_2.mpk.gz
//     latest_epoch.json
//     train_config.json
//     trainer_state.json
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::SummError;
use crate::ml::model::AbsSummModel;

const WEIGHTS_EXT: &str = "mpk.gz";
const LATEST_FILE: &str = "latest_epoch.json";
const CONFIG_FILE: &str = "train_config.json";
const STATE_FILE:  &str = "trainer_state.json";

/// Progress needed to resume a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerState {
    /// Last completed epoch (starts at 1)
    pub epoch:       usize,
    /// Optimizer steps taken so far
    pub global_step: usize,
    pub phase1_step: usize,
    pub phase2_step: usize,
}

/// A concrete set of weights on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRef {
    /// Directory holding the weights and their sidecar JSON files
    pub dir:   PathBuf,
    /// Weights path without the recorder extension
    pub stem:  PathBuf,
    /// Epoch, when it can be told from the file name
    pub epoch: Option<usize>,
}

impl CheckpointRef {
    /// Accepts either a checkpoint directory (latest epoch is used) or
    /// a weights file, with or without the `.mpk.gz` extension.
    pub fn resolve(path: &Path) -> Result<Self> {
        if path.is_dir() {
            let manager = CheckpointManager { dir: path.to_path_buf() };
            let epoch   = manager.latest_epoch()?;
            return Ok(Self {
                dir:   path.to_path_buf(),
                stem:  manager.weights_stem(epoch),
                epoch: Some(epoch),
            });
        }

        let stem = strip_weights_ext(path);
        if !weights_file(&stem).is_file() {
            return Err(SummError::MissingCheckpoint(path.to_path_buf()).into());
        }
        let dir = stem
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let epoch = stem
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("model_epoch_"))
            .and_then(|n| n.parse().ok());
        Ok(Self { dir, stem, epoch })
    }

    /// Weights file as written by the recorder
    pub fn weights_path(&self) -> PathBuf {
        weights_file(&self.stem)
    }
}

fn strip_weights_ext(path: &Path) -> PathBuf {
    let suffix = format!(".{WEIGHTS_EXT}");
    match path.to_str().and_then(|s| s.strip_suffix(suffix.as_str())) {
        Some(stem) => PathBuf::from(stem),
        None       => path.to_path_buf(),
    }
}

fn weights_file(stem: &Path) -> PathBuf {
    stem.with_extension(WEIGHTS_EXT)
}

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn weights_stem(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    /// Save model weights for a given epoch and mark it as latest.
    pub fn save_model<B: Backend>(&self, model: &AbsSummModel<B>, epoch: usize) -> Result<PathBuf> {
        let stem = self.weights_stem(epoch);

        CompactRecorder::new()
            .record(model.clone().into_record(), stem.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", stem.display()))?;

        fs::write(self.dir.join(LATEST_FILE), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_FILE}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(weights_file(&stem))
    }

    /// Load weights into an already-built model of the same architecture.
    pub fn load_model<B: Backend>(
        checkpoint: &CheckpointRef,
        model:      AbsSummModel<B>,
        device:     &B::Device,
    ) -> Result<AbsSummModel<B>> {
        tracing::info!("Loading checkpoint '{}'", checkpoint.weights_path().display());

        let record = CompactRecorder::new()
            .load(checkpoint.stem.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Does it match the configured architecture?",
                    checkpoint.weights_path().display()
                )
            })?;

        Ok(model.load_record(record))
    }

    /// Save the training configuration next to the weights.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration stored with a checkpoint.
    pub fn load_config(dir: &Path) -> Result<TrainConfig> {
        let path = dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure the checkpoint was written by 'train'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid training config '{}'", path.display()))
    }

    pub fn save_state(&self, state: &TrainerState) -> Result<()> {
        let path = self.dir.join(STATE_FILE);
        fs::write(&path, serde_json::to_string_pretty(state)?)
            .with_context(|| format!("Cannot write trainer state to '{}'", path.display()))?;
        Ok(())
    }

    /// Trainer state stored in a checkpoint directory, if any.
    pub fn load_state(dir: &Path) -> Result<Option<TrainerState>> {
        let path = dir.join(STATE_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read trainer state '{}'", path.display()))?;
        let state = serde_json::from_str(&json)
            .with_context(|| format!("Invalid trainer state '{}'", path.display()))?;
        Ok(Some(state))
    }

    /// Read latest_epoch.json and return the epoch number.
    fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path)
            .map_err(|_| SummError::MissingCheckpoint(self.dir.clone()))?;
        serde_json::from_str::<usize>(&s)
            .with_context(|| format!("Invalid '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::test_utils::tiny_config;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_save_then_load_latest_restores_weights() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();

        let trained: AbsSummModel<TestBackend> = tiny_config(12).init(&device);
        ckpt.save_model(&trained, 1).unwrap();
        ckpt.save_model(&trained, 2).unwrap();

        let checkpoint = CheckpointRef::resolve(dir.path()).unwrap();
        assert_eq!(checkpoint.epoch, Some(2));

        let fresh: AbsSummModel<TestBackend> = tiny_config(12).init(&device);
        let loaded = CheckpointManager::load_model(&checkpoint, fresh, &device).unwrap();

        let expected = values(trained.decoder.generator.weight.val());
        let actual   = values(loaded.decoder.generator.weight.val());
        for (a, e) in actual.iter().zip(expected.iter()) {
            // CompactRecorder stores half precision
            assert!((a - e).abs() < 1e-2);
        }
    }

    #[test]
    fn test_resolve_explicit_file_with_or_without_extension() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let model: AbsSummModel<TestBackend> = tiny_config(12).init(&Default::default());
        let written = ckpt.save_model(&model, 3).unwrap();

        let with_ext = CheckpointRef::resolve(&written).unwrap();
        let without  = CheckpointRef::resolve(&dir.path().join("model_epoch_3")).unwrap();

        assert_eq!(with_ext, without);
        assert_eq!(with_ext.epoch, Some(3));
        assert_eq!(with_ext.dir, dir.path());
        assert_eq!(with_ext.weights_path(), written);
    }

    #[test]
    fn test_missing_checkpoint_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = CheckpointRef::resolve(&dir.path().join("model_epoch_9.mpk.gz")).unwrap_err();
        assert!(matches!(err.downcast_ref::<SummError>(), Some(SummError::MissingCheckpoint(_))));

        // A directory that was never trained into
        let err = CheckpointRef::resolve(dir.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<SummError>(), Some(SummError::MissingCheckpoint(_))));
    }

    #[test]
    fn test_config_and_state_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        assert_eq!(CheckpointManager::load_state(dir.path()).unwrap(), None);

        let mut cfg = TrainConfig::default();
        cfg.epochs = 7;
        cfg.optim.total_steps = Some(10);
        ckpt.save_config(&cfg).unwrap();

        let state = TrainerState { epoch: 2, global_step: 40, phase1_step: 40, phase2_step: 2 };
        ckpt.save_state(&state).unwrap();

        let loaded = CheckpointManager::load_config(dir.path()).unwrap();
        assert_eq!(loaded.epochs, 7);
        assert_eq!(loaded.optim, cfg.optim);
        assert_eq!(CheckpointManager::load_state(dir.path()).unwrap(), Some(state));
    }
}

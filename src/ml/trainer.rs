// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop over Burn's DataLoader with the two-phase optimizer:
//
//   - Training uses an AutodiffBackend B for gradients
//   - task.valid() returns the task on B::InnerBackend, so the
//     validation batcher must also produce InnerBackend batches
//   - One forward/backward per batch; both phase optimizers step
//     on their own slice of the gradients
//
// After every epoch: average val loss, metrics row, checkpoint,
// trainer state. `--load-checkpoint` resumes from that state.
//
// Only the shuffled training loader uses worker threads. Burn's
// multi-threaded loader yields batches in completion order, and
// predictions must line up with the input file.
//
// Reference: Burn Book §5

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::{Path, PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::SummBatcher, dataset::SummDataset};
use crate::domain::params::StepInterval;
use crate::infra::{
    checkpoint::{CheckpointManager, CheckpointRef, TrainerState},
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::{AbsSummModel, SummarizationModel};
use crate::ml::optim::configure_optimizers;
use crate::ml::param_groups::ParamGroups;
use crate::ml::task::SummTask;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub state:           TrainerState,
    pub best_val_loss:   Option<f64>,
    pub last_checkpoint: Option<PathBuf>,
}

fn batcher<B: Backend>(cfg: &TrainConfig, device: &B::Device) -> SummBatcher<B> {
    SummBatcher::new(device.clone(), cfg.pad_id, cfg.max_src_len, cfg.max_tgt_len)
}

/// Build the model, loading weights when `load_checkpoint` is set.
pub fn load_or_init<B: Backend>(
    cfg:    &TrainConfig,
    path:   Option<&Path>,
    device: &B::Device,
) -> Result<(AbsSummModel<B>, Option<CheckpointRef>)> {
    let model = cfg.model_config().init::<B>(device);
    match path {
        Some(path) => {
            let checkpoint = CheckpointRef::resolve(path)?;
            let model = CheckpointManager::load_model(&checkpoint, model, device)?;
            Ok((model, Some(checkpoint)))
        }
        None => Ok((model, None)),
    }
}

/// Where a resumed run picks up. A trainer_state.json written for the
/// same epoch wins; otherwise the position is derived from the epoch.
fn resume_state(
    cfg:             &TrainConfig,
    checkpoint:      &CheckpointRef,
    steps_per_epoch: usize,
) -> Result<TrainerState> {
    let saved = CheckpointManager::load_state(&checkpoint.dir)?;
    if let Some(state) = saved.filter(|s| checkpoint.epoch.map_or(true, |e| e == s.epoch)) {
        return Ok(state);
    }

    let epoch = checkpoint.epoch.unwrap_or(0);
    let global_step = epoch * steps_per_epoch;
    let schedule_step = |interval| match interval {
        StepInterval::Step  => global_step,
        StepInterval::Epoch => epoch,
    };
    tracing::warn!(
        "No trainer state for '{}'; resuming at epoch {} with derived schedule positions",
        checkpoint.weights_path().display(),
        epoch
    );
    Ok(TrainerState {
        epoch,
        global_step,
        phase1_step: schedule_step(cfg.optim.phase1.interval),
        phase2_step: schedule_step(cfg.optim.phase2.interval),
    })
}

pub fn run_training<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: SummDataset,
    val_dataset:   Option<SummDataset>,
    ckpt_manager:  &CheckpointManager,
    device:        B::Device,
) -> Result<TrainSummary> {
    ensure!(train_dataset.sample_count() > 0, "the train split is empty");

    let steps_per_epoch = train_dataset.steps_per_epoch(cfg.batch_size);
    let total_steps     = cfg.optim.resolve_total_steps(steps_per_epoch, cfg.epochs);

    // ── Build (or restore) the model ──────────────────────────────────────────
    let (model, checkpoint) =
        load_or_init::<B>(cfg, cfg.load_checkpoint.as_deref().map(Path::new), &device)?;
    let mut state = match &checkpoint {
        Some(checkpoint) => resume_state(cfg, checkpoint, steps_per_epoch)?,
        None => TrainerState { epoch: 0, global_step: 0, phase1_step: 0, phase2_step: 0 },
    };
    tracing::info!(
        "Model ready: {} encoder / {} decoder layers, d_model={}, {} parameters",
        cfg.encoder_layers,
        cfg.decoder_layers,
        cfg.d_model,
        model.num_params()
    );

    // ── Two-phase optimizers ──────────────────────────────────────────────────
    // Declared after loading: restored parameters keep their saved ids.
    let groups = ParamGroups::declare(&model);
    let mut optim = configure_optimizers::<B>(&groups, &cfg.optim, total_steps)
        .resume(state.phase1_step, state.phase2_step);
    let mut task = SummTask::new(model, cfg.vocab_size);

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(batcher::<B>(cfg, &device))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers.max(1))
        .build(train_dataset);

    let val_loader = val_dataset.map(|dataset| {
        DataLoaderBuilder::new(batcher::<B::InnerBackend>(cfg, &device))
            .batch_size(cfg.batch_size)
            .build(dataset)
    });

    let metrics = MetricsLogger::new(ckpt_manager.dir())?;
    let mut best_val_loss: Option<f64> = None;
    let mut last_checkpoint = None;

    if state.epoch >= cfg.epochs {
        tracing::warn!("Checkpoint is already at epoch {} of {}", state.epoch, cfg.epochs);
    }

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in (state.epoch + 1)..=cfg.epochs {
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let output = task.training_step(&batch)?;
            train_loss_sum += output.loss_value;
            train_batches  += 1;

            let mut grads = output.loss.backward();
            task = task.map_model(|model| optim.step(model, &mut grads));
            state.global_step += 1;
        }
        optim.end_epoch();

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation (inner backend, dropout off) ───────────────────────────
        let avg_val_loss = match &val_loader {
            Some(loader) => {
                let valid = task.valid();
                let mut sum = 0.0f64;
                let mut batches = 0usize;
                for batch in loader.iter() {
                    sum += valid.validation_step(&batch)?;
                    batches += 1;
                }
                if batches > 0 { sum / batches as f64 } else { f64::NAN }
            }
            None => f64::NAN,
        };

        let (phase1_lr, phase2_lr) = optim.current_lrs();
        let row = EpochMetrics {
            epoch,
            train_loss: avg_train_loss,
            val_loss:   avg_val_loss,
            phase1_lr,
            phase2_lr,
        };
        metrics.log(&row)?;
        if !avg_val_loss.is_nan() && row.is_improvement(best_val_loss.unwrap_or(f64::INFINITY)) {
            best_val_loss = Some(avg_val_loss);
        }

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | phase1_lr={:.3e} | phase2_lr={:.3e}",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss, phase1_lr, phase2_lr,
        );

        state.epoch       = epoch;
        state.phase1_step = optim.phase1.schedule_step();
        state.phase2_step = optim.phase2.schedule_step();

        last_checkpoint = Some(ckpt_manager.save_model(task.model(), epoch)?);
        ckpt_manager.save_state(&state)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete after {} optimizer steps", state.global_step);
    Ok(TrainSummary { state, best_val_loss, last_checkpoint })
}

/// Average batch loss over a dataset. `None` when it has no samples.
pub fn evaluate<B: Backend, M: SummarizationModel<B>>(
    task:    &SummTask<B, M>,
    cfg:     &TrainConfig,
    dataset: SummDataset,
    device:  &B::Device,
) -> Result<Option<f64>> {
    let loader = DataLoaderBuilder::new(batcher::<B>(cfg, device))
        .batch_size(cfg.batch_size)
        .build(dataset);

    let mut sum = 0.0f64;
    let mut batches = 0usize;
    for batch in loader.iter() {
        sum += task.validation_step(&batch)?;
        batches += 1;
    }
    Ok((batches > 0).then(|| sum / batches as f64))
}

/// Decoded prediction for every sample, in dataset order.
pub fn predict<B: Backend, M: SummarizationModel<B>>(
    task:    &SummTask<B, M>,
    cfg:     &TrainConfig,
    dataset: SummDataset,
    device:  &B::Device,
) -> Result<Vec<String>> {
    let loader = DataLoaderBuilder::new(batcher::<B>(cfg, device))
        .batch_size(cfg.batch_size)
        .build(dataset);

    let mut predictions = Vec::new();
    for batch in loader.iter() {
        predictions.extend(task.predict_step(&batch)?);
    }
    Ok(predictions)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::SummSample;
    use crate::ml::model::ModelInput;
    use crate::ml::test_utils::word_level_tokenizer;
    use burn::backend::{Autodiff, NdArray};
    use std::sync::Arc;

    type AD = Autodiff<NdArray>;

    fn tiny_train_config(checkpoint_dir: &Path, epochs: usize) -> TrainConfig {
        let mut cfg = TrainConfig::default();
        cfg.checkpoint_dir = checkpoint_dir.display().to_string();
        cfg.batch_size = 2;
        cfg.epochs = epochs;
        cfg.vocab_size = 6;
        cfg.max_src_len = 8;
        cfg.max_tgt_len = 4;
        cfg.d_model = 8;
        cfg.num_heads = 2;
        cfg.encoder_layers = 1;
        cfg.decoder_layers = 1;
        cfg.d_ff = 16;
        cfg.dropout = 0.0;
        cfg.optim.phase1.warmup_steps = 2;
        cfg.optim.phase2.warmup_steps = 2;
        cfg.optim.phase2.lr = 0.01;
        cfg
    }

    fn dataset() -> SummDataset {
        SummDataset::new(vec![
            SummSample::new(vec![1, 2, 3], vec![1, 2]),
            SummSample::new(vec![2, 3], vec![2, 3, 4]),
            SummSample::new(vec![4, 1, 2, 3], vec![4]),
        ])
    }

    #[test]
    fn test_training_writes_checkpoints_metrics_and_state() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = tiny_train_config(dir.path(), 2);
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        let summary = run_training::<AD>(&cfg, dataset(), Some(dataset()), &ckpt, Default::default())
            .unwrap();

        // 3 samples at batch size 2 → 2 steps per epoch
        assert_eq!(summary.state, TrainerState { epoch: 2, global_step: 4, phase1_step: 4, phase2_step: 4 });
        assert!(summary.best_val_loss.unwrap().is_finite());
        assert!(dir.path().join("model_epoch_1.mpk.gz").is_file());
        assert_eq!(summary.last_checkpoint, Some(dir.path().join("model_epoch_2.mpk.gz")));

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert_eq!(CheckpointManager::load_state(dir.path()).unwrap(), Some(summary.state));
    }

    #[test]
    fn test_resume_continues_from_saved_state() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        let mut cfg = tiny_train_config(dir.path(), 1);
        cfg.optim.phase2.interval = StepInterval::Epoch;
        run_training::<AD>(&cfg, dataset(), None, &ckpt, Default::default()).unwrap();

        cfg.epochs = 3;
        cfg.load_checkpoint = Some(dir.path().display().to_string());
        let summary = run_training::<AD>(&cfg, dataset(), None, &ckpt, Default::default()).unwrap();

        assert_eq!(summary.state, TrainerState { epoch: 3, global_step: 6, phase1_step: 6, phase2_step: 3 });
        assert!(summary.best_val_loss.is_none());
    }

    #[test]
    fn test_resume_without_state_derives_schedule_positions() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let mut cfg = tiny_train_config(dir.path(), 2);
        cfg.optim.phase2.interval = StepInterval::Epoch;

        let model: AbsSummModel<NdArray> = cfg.model_config().init(&Default::default());
        ckpt.save_model(&model, 2).unwrap();

        let checkpoint = CheckpointRef::resolve(dir.path()).unwrap();
        let state = resume_state(&cfg, &checkpoint, 5).unwrap();
        assert_eq!(state, TrainerState { epoch: 2, global_step: 10, phase1_step: 10, phase2_step: 2 });
    }

    #[test]
    fn test_evaluate_and_predict_cover_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_train_config(dir.path(), 1);
        let device = Default::default();

        let model: AbsSummModel<NdArray> = cfg.model_config().init(&device);
        let task = SummTask::new(model, cfg.vocab_size)
            .with_decoder(Arc::new(word_level_tokenizer(dir.path())));

        let loss = evaluate(&task, &cfg, dataset(), &device).unwrap().unwrap();
        assert!(loss.is_finite() && loss > 0.0);

        let predictions = predict(&task, &cfg, dataset(), &device).unwrap();
        assert_eq!(predictions.len(), 3);

        let empty = evaluate(&task, &cfg, SummDataset::new(vec![]), &device).unwrap();
        assert!(empty.is_none());
    }

    /// Puts all probability on the target id at every position.
    struct TargetEcho {
        vocab: usize,
    }

    impl<B: Backend> SummarizationModel<B> for TargetEcho {
        fn forward(&self, input: ModelInput<B>) -> Tensor<B, 3> {
            let [batch, len] = input.tgt_ids.dims();
            let classes = Tensor::<B, 1, Int>::arange(0..self.vocab as i64, &input.tgt_ids.device())
                .reshape([1, 1, self.vocab])
                .repeat_dim(0, batch)
                .repeat_dim(1, len);
            input.tgt_ids.reshape([batch, len, 1]).repeat_dim(2, self.vocab).equal(classes).float()
        }
    }

    #[test]
    fn test_predict_keeps_dataset_order_with_several_workers() {
        let dir = tempfile::tempdir().unwrap();
        let tokenizer = word_level_tokenizer(dir.path());
        let mut cfg = tiny_train_config(dir.path(), 1);
        cfg.num_workers = 4;

        // 64 distinct targets over the ids hello/world/foo/bar
        let targets: Vec<Vec<u32>> = (0..64u32)
            .map(|i| vec![1 + i % 4, 1 + (i / 4) % 4, 1 + (i / 16) % 4])
            .collect();
        let samples: Vec<SummSample> = targets.iter().map(|t| SummSample::new(vec![1], t.clone())).collect();

        let task = SummTask::<NdArray, _>::new(TargetEcho { vocab: cfg.vocab_size }, cfg.vocab_size)
            .with_decoder(Arc::new(tokenizer.clone()));
        let predictions = predict(&task, &cfg, SummDataset::new(samples), &Default::default()).unwrap();

        let expected: Vec<String> = targets.iter().map(|t| tokenizer.decode(t, false).unwrap()).collect();
        assert_eq!(predictions, expected);
    }

    #[test]
    fn test_empty_train_split_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = tiny_train_config(dir.path(), 1);
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let err = run_training::<AD>(&cfg, SummDataset::new(vec![]), None, &ckpt, Default::default());
        assert!(err.is_err());
    }
}

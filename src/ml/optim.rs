// ============================================================
// Layer 5 — Two-Phase Optimizers
// ============================================================
// Phase1 (encoder) and phase2 (decoder) are optimized separately:
//
//   phase   lr     warmup   betas          eps
//   ─────   ────   ──────   ────────────   ────
//   1       2e-3   20000    (0.9, 0.999)   1e-8
//   2       0.1    10000    (0.9, 0.999)   1e-8
//
// Each phase owns two AdamW instances sharing one learning-rate
// schedule: one applies weight decay, the other (biases and
// normalisation parameters) does not. Phase1 optimizers are typed
// over Phase1Encoder and phase2 over Phase2Decoder, so neither can
// update the other's parameters.
//
// Reference: Loshchilov & Hutter (2019) Decoupled Weight Decay

use burn::{
    module::{AutodiffModule, ParamId},
    optim::{AdamWConfig, GradientsParams, Optimizer},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::domain::params::{DecayClass, Phase, StepInterval};
use crate::ml::model::{AbsSummModel, Phase1Encoder, Phase2Decoder};
use crate::ml::param_groups::ParamGroups;
use crate::ml::schedule::{LinearWarmupDecay, LrSchedule};

// ─── Settings ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSettings {
    pub lr:           f64,
    pub warmup_steps: usize,
    pub beta_1:       f32,
    pub beta_2:       f32,
    pub epsilon:      f32,
    pub interval:     StepInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimSettings {
    pub phase1:       PhaseSettings,
    pub phase2:       PhaseSettings,
    /// Applied to the Decay group of both phases
    pub weight_decay: f32,
    /// Fixed schedule length; `None` derives it from the train loader
    pub total_steps:  Option<usize>,
}

impl Default for OptimSettings {
    fn default() -> Self {
        Self {
            phase1: PhaseSettings {
                lr:           2e-3,
                warmup_steps: 20_000,
                beta_1:       0.9,
                beta_2:       0.999,
                epsilon:      1e-8,
                interval:     StepInterval::Step,
            },
            phase2: PhaseSettings {
                lr:           0.1,
                warmup_steps: 10_000,
                beta_1:       0.9,
                beta_2:       0.999,
                epsilon:      1e-8,
                interval:     StepInterval::Step,
            },
            weight_decay: 0.01,
            total_steps:  None,
        }
    }
}

impl OptimSettings {
    /// Schedule length: the explicit override, else epochs × batches.
    pub fn resolve_total_steps(&self, steps_per_epoch: usize, epochs: usize) -> usize {
        match self.total_steps {
            Some(fixed) => {
                tracing::info!("Using fixed total_steps = {}", fixed);
                fixed
            }
            None => {
                let derived = steps_per_epoch * epochs;
                tracing::info!(
                    "Derived total_steps = {} ({} steps/epoch x {} epochs)",
                    derived,
                    steps_per_epoch,
                    epochs
                );
                derived
            }
        }
    }
}

fn adamw<B: AutodiffBackend, M: AutodiffModule<B>>(
    settings:     &PhaseSettings,
    weight_decay: f32,
) -> impl Optimizer<M, B> {
    AdamWConfig::new()
        .with_beta_1(settings.beta_1)
        .with_beta_2(settings.beta_2)
        .with_epsilon(settings.epsilon)
        .with_weight_decay(weight_decay)
        .init::<B, M>()
}

// ─── PhaseOptimizer ───────────────────────────────────────────────────────────

/// Gradients of one phase, already split by decay class.
pub struct PhaseGrads {
    decay:    GradientsParams,
    no_decay: GradientsParams,
}

pub struct PhaseOptimizer<O> {
    phase:        Phase,
    decay:        O,
    no_decay:     O,
    decay_ids:    Vec<ParamId>,
    no_decay_ids: Vec<ParamId>,
    schedule:     LinearWarmupDecay,
}

impl<O> PhaseOptimizer<O> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_lr(&self) -> f64 {
        self.schedule.current_lr()
    }

    /// Schedule position, persisted for resuming
    pub fn schedule_step(&self) -> usize {
        self.schedule.current_step()
    }

    pub fn param_ids(&self, class: DecayClass) -> &[ParamId] {
        match class {
            DecayClass::Decay   => &self.decay_ids,
            DecayClass::NoDecay => &self.no_decay_ids,
        }
    }

    /// Take this phase's gradients out of the backward pass result.
    pub fn collect_grads<B, M>(&self, grads: &mut B::Gradients, module: &M) -> PhaseGrads
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        PhaseGrads {
            decay:    GradientsParams::from_params(grads, module, &self.decay_ids),
            no_decay: GradientsParams::from_params(grads, module, &self.no_decay_ids),
        }
    }

    /// Apply one update at the current learning rate.
    pub fn step<B, M>(&mut self, module: M, grads: PhaseGrads) -> M
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let lr = self.schedule.current_lr();
        let module = self.decay.step(lr, module, grads.decay);
        let module = self.no_decay.step(lr, module, grads.no_decay);
        self.schedule.tick(StepInterval::Step);
        module
    }

    pub fn end_epoch(&mut self) {
        self.schedule.tick(StepInterval::Epoch);
    }
}

// ─── TwoPhaseOptimizer ────────────────────────────────────────────────────────

pub struct TwoPhaseOptimizer<O1, O2> {
    pub phase1: PhaseOptimizer<O1>,
    pub phase2: PhaseOptimizer<O2>,
}

/// Build both phase optimizers and their schedules.
pub fn configure_optimizers<B: AutodiffBackend>(
    groups:      &ParamGroups,
    settings:    &OptimSettings,
    total_steps: usize,
) -> TwoPhaseOptimizer<impl Optimizer<Phase1Encoder<B>, B>, impl Optimizer<Phase2Decoder<B>, B>> {
    let p1 = &settings.phase1;
    let p2 = &settings.phase2;

    tracing::info!(
        "phase1: lr={} warmup={} interval={} | phase2: lr={} warmup={} interval={} | total_steps={}",
        p1.lr, p1.warmup_steps, p1.interval,
        p2.lr, p2.warmup_steps, p2.interval,
        total_steps,
    );

    TwoPhaseOptimizer {
        phase1: PhaseOptimizer {
            phase:        Phase::Phase1,
            decay:        adamw::<B, Phase1Encoder<B>>(p1, settings.weight_decay),
            no_decay:     adamw::<B, Phase1Encoder<B>>(p1, 0.0),
            decay_ids:    groups.phase1.decay.clone(),
            no_decay_ids: groups.phase1.no_decay.clone(),
            schedule:     LinearWarmupDecay::new(p1.lr, p1.warmup_steps, total_steps, p1.interval),
        },
        phase2: PhaseOptimizer {
            phase:        Phase::Phase2,
            decay:        adamw::<B, Phase2Decoder<B>>(p2, settings.weight_decay),
            no_decay:     adamw::<B, Phase2Decoder<B>>(p2, 0.0),
            decay_ids:    groups.phase2.decay.clone(),
            no_decay_ids: groups.phase2.no_decay.clone(),
            schedule:     LinearWarmupDecay::new(p2.lr, p2.warmup_steps, total_steps, p2.interval),
        },
    }
}

impl<O1, O2> TwoPhaseOptimizer<O1, O2> {
    /// Continue both schedules from saved positions.
    pub fn resume(mut self, phase1_step: usize, phase2_step: usize) -> Self {
        self.phase1.schedule = self.phase1.schedule.with_step(phase1_step);
        self.phase2.schedule = self.phase2.schedule.with_step(phase2_step);
        self
    }

    /// One optimization step for the whole model.
    pub fn step<B>(&mut self, model: AbsSummModel<B>, grads: &mut B::Gradients) -> AbsSummModel<B>
    where
        B: AutodiffBackend,
        O1: Optimizer<Phase1Encoder<B>, B>,
        O2: Optimizer<Phase2Decoder<B>, B>,
    {
        let phase1_grads = self.phase1.collect_grads::<B, _>(grads, &model.encoder);
        let phase2_grads = self.phase2.collect_grads::<B, _>(grads, &model.decoder);

        let AbsSummModel { encoder, decoder } = model;
        AbsSummModel {
            encoder: self.phase1.step::<B, _>(encoder, phase1_grads),
            decoder: self.phase2.step::<B, _>(decoder, phase2_grads),
        }
    }

    pub fn end_epoch(&mut self) {
        self.phase1.end_epoch();
        self.phase2.end_epoch();
    }

    /// (phase1, phase2) learning rates for the next step
    pub fn current_lrs(&self) -> (f64, f64) {
        (self.phase1.current_lr(), self.phase2.current_lr())
    }
}

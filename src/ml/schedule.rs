// ============================================================
// Layer 5 — Learning-Rate Schedule
// ============================================================
// Linear warmup, then linear decay to zero at `total`:
//
//   lr(step) = base * step / max(1, warmup)                           step < warmup
//            = base * max(0, (total - step) / max(1, total - warmup))  otherwise
//
// The schedule starts at step 0, so the first optimizer update runs
// with lr(0): zero when there is a warmup, `base` when there is not.

use crate::domain::params::StepInterval;

/// Learning-rate schedule that knows its own position.
pub trait LrSchedule {
    /// Learning rate at an arbitrary step
    fn lr_at(&self, step: usize) -> f64;

    /// Current step counter
    fn current_step(&self) -> usize;

    /// Advance by one step
    fn advance(&mut self);

    /// Learning rate at the current step
    fn current_lr(&self) -> f64 {
        self.lr_at(self.current_step())
    }
}

#[derive(Clone, Debug)]
pub struct LinearWarmupDecay {
    base_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
    current_step: usize,
    interval:     StepInterval,
}

impl LinearWarmupDecay {
    pub fn new(base_lr: f64, warmup_steps: usize, total_steps: usize, interval: StepInterval) -> Self {
        if total_steps <= warmup_steps {
            tracing::warn!(
                "total_steps ({}) <= warmup_steps ({}): the learning rate will never reach {} nor decay",
                total_steps,
                warmup_steps,
                base_lr
            );
        }
        Self { base_lr, warmup_steps, total_steps, current_step: 0, interval }
    }

    /// Resume from a saved step counter.
    pub fn with_step(mut self, step: usize) -> Self {
        self.current_step = step;
        self
    }

    /// Advance if this schedule is driven at the given cadence.
    pub fn tick(&mut self, event: StepInterval) {
        if self.interval == event {
            self.advance();
        }
    }
}

impl LrSchedule for LinearWarmupDecay {
    fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return self.base_lr * step as f64 / self.warmup_steps.max(1) as f64;
        }
        let remaining = self.total_steps.saturating_sub(step) as f64;
        let span      = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;
        self.base_lr * (remaining / span).max(0.0)
    }

    fn current_step(&self) -> usize {
        self.current_step
    }

    fn advance(&mut self) {
        self.current_step += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_warmup_ramps_linearly_from_zero() {
        let s = LinearWarmupDecay::new(0.1, 10, 110, StepInterval::Step);
        assert!(s.lr_at(0).abs() < EPS);
        assert!((s.lr_at(5) - 0.05).abs() < EPS);
        assert!((s.lr_at(10) - 0.1).abs() < EPS);
    }

    #[test]
    fn test_decays_linearly_to_zero() {
        let s = LinearWarmupDecay::new(0.1, 10, 110, StepInterval::Step);
        assert!((s.lr_at(60) - 0.05).abs() < EPS);
        assert!(s.lr_at(110).abs() < EPS);
        assert!(s.lr_at(500).abs() < EPS);
    }

    #[test]
    fn test_no_warmup_starts_at_base() {
        let s = LinearWarmupDecay::new(2e-3, 0, 100, StepInterval::Step);
        assert!((s.current_lr() - 2e-3).abs() < EPS);
    }

    #[test]
    fn test_total_below_warmup_keeps_ramping() {
        // Fixed tiny total with a long warmup: stays in the ramp.
        let s = LinearWarmupDecay::new(2e-3, 20_000, 10, StepInterval::Step);
        assert!((s.lr_at(10) - 2e-3 * 10.0 / 20_000.0).abs() < EPS);
        assert!((s.lr_at(20_000)).abs() < EPS);
    }

    #[test]
    fn test_tick_respects_interval() {
        let mut per_epoch = LinearWarmupDecay::new(1.0, 4, 8, StepInterval::Epoch);
        per_epoch.tick(StepInterval::Step);
        per_epoch.tick(StepInterval::Step);
        assert_eq!(per_epoch.current_step(), 0);
        per_epoch.tick(StepInterval::Epoch);
        assert_eq!(per_epoch.current_step(), 1);
        assert!((per_epoch.current_lr() - 0.25).abs() < EPS);
    }

    #[test]
    fn test_resume_from_saved_step() {
        let s = LinearWarmupDecay::new(1.0, 4, 8, StepInterval::Step).with_step(6);
        assert_eq!(s.current_step(), 6);
        assert!((s.current_lr() - 0.5).abs() < EPS);
    }
}

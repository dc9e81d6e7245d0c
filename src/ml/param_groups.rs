// ============================================================
// Layer 5 — Parameter Groups
// ============================================================
// Declares, once per constructed model, which optimizer owns each
// parameter:
//
//   Phase      — structural: every parameter reachable from
//                `model.encoder` is Phase1, every parameter reachable
//                from `model.decoder` is Phase2. The model has no
//                other parameters, so nothing is left unassigned.
//   DecayClass — by rank: rank-1 tensors (biases, LayerNorm
//                gamma/beta) are NoDecay, all others Decay.
//
// The resulting ParamId lists feed GradientsParams::from_params, so
// each optimizer only ever receives gradients for its own group.

use std::collections::HashMap;

use burn::{
    module::{Module, ModuleVisitor, ParamId},
    prelude::*,
};

use crate::domain::params::{DecayClass, Phase};
use crate::ml::model::AbsSummModel;

/// Where a single parameter belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamAssignment {
    pub phase: Phase,
    pub decay: DecayClass,
}

/// Decay / no-decay split of one phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseGroups {
    pub decay:           Vec<ParamId>,
    pub no_decay:        Vec<ParamId>,
    /// Scalar element counts, for logging and coverage checks
    pub decay_numel:     usize,
    pub no_decay_numel:  usize,
}

impl PhaseGroups {
    pub fn ids(&self, class: DecayClass) -> &[ParamId] {
        match class {
            DecayClass::Decay   => &self.decay,
            DecayClass::NoDecay => &self.no_decay,
        }
    }

    pub fn numel(&self) -> usize {
        self.decay_numel + self.no_decay_numel
    }
}

#[derive(Debug, Clone)]
pub struct ParamGroups {
    pub phase1: PhaseGroups,
    pub phase2: PhaseGroups,
    assignments: HashMap<ParamId, ParamAssignment>,
}

impl ParamGroups {
    /// Walk both halves of the model and record every parameter.
    pub fn declare<B: Backend>(model: &AbsSummModel<B>) -> Self {
        let mut phase1 = GroupCollector::default();
        model.encoder.visit(&mut phase1);

        let mut phase2 = GroupCollector::default();
        model.decoder.visit(&mut phase2);

        let mut assignments = HashMap::new();
        for (groups, phase) in [(&phase1.groups, Phase::Phase1), (&phase2.groups, Phase::Phase2)] {
            for decay in [DecayClass::Decay, DecayClass::NoDecay] {
                for id in groups.ids(decay) {
                    assignments.insert(*id, ParamAssignment { phase, decay });
                }
            }
        }

        let groups = Self { phase1: phase1.groups, phase2: phase2.groups, assignments };
        tracing::info!(
            "Parameter groups over {} tensors: phase1 {} decay / {} no-decay ({} scalars), phase2 {} decay / {} no-decay ({} scalars)",
            groups.len(),
            groups.phase1.decay.len(),
            groups.phase1.no_decay.len(),
            groups.phase1.numel(),
            groups.phase2.decay.len(),
            groups.phase2.no_decay.len(),
            groups.phase2.numel(),
        );
        groups
    }

    pub fn phase(&self, phase: Phase) -> &PhaseGroups {
        match phase {
            Phase::Phase1 => &self.phase1,
            Phase::Phase2 => &self.phase2,
        }
    }

    /// Owner of a parameter, if it belongs to the declared model.
    pub fn lookup(&self, id: &ParamId) -> Option<ParamAssignment> {
        self.assignments.get(id).copied()
    }

    /// Number of distinct parameter tensors across all groups
    pub fn len(&self) -> usize {
        self.assignments.len()
    }
}

#[derive(Default)]
struct GroupCollector {
    groups: PhaseGroups,
}

impl<B: Backend> ModuleVisitor<B> for GroupCollector {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        let numel = tensor.shape().num_elements();
        match DecayClass::for_rank(D) {
            DecayClass::Decay => {
                self.groups.decay.push(id);
                self.groups.decay_numel += numel;
            }
            DecayClass::NoDecay => {
                self.groups.no_decay.push(id);
                self.groups.no_decay_numel += numel;
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::test_utils::tiny_config;
    use burn::backend::NdArray;
    use std::collections::HashSet;

    type TestBackend = NdArray;

    fn groups() -> (AbsSummModel<TestBackend>, ParamGroups) {
        let model: AbsSummModel<TestBackend> = tiny_config(30).init(&Default::default());
        let groups = ParamGroups::declare(&model);
        (model, groups)
    }

    #[test]
    fn test_partition_is_disjoint() {
        let (_, groups) = groups();
        let all: Vec<ParamId> = [&groups.phase1, &groups.phase2]
            .iter()
            .flat_map(|g| g.decay.iter().chain(g.no_decay.iter()).copied())
            .collect();
        let unique: HashSet<ParamId> = all.iter().copied().collect();

        assert_eq!(all.len(), unique.len());
        assert_eq!(groups.len(), all.len());
    }

    #[test]
    fn test_partition_covers_every_parameter() {
        let (model, groups) = groups();
        assert_eq!(groups.phase1.numel() + groups.phase2.numel(), model.num_params());
        assert_eq!(groups.phase1.numel(), model.encoder.num_params());
        assert_eq!(groups.phase2.numel(), model.decoder.num_params());
    }

    #[test]
    fn test_known_parameters_are_assigned() {
        let (model, groups) = groups();

        let embedding = groups.lookup(&model.encoder.embeddings.token.weight.id).unwrap();
        assert_eq!(embedding, ParamAssignment { phase: Phase::Phase1, decay: DecayClass::Decay });

        let norm_gamma = groups.lookup(&model.encoder.embeddings.norm.gamma.id).unwrap();
        assert_eq!(norm_gamma.decay, DecayClass::NoDecay);

        let generator = &model.decoder.generator;
        assert_eq!(
            groups.lookup(&generator.weight.id),
            Some(ParamAssignment { phase: Phase::Phase2, decay: DecayClass::Decay })
        );
        let bias_id = generator.bias.as_ref().map(|b| b.id).unwrap();
        assert_eq!(
            groups.lookup(&bias_id),
            Some(ParamAssignment { phase: Phase::Phase2, decay: DecayClass::NoDecay })
        );
    }

    #[test]
    fn test_foreign_parameter_is_unassigned() {
        let (_, groups) = groups();
        let other: AbsSummModel<TestBackend> = tiny_config(30).init(&Default::default());
        assert_eq!(groups.lookup(&other.decoder.generator.weight.id), None);
    }

    #[test]
    fn test_every_phase_has_both_classes() {
        let (_, groups) = groups();
        for phase in [Phase::Phase1, Phase::Phase2] {
            let g = groups.phase(phase);
            assert!(!g.decay.is_empty(), "{phase} has no decay params");
            assert!(!g.no_decay.is_empty(), "{phase} has no no-decay params");
        }
    }
}

// ============================================================
// Layer 5 — Masked Cross-Entropy
// ============================================================
// Batch loss for summarization with the gold target as decoder input:
//
//   for each example i:
//       k_i    = sum(tgt_mask[i])                (valid prefix length)
//       loss_i = mean_{t < k_i} -log softmax(logits[i, t])[tgt[i, t]]
//   loss = sum_i loss_i                          (sum, not mean)
//
// Only the first k_i positions count, whatever the mask holds
// beyond them. An example with k_i = 0 contributes exactly 0.
//
// Everything stays on-device so the loss is differentiable on
// autodiff backends.

use burn::{prelude::*, tensor::activation::log_softmax};

/// logits [batch, tgt_len, vocab], tgt_ids / tgt_mask [batch, tgt_len] → [1]
pub fn masked_cross_entropy<B: Backend>(
    logits:   Tensor<B, 3>,
    tgt_ids:  Tensor<B, 2, Int>,
    tgt_mask: Tensor<B, 2, Int>,
) -> Tensor<B, 1> {
    let [batch_size, tgt_len, _] = logits.dims();
    let device = logits.device();

    // Cross-entropy against a one-hot target picks out log p[target].
    let log_probs = log_softmax(logits, 2);
    let target_log_probs = log_probs
        .gather(2, tgt_ids.unsqueeze_dim::<3>(2))
        .reshape([batch_size, tgt_len]);

    let valid_len = tgt_mask.sum_dim(1); // [batch, 1]
    let positions = Tensor::<B, 1, Int>::arange(0..tgt_len as i64, &device)
        .unsqueeze::<2>()
        .expand([batch_size, tgt_len]);
    let in_prefix = positions
        .lower(valid_len.clone().expand([batch_size, tgt_len]))
        .float();

    let per_example = (target_log_probs.neg() * in_prefix).sum_dim(1)
        / valid_len.float().clamp_min(1.0);

    per_example.sum()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    type TestBackend = NdArray;

    fn logits_tensor<B: Backend>(values: &[f32], dims: [usize; 3]) -> Tensor<B, 3> {
        Tensor::from_data(TensorData::new(values.to_vec(), dims), &Default::default())
    }

    fn int_tensor<B: Backend>(values: &[i32], dims: [usize; 2]) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints(values, &Default::default()).reshape(dims)
    }

    fn scalar<B: Backend>(t: Tensor<B, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    /// Reference cross-entropy for one position, in f64.
    fn position_ce(row: &[f32], target: usize) -> f64 {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
        let log_sum = row.iter().map(|&x| (x as f64 - max).exp()).sum::<f64>().ln() + max;
        log_sum - row[target] as f64
    }

    #[test]
    fn test_two_example_scenario_matches_hand_computation() {
        // batch 2, tgt_len 3, vocab 5; masks [1,1,0] and [1,0,0]
        let values: Vec<f32> = (0..30).map(|i| ((i * 7) % 11) as f32 * 0.3 - 1.0).collect();
        let tgt     = [1, 3, 4, 2, 0, 0];
        let mask    = [1, 1, 0, 1, 0, 0];

        let loss = masked_cross_entropy(
            logits_tensor::<TestBackend>(&values, [2, 3, 5]),
            int_tensor(&tgt, [2, 3]),
            int_tensor(&mask, [2, 3]),
        );

        let row = |b: usize, t: usize| &values[(b * 3 + t) * 5..(b * 3 + t + 1) * 5];
        let first  = (position_ce(row(0, 0), 1) + position_ce(row(0, 1), 3)) / 2.0;
        let second = position_ce(row(1, 0), 2);

        let got = scalar(loss);
        assert!((got - (first + second)).abs() < 1e-4, "got {got}, expected {}", first + second);
    }

    #[test]
    fn test_confident_correct_prediction_has_near_zero_loss() {
        let targets = [2, 0, 4, 1];
        let mut values = vec![0.0f32; 4 * 5];
        for (t, &id) in targets.iter().enumerate() {
            values[t * 5 + id as usize] = 40.0;
        }

        let loss = masked_cross_entropy(
            logits_tensor::<TestBackend>(&values, [1, 4, 5]),
            int_tensor(&targets, [1, 4]),
            int_tensor(&[1, 1, 1, 1], [1, 4]),
        );

        assert!(scalar(loss) < 1e-5);
    }

    #[test]
    fn test_positions_past_valid_prefix_do_not_matter() {
        let base: Vec<f32> = (0..2 * 4 * 5).map(|i| (i % 9) as f32 * 0.25).collect();
        let mask = [1, 1, 0, 0, 1, 1, 1, 0];

        let mut perturbed = base.clone();
        // example 0 positions 2..4, example 1 position 3
        for idx in (10..20).chain(35..40) {
            perturbed[idx] += 7.5;
        }

        let loss_a = masked_cross_entropy(
            logits_tensor::<TestBackend>(&base, [2, 4, 5]),
            int_tensor(&[1, 2, 3, 4, 0, 1, 2, 3], [2, 4]),
            int_tensor(&mask, [2, 4]),
        );
        let loss_b = masked_cross_entropy(
            logits_tensor::<TestBackend>(&perturbed, [2, 4, 5]),
            int_tensor(&[1, 2, 0, 0, 0, 1, 2, 4], [2, 4]),
            int_tensor(&mask, [2, 4]),
        );

        assert!((scalar(loss_a) - scalar(loss_b)).abs() < 1e-6);
    }

    #[test]
    fn test_example_without_valid_positions_contributes_zero() {
        let values: Vec<f32> = (0..2 * 2 * 3).map(|i| i as f32 * 0.1).collect();

        let both = masked_cross_entropy(
            logits_tensor::<TestBackend>(&values, [2, 2, 3]),
            int_tensor(&[0, 1, 2, 2], [2, 2]),
            int_tensor(&[1, 1, 0, 0], [2, 2]),
        );
        let first_only = masked_cross_entropy(
            logits_tensor::<TestBackend>(&values[..6], [1, 2, 3]),
            int_tensor(&[0, 1], [1, 2]),
            int_tensor(&[1, 1], [1, 2]),
        );

        let both = scalar(both);
        assert!(both.is_finite());
        assert!((both - scalar(first_only)).abs() < 1e-6);
    }

    #[test]
    fn test_random_batches_give_finite_non_negative_loss() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..25 {
            let batch = rng.gen_range(1..5);
            let len   = rng.gen_range(1..7);
            let vocab = rng.gen_range(2..12);

            let values: Vec<f32> = (0..batch * len * vocab).map(|_| rng.gen_range(-6.0..6.0)).collect();
            let tgt: Vec<i32> = (0..batch * len).map(|_| rng.gen_range(0..vocab as i32)).collect();
            let mut mask = Vec::with_capacity(batch * len);
            for _ in 0..batch {
                let k = rng.gen_range(1..=len);
                mask.extend((0..len).map(|t| (t < k) as i32));
            }

            let loss = scalar(masked_cross_entropy(
                logits_tensor::<TestBackend>(&values, [batch, len, vocab]),
                int_tensor(&tgt, [batch, len]),
                int_tensor(&mask, [batch, len]),
            ));
            assert!(loss.is_finite() && loss >= 0.0, "loss = {loss}");
        }
    }

    #[test]
    fn test_masked_positions_receive_no_gradient() {
        type AD = Autodiff<TestBackend>;

        let values: Vec<f32> = (0..3 * 4).map(|i| i as f32 * 0.2).collect();
        let logits = logits_tensor::<AD>(&values, [1, 3, 4]).require_grad();

        let loss = masked_cross_entropy(
            logits.clone(),
            int_tensor(&[1, 2, 3], [1, 3]),
            int_tensor(&[1, 0, 0], [1, 3]),
        );
        let grads = loss.backward();
        let grad: Vec<f32> = logits.grad(&grads).unwrap().into_data().iter::<f32>().collect();

        assert!(grad[..4].iter().any(|g| g.abs() > 0.0));
        assert!(grad[4..].iter().all(|g| *g == 0.0));
    }
}

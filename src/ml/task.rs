// ============================================================
// Layer 5 — Summarization Task (training wrapper)
// ============================================================
// Owns the model and exposes the three lifecycle hooks the
// training loop drives:
//
//   training_step   — forward + masked loss on an autodiff backend
//   validation_step — same loss on the inner backend, as a number
//   predict_step    — greedy parallel decode into text
//
// Optimizer construction lives in ml::optim; the task only needs
// to hand its model to the optimizers and take it back.

use std::{marker::PhantomData, sync::Arc};

use anyhow::{ensure, Result};
use burn::{
    module::AutodiffModule,
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend},
};

use crate::data::batcher::SummBatch;
use crate::domain::error::SummError;
use crate::domain::traits::TokenDecoder;
use crate::ml::loss::masked_cross_entropy;
use crate::ml::model::{ModelInput, SummarizationModel};

/// Result of a training step.
pub struct StepOutput<B: Backend> {
    /// Differentiable batch loss
    pub loss:       Tensor<B, 1>,
    /// Detached copy for logging
    pub loss_value: f64,
}

pub struct SummTask<B: Backend, M> {
    model:      M,
    vocab_size: usize,
    decoder:    Option<Arc<dyn TokenDecoder>>,
    _backend:   PhantomData<B>,
}

impl<B: Backend, M: SummarizationModel<B>> SummTask<B, M> {
    pub fn new(model: M, vocab_size: usize) -> Self {
        Self { model, vocab_size, decoder: None, _backend: PhantomData }
    }

    /// Attach the tokenizer used by `predict_step`.
    pub fn with_decoder(mut self, decoder: Arc<dyn TokenDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Replace the model, e.g. with the result of an optimizer step.
    pub fn map_model(mut self, f: impl FnOnce(M) -> M) -> Self {
        self.model = f(self.model);
        self
    }

    /// Logits [batch, tgt_len, vocab_size] for a batch.
    pub fn forward(&self, batch: &SummBatch<B>) -> Result<Tensor<B, 3>> {
        batch.check_batch_dims()?;

        let logits = self.model.forward(ModelInput::from_batch(batch));
        let [batch_size, tgt_len, vocab] = logits.dims();
        ensure!(
            batch_size == batch.batch_size() && tgt_len == batch.target_len(),
            "model returned logits [{batch_size}, {tgt_len}, _] for a batch of [{}, {}]",
            batch.batch_size(),
            batch.target_len(),
        );
        ensure!(
            vocab == self.vocab_size,
            "model returned {vocab} vocabulary logits, expected {}",
            self.vocab_size,
        );
        Ok(logits)
    }

    /// Sum over the batch of per-example masked cross-entropy.
    pub fn loss(&self, batch: &SummBatch<B>) -> Result<Tensor<B, 1>> {
        let logits = self.forward(batch)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let empty = batch.tgt_mask.clone().sum_dim(1).equal_elem(0).int().sum().into_scalar().elem::<i64>();
            if empty > 0 {
                tracing::debug!("{} example(s) with no valid target positions contribute 0 loss", empty);
            }
        }
        Ok(masked_cross_entropy(logits, batch.tgt_ids.clone(), batch.tgt_mask.clone()))
    }

    /// Batch loss as a plain number. Call on a `valid()` task so no
    /// gradient graph is recorded.
    pub fn validation_step(&self, batch: &SummBatch<B>) -> Result<f64> {
        let loss = self.loss(batch)?.into_scalar().elem::<f64>();
        tracing::debug!("val_loss={:.6}", loss);
        Ok(loss)
    }

    /// Greedy, non-autoregressive decode: one parallel pass with the
    /// target ids as decoder input, argmax per position, tokenizer
    /// decode per example.
    pub fn predict_step(&self, batch: &SummBatch<B>) -> Result<Vec<String>> {
        let decoder = self.decoder.as_ref().ok_or(SummError::MissingTokenizer)?;

        let logits = self.forward(batch)?;
        let [batch_size, tgt_len, _] = logits.dims();

        let predicted = softmax(logits, 2).argmax(2).reshape([batch_size, tgt_len]);
        let ids: Vec<u32> = predicted
            .into_data()
            .iter::<i64>()
            .map(|id| id as u32)
            .collect();

        ids.chunks(tgt_len.max(1))
            .take(batch_size)
            .map(|row| decoder.decode_ids(row))
            .collect()
    }
}

impl<B, M> SummTask<B, M>
where
    B: AutodiffBackend,
    M: SummarizationModel<B> + AutodiffModule<B>,
{
    pub fn training_step(&self, batch: &SummBatch<B>) -> Result<StepOutput<B>> {
        let loss = self.loss(batch)?;
        let loss_value = loss.clone().detach().into_scalar().elem::<f64>();
        tracing::debug!("train_loss={:.6}", loss_value);
        Ok(StepOutput { loss, loss_value })
    }

    /// Same task over the inner backend: no autodiff, dropout off.
    pub fn valid(&self) -> SummTask<B::InnerBackend, M::InnerModule> {
        SummTask {
            model:      self.model.valid(),
            vocab_size: self.vocab_size,
            decoder:    self.decoder.clone(),
            _backend:   PhantomData,
        }
    }
}

// ============================================================
// Layer 4 — Summarization Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<SummSample>
// into the fixed 8-tensor batch the training wrapper consumes:
//
//   0 src_ids         [batch, src_len]
//   1 src_token_type  [batch, src_len]
//   2 src_cls_pos     [batch, n_src_cls]
//   3 src_mask        [batch, src_len]
//   4 tgt_ids         [batch, tgt_len]
//   5 tgt_token_type  [batch, tgt_len]
//   6 tgt_cls_pos     [batch, n_tgt_cls]
//   7 tgt_mask        [batch, tgt_len]
//
// Sequences are padded to the longest sample in the batch, capped
// at the model's maximum lengths. Masks are prefix masks: the first
// len(ids) positions are 1, the padding tail is 0. CLS position
// lists are padded with 0 and positions beyond the truncated
// source are dropped.
//
// Every dimension is at least 1 so an all-empty target still
// yields a well-formed (fully masked) tensor.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::error::SummError;
use crate::domain::sample::SummSample;

// ─── SummBatch ────────────────────────────────────────────────────────────────
/// A batch of summarization samples in the fixed tuple order.
#[derive(Debug, Clone)]
pub struct SummBatch<B: Backend> {
    pub src_ids:        Tensor<B, 2, Int>,
    pub src_token_type: Tensor<B, 2, Int>,
    pub src_cls_pos:    Tensor<B, 2, Int>,
    /// 1 = real source token, 0 = padding
    pub src_mask:       Tensor<B, 2, Int>,
    pub tgt_ids:        Tensor<B, 2, Int>,
    pub tgt_token_type: Tensor<B, 2, Int>,
    pub tgt_cls_pos:    Tensor<B, 2, Int>,
    /// 1 = target position contributes to the loss
    pub tgt_mask:       Tensor<B, 2, Int>,
}

const FIELD_NAMES: [&str; 8] = [
    "src_ids", "src_token_type", "src_cls_pos", "src_mask",
    "tgt_ids", "tgt_token_type", "tgt_cls_pos", "tgt_mask",
];

impl<B: Backend> SummBatch<B> {
    /// Assemble a batch from tensors given in tuple order.
    ///
    /// Fails if there are not exactly 8 tensors or if they disagree
    /// on the leading (batch) dimension.
    pub fn from_tensors(tensors: Vec<Tensor<B, 2, Int>>) -> Result<Self, SummError> {
        let arity = tensors.len();
        let [src_ids, src_token_type, src_cls_pos, src_mask, tgt_ids, tgt_token_type, tgt_cls_pos, tgt_mask]: [Tensor<B, 2, Int>; 8] =
            tensors.try_into().map_err(|_| SummError::BatchArity(arity))?;

        let batch = Self {
            src_ids, src_token_type, src_cls_pos, src_mask,
            tgt_ids, tgt_token_type, tgt_cls_pos, tgt_mask,
        };
        batch.check_batch_dims()?;
        Ok(batch)
    }

    /// Number of examples in the batch
    pub fn batch_size(&self) -> usize {
        self.src_ids.dims()[0]
    }

    /// Target sequence length (second dimension of `tgt_ids`)
    pub fn target_len(&self) -> usize {
        self.tgt_ids.dims()[1]
    }

    /// Every tensor must share the leading dimension of `src_ids`.
    pub fn check_batch_dims(&self) -> Result<(), SummError> {
        let expected = self.batch_size();
        let dims = [
            self.src_ids.dims()[0],
            self.src_token_type.dims()[0],
            self.src_cls_pos.dims()[0],
            self.src_mask.dims()[0],
            self.tgt_ids.dims()[0],
            self.tgt_token_type.dims()[0],
            self.tgt_cls_pos.dims()[0],
            self.tgt_mask.dims()[0],
        ];

        for (name, found) in FIELD_NAMES.iter().zip(dims) {
            if found != expected {
                return Err(SummError::BatchDimMismatch { name, expected, found });
            }
        }
        Ok(())
    }
}

// ─── SummBatcher ──────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SummBatcher<B: Backend> {
    pub device:      B::Device,
    pub pad_id:      u32,
    pub max_src_len: usize,
    pub max_tgt_len: usize,
}

impl<B: Backend> SummBatcher<B> {
    pub fn new(device: B::Device, pad_id: u32, max_src_len: usize, max_tgt_len: usize) -> Self {
        Self { device, pad_id, max_src_len, max_tgt_len }
    }

    fn int_tensor(&self, flat: Vec<i32>, rows: usize, cols: usize) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device).reshape([rows, cols])
    }
}

/// Ids, token types and prefix mask for one side (source or target),
/// flattened row-major.
struct PaddedSide {
    ids:        Vec<i32>,
    token_type: Vec<i32>,
    mask:       Vec<i32>,
    cls_pos:    Vec<i32>,
    len:        usize,
    n_cls:      usize,
}

fn pad_side<'a>(
    rows:    impl Iterator<Item = (&'a [u32], &'a [u32], &'a [u32])> + Clone,
    max_len: usize,
    pad_id:  u32,
) -> PaddedSide {
    let len = rows.clone().map(|(ids, _, _)| ids.len()).max().unwrap_or(0).min(max_len).max(1);

    let kept_cls = |cls: &'a [u32]| cls.iter().copied().filter(move |&p| (p as usize) < len);
    let n_cls = rows.clone().map(|(_, _, cls)| kept_cls(cls).count()).max().unwrap_or(0).max(1);

    let mut side = PaddedSide {
        ids:        Vec::new(),
        token_type: Vec::new(),
        mask:       Vec::new(),
        cls_pos:    Vec::new(),
        len,
        n_cls,
    };

    for (ids, token_type, cls) in rows {
        let used = ids.len().min(len);
        for pos in 0..len {
            if pos < used {
                side.ids.push(ids[pos] as i32);
                side.token_type.push(token_type.get(pos).copied().unwrap_or(0) as i32);
                side.mask.push(1);
            } else {
                side.ids.push(pad_id as i32);
                side.token_type.push(0);
                side.mask.push(0);
            }
        }

        let mut row_cls: Vec<i32> = kept_cls(cls).map(|p| p as i32).collect();
        row_cls.resize(n_cls, 0);
        side.cls_pos.extend(row_cls);
    }

    side
}

impl<B: Backend> Batcher<SummSample, SummBatch<B>> for SummBatcher<B> {
    fn batch(&self, items: Vec<SummSample>) -> SummBatch<B> {
        let batch_size = items.len();

        let src = pad_side(
            items.iter().map(|s| (s.src_ids.as_slice(), s.src_token_type.as_slice(), s.src_cls_pos.as_slice())),
            self.max_src_len,
            self.pad_id,
        );
        let tgt = pad_side(
            items.iter().map(|s| (s.tgt_ids.as_slice(), s.tgt_token_type.as_slice(), s.tgt_cls_pos.as_slice())),
            self.max_tgt_len,
            self.pad_id,
        );

        SummBatch {
            src_ids:        self.int_tensor(src.ids, batch_size, src.len),
            src_token_type: self.int_tensor(src.token_type, batch_size, src.len),
            src_cls_pos:    self.int_tensor(src.cls_pos, batch_size, src.n_cls),
            src_mask:       self.int_tensor(src.mask, batch_size, src.len),
            tgt_ids:        self.int_tensor(tgt.ids, batch_size, tgt.len),
            tgt_token_type: self.int_tensor(tgt.token_type, batch_size, tgt.len),
            tgt_cls_pos:    self.int_tensor(tgt.cls_pos, batch_size, tgt.n_cls),
            tgt_mask:       self.int_tensor(tgt.mask, batch_size, tgt.len),
        }
    }
}

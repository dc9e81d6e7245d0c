// ============================================================
// Layer 5 — Abstractive Summarizer (Burn)
// ============================================================
// BERT-style encoder (phase1) + transformer decoder (phase2):
//
//   src ids ─► token + position + segment embeddings
//           ─► N × [self-attention → add & norm → FFN → add & norm]
//           ─► memory
//   tgt ids ─► shift right ─► embeddings
//           ─► N × [causal self-attention → cross-attention(memory)
//                   → FFN, each with add & norm]
//           ─► generator ─► logits [batch, tgt_len, vocab]
//
// The two halves are separate modules so each phase optimizer is
// typed over exactly the parameters it owns.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Liu & Lapata (2019) Text Summarization with Pretrained Encoders

use burn::{
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

use crate::data::batcher::SummBatch;

// ─── Model contract ───────────────────────────────────────────────────────────

/// Named inputs of a summarization model. Mirrors the batch tuple
/// minus the target CLS positions, which no model consumes.
#[derive(Debug, Clone)]
pub struct ModelInput<B: Backend> {
    pub src_ids:        Tensor<B, 2, Int>,
    pub src_pad_mask:   Tensor<B, 2, Int>,
    pub src_token_type: Tensor<B, 2, Int>,
    pub src_cls_pos:    Tensor<B, 2, Int>,
    pub tgt_ids:        Tensor<B, 2, Int>,
    pub tgt_pad_mask:   Tensor<B, 2, Int>,
    pub tgt_token_type: Tensor<B, 2, Int>,
}

impl<B: Backend> ModelInput<B> {
    pub fn from_batch(batch: &SummBatch<B>) -> Self {
        Self {
            src_ids:        batch.src_ids.clone(),
            src_pad_mask:   batch.src_mask.clone(),
            src_token_type: batch.src_token_type.clone(),
            src_cls_pos:    batch.src_cls_pos.clone(),
            tgt_ids:        batch.tgt_ids.clone(),
            tgt_pad_mask:   batch.tgt_mask.clone(),
            tgt_token_type: batch.tgt_token_type.clone(),
        }
    }
}

/// Anything that maps a batch to per-position vocabulary logits.
pub trait SummarizationModel<B: Backend> {
    /// Returns logits of shape [batch, tgt_len, vocab_size].
    fn forward(&self, input: ModelInput<B>) -> Tensor<B, 3>;
}

// ─── Configuration ────────────────────────────────────────────────────────────

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct AbsSummConfig {
    pub vocab_size: usize,
    #[config(default = 512)]
    pub max_src_len: usize,
    #[config(default = 128)]
    pub max_tgt_len: usize,
    #[config(default = 256)]
    pub d_model: usize,
    #[config(default = 8)]
    pub num_heads: usize,
    #[config(default = 6)]
    pub encoder_layers: usize,
    #[config(default = 6)]
    pub decoder_layers: usize,
    #[config(default = 1024)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    /// Number of BERT segment ids
    #[config(default = 2)]
    pub type_vocab_size: usize,
    /// Token fed to the decoder before the first target token
    #[config(default = 0)]
    pub decoder_start_id: usize,
}

impl AbsSummConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AbsSummModel<B> {
        AbsSummModel {
            encoder: self.init_encoder(device),
            decoder: self.init_decoder(device),
        }
    }

    fn init_embeddings<B: Backend>(&self, max_len: usize, device: &B::Device) -> SummEmbeddings<B> {
        SummEmbeddings {
            token:      EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            position:   EmbeddingConfig::new(max_len, self.d_model).init(device),
            token_type: EmbeddingConfig::new(self.type_vocab_size, self.d_model).init(device),
            norm:       LayerNormConfig::new(self.d_model).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }

    fn init_ffn<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        FeedForward {
            linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
        }
    }

    fn init_attention<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device)
    }

    fn init_encoder<B: Backend>(&self, device: &B::Device) -> Phase1Encoder<B> {
        let layers = (0..self.encoder_layers)
            .map(|_| EncoderBlock {
                self_attn: self.init_attention(device),
                ffn:       self.init_ffn(device),
                norm1:     LayerNormConfig::new(self.d_model).init(device),
                norm2:     LayerNormConfig::new(self.d_model).init(device),
                dropout:   DropoutConfig::new(self.dropout).init(),
            })
            .collect();
        Phase1Encoder {
            embeddings: self.init_embeddings(self.max_src_len, device),
            layers,
        }
    }

    fn init_decoder<B: Backend>(&self, device: &B::Device) -> Phase2Decoder<B> {
        let layers = (0..self.decoder_layers)
            .map(|_| DecoderBlock {
                self_attn:  self.init_attention(device),
                cross_attn: self.init_attention(device),
                ffn:        self.init_ffn(device),
                norm1:      LayerNormConfig::new(self.d_model).init(device),
                norm2:      LayerNormConfig::new(self.d_model).init(device),
                norm3:      LayerNormConfig::new(self.d_model).init(device),
                dropout:    DropoutConfig::new(self.dropout).init(),
            })
            .collect();
        Phase2Decoder {
            embeddings: self.init_embeddings(self.max_tgt_len, device),
            layers,
            generator:  LinearConfig::new(self.d_model, self.vocab_size).init(device),
            start_id:   self.decoder_start_id,
        }
    }
}

// ─── Building blocks ──────────────────────────────────────────────────────────

/// Token + position + segment embeddings, BERT style.
#[derive(Module, Debug)]
pub struct SummEmbeddings<B: Backend> {
    pub token:      Embedding<B>,
    pub position:   Embedding<B>,
    pub token_type: Embedding<B>,
    pub norm:       LayerNorm<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> SummEmbeddings<B> {
    pub fn forward(&self, ids: Tensor<B, 2, Int>, token_type: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = ids.dims();
        let device = ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);

        let x = self.token.forward(ids)
            + self.position.forward(positions)
            + self.token_type.forward(token_type);
        self.dropout.forward(self.norm.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub linear1: Linear<B>,
    pub linear2: Linear<B>,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.linear2.forward(burn::tensor::activation::gelu(self.linear1.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn: MultiHeadAttention<B>,
    pub ffn:       FeedForward<B>,
    pub norm1:     LayerNorm<B>,
    pub norm2:     LayerNorm<B>,
    pub dropout:   Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask`: true where the key position is padding
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn = self.self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(pad_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn));
        let ffn_out = self.ffn.forward(x.clone());
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn:  MultiHeadAttention<B>,
    pub cross_attn: MultiHeadAttention<B>,
    pub ffn:        FeedForward<B>,
    pub norm1:      LayerNorm<B>,
    pub norm2:      LayerNorm<B>,
    pub norm3:      LayerNorm<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(
        &self,
        x:           Tensor<B, 3>,
        memory:      Tensor<B, 3>,
        causal_mask: Tensor<B, 3, Bool>,
        memory_pad:  Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let self_out = self.self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_attn(causal_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(self_out));

        let cross_out = self.cross_attn
            .forward(MhaInput::new(x.clone(), memory.clone(), memory).mask_pad(memory_pad))
            .context;
        let x = self.norm2.forward(x + self.dropout.forward(cross_out));

        let ffn_out = self.ffn.forward(x.clone());
        self.norm3.forward(x + self.dropout.forward(ffn_out))
    }
}

// ─── Phase 1: encoder ─────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Phase1Encoder<B: Backend> {
    pub embeddings: SummEmbeddings<B>,
    pub layers:     Vec<EncoderBlock<B>>,
}

impl<B: Backend> Phase1Encoder<B> {
    /// ids, token_type, pad_mask: [batch, src_len] → memory [batch, src_len, d_model]
    pub fn forward(
        &self,
        ids:        Tensor<B, 2, Int>,
        token_type: Tensor<B, 2, Int>,
        pad_mask:   Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let mut x = self.embeddings.forward(ids, token_type);
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        x
    }
}

// ─── Phase 2: decoder ─────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Phase2Decoder<B: Backend> {
    pub embeddings: SummEmbeddings<B>,
    pub layers:     Vec<DecoderBlock<B>>,
    pub generator:  Linear<B>,
    pub start_id:   usize,
}

impl<B: Backend> Phase2Decoder<B> {
    /// One parallel pass over the gold target: position t sees target tokens < t.
    pub fn forward(
        &self,
        tgt_ids:        Tensor<B, 2, Int>,
        tgt_token_type: Tensor<B, 2, Int>,
        memory:         Tensor<B, 3>,
        memory_pad:     Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let [batch_size, tgt_len] = tgt_ids.dims();
        let device = tgt_ids.device();

        let inputs      = shift_right(tgt_ids, self.start_id as i64);
        let input_types = shift_right(tgt_token_type, 0);
        let causal_mask = generate_autoregressive_mask::<B>(batch_size, tgt_len, &device);

        let mut x = self.embeddings.forward(inputs, input_types);
        for layer in &self.layers {
            x = layer.forward(x, memory.clone(), causal_mask.clone(), memory_pad.clone());
        }
        self.generator.forward(x)
    }
}

/// Prepend `fill` to every row and drop the last column.
fn shift_right<B: Backend>(ids: Tensor<B, 2, Int>, fill: i64) -> Tensor<B, 2, Int> {
    let [batch_size, len] = ids.dims();
    if len == 0 {
        return ids;
    }
    let start = Tensor::<B, 2, Int>::full([batch_size, 1], fill, &ids.device());
    if len == 1 {
        return start;
    }
    Tensor::cat(vec![start, ids.slice([0..batch_size, 0..len - 1])], 1)
}

// ─── Full model ───────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct AbsSummModel<B: Backend> {
    /// Optimized by the phase1 optimizers
    pub encoder: Phase1Encoder<B>,
    /// Optimized by the phase2 optimizers
    pub decoder: Phase2Decoder<B>,
}

impl<B: Backend> SummarizationModel<B> for AbsSummModel<B> {
    fn forward(&self, input: ModelInput<B>) -> Tensor<B, 3> {
        // Source CLS positions are only meaningful for extractive scoring.
        let src_pad = input.src_pad_mask.equal_elem(0);
        let memory  = self.encoder.forward(input.src_ids, input.src_token_type, src_pad.clone());
        self.decoder.forward(input.tgt_ids, input.tgt_token_type, memory, src_pad)
    }
}

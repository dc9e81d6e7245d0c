// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. The other layers hand in samples,
// settings and a TokenDecoder, and get back losses, checkpoints
// and decoded strings.
//
//   model.rs        — encoder (phase1) + decoder (phase2) summarizer
//   loss.rs         — per-example masked cross-entropy
//   param_groups.rs — phase / decay-class partition of parameters
//   schedule.rs     — linear warmup-then-decay learning rate
//   optim.rs        — two AdamW pairs, one per phase
//   task.rs         — training / validation / predict steps
//   trainer.rs      — epoch loop, validation, checkpoints
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Liu & Lapata (2019) Text Summarization with Pretrained Encoders

pub mod model;

pub mod loss;

pub mod param_groups;

pub mod schedule;

pub mod optim;

pub mod task;

pub mod trainer;

#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::Path;

    use tokenizers::Tokenizer;

    use crate::infra::tokenizer_store::TokenizerStore;
    use crate::ml::model::AbsSummConfig;

    /// Smallest model that still has every component.
    pub fn tiny_config(vocab_size: usize) -> AbsSummConfig {
        AbsSummConfig::new(vocab_size)
            .with_max_src_len(16)
            .with_max_tgt_len(8)
            .with_d_model(16)
            .with_num_heads(2)
            .with_encoder_layers(1)
            .with_decoder_layers(1)
            .with_d_ff(32)
            .with_dropout(0.0)
    }

    /// Word-level tokenizer: [PAD]=0 hello=1 world=2 foo=3 bar=4 [UNK]=5.
    pub fn word_level_tokenizer(dir: &Path) -> Tokenizer {
        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {
                    "[PAD]": 0, "hello": 1, "world": 2, "foo": 3, "bar": 4, "[UNK]": 5
                },
                "unk_token": "[UNK]"
            }
        });
        let path = dir.join("tokenizer.json");
        std::fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
        TokenizerStore::load(&path).unwrap()
    }
}

// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands, `train`, `validate` and
// `predict`, and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::eval_use_case::EvalRequest;
use crate::application::train_use_case::TrainConfig;
use crate::domain::params::StepInterval;
use crate::ml::optim::OptimSettings;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the summarizer on <data-dir>/train.jsonl, validating on val.jsonl
    Train(TrainArgs),

    /// Report the average loss of a checkpoint on a split
    Validate(ValidateArgs),

    /// Greedy-decode a split with a checkpoint and print one summary per line
    Predict(PredictArgs),
}

/// Compute device for the run
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    /// NdArray CPU backend
    Cpu,
    /// WGPU backend (default adapter)
    Wgpu,
}

/// When phase2's learning-rate schedule advances
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntervalArg {
    Step,
    Epoch,
}

impl From<IntervalArg> for StepInterval {
    fn from(a: IntervalArg) -> Self {
        match a {
            IntervalArg::Step  => StepInterval::Step,
            IntervalArg::Epoch => StepInterval::Epoch,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory containing train.jsonl (and optionally val.jsonl)
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Directory to save checkpoints, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Resume from a checkpoint file or directory
    #[arg(long)]
    pub load_checkpoint: Option<String>,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Data-loading worker threads
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Shuffle seed for the training split
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Padding token id
    #[arg(long, default_value_t = 0)]
    pub pad_id: u32,

    /// Size of the tokenizer vocabulary the samples were encoded with
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    /// Source tokens kept per example
    #[arg(long, default_value_t = 512)]
    pub max_src_len: usize,

    /// Target tokens kept per example
    #[arg(long, default_value_t = 128)]
    pub max_tgt_len: usize,

    /// Hidden dimension shared by encoder and decoder
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 6)]
    pub encoder_layers: usize,

    #[arg(long, default_value_t = 6)]
    pub decoder_layers: usize,

    /// Inner dimension of the feed-forward networks
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Token fed to the decoder before the first target token
    #[arg(long, default_value_t = 0)]
    pub decoder_start_id: usize,

    /// Peak learning rate of the encoder (phase1)
    #[arg(long, default_value_t = 2e-3)]
    pub phase1_lr: f64,

    /// Peak learning rate of the decoder (phase2)
    #[arg(long, default_value_t = 0.1)]
    pub phase2_lr: f64,

    #[arg(long, default_value_t = 20_000)]
    pub phase1_warmup: usize,

    #[arg(long, default_value_t = 10_000)]
    pub phase2_warmup: usize,

    /// AdamW weight decay for weight matrices and embeddings
    #[arg(long, default_value_t = 0.01)]
    pub weight_decay: f32,

    /// Fixed schedule length; derived from epochs x batches when omitted
    #[arg(long)]
    pub total_steps: Option<usize>,

    /// Cadence of the phase2 schedule
    #[arg(long, value_enum, default_value_t = IntervalArg::Step)]
    pub phase2_interval: IntervalArg,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let mut optim = OptimSettings::default();
        optim.phase1.lr           = a.phase1_lr;
        optim.phase1.warmup_steps = a.phase1_warmup;
        optim.phase2.lr           = a.phase2_lr;
        optim.phase2.warmup_steps = a.phase2_warmup;
        optim.phase2.interval     = a.phase2_interval.into();
        optim.weight_decay        = a.weight_decay;
        optim.total_steps         = a.total_steps;

        TrainConfig {
            data_dir:         a.data_dir,
            checkpoint_dir:   a.checkpoint_dir,
            load_checkpoint:  a.load_checkpoint,
            batch_size:       a.batch_size,
            epochs:           a.epochs,
            num_workers:      a.num_workers,
            seed:             a.seed,
            pad_id:           a.pad_id,
            vocab_size:       a.vocab_size,
            max_src_len:      a.max_src_len,
            max_tgt_len:      a.max_tgt_len,
            d_model:          a.d_model,
            num_heads:        a.num_heads,
            encoder_layers:   a.encoder_layers,
            decoder_layers:   a.decoder_layers,
            d_ff:             a.d_ff,
            dropout:          a.dropout,
            decoder_start_id: a.decoder_start_id,
            optim,
        }
    }
}

/// All arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Split file to evaluate (<data-dir>/<split>.jsonl)
    #[arg(long, default_value = "val")]
    pub split: String,

    /// Checkpoint file, or a checkpoint directory to use its latest epoch
    #[arg(long, default_value = "checkpoints")]
    pub load_checkpoint: PathBuf,

    /// Defaults to the batch size the checkpoint was trained with
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl From<ValidateArgs> for EvalRequest {
    fn from(a: ValidateArgs) -> Self {
        EvalRequest {
            data_dir:   a.data_dir,
            split:      a.split,
            checkpoint: a.load_checkpoint,
            batch_size: a.batch_size,
            tokenizer:  None,
            output:     None,
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    #[arg(long, default_value = "test")]
    pub split: String,

    #[arg(long, default_value = "checkpoints")]
    pub load_checkpoint: PathBuf,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// tokenizer.json used to encode the samples, or its directory
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Also write predictions here, one per line
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl From<PredictArgs> for EvalRequest {
    fn from(a: PredictArgs) -> Self {
        EvalRequest {
            data_dir:   a.data_dir,
            split:      a.split,
            checkpoint: a.load_checkpoint,
            batch_size: a.batch_size,
            tokenizer:  a.tokenizer,
            output:     a.output,
        }
    }
}

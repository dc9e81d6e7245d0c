// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and dispatches to Layer 2.
//
//   1. `train`    — trains encoder + decoder with two-phase optimizers
//   2. `validate` — average loss of a checkpoint on a split
//   3. `predict`  — decoded summaries for a split
//
// `--device` picks the backend; everything below this layer is
// generic over it.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu};
use clap::Parser;
use commands::{Commands, DeviceKind, PredictArgs, TrainArgs, ValidateArgs};

use crate::application::{
    eval_use_case::EvalUseCase,
    train_use_case::TrainUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "summ-trainer",
    version = "0.1.0",
    about = "Train a two-phase encoder-decoder summarizer, then validate or decode with it."
)]
pub struct Cli {
    /// Compute device
    #[arg(long, value_enum, global = true, default_value_t = DeviceKind::Cpu)]
    pub device: DeviceKind,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        let device = self.device;
        match self.command {
            Commands::Train(args)    => run_train(device, args),
            Commands::Validate(args) => run_validate(device, args),
            Commands::Predict(args)  => run_predict(device, args),
        }
    }
}

fn run_train(device: DeviceKind, args: TrainArgs) -> Result<()> {
    tracing::info!("Starting training on samples in: {}", args.data_dir);
    let use_case = TrainUseCase::new(args.into());

    let summary = match device {
        DeviceKind::Cpu  => use_case.execute::<Autodiff<NdArray>>(NdArrayDevice::default())?,
        DeviceKind::Wgpu => use_case.execute::<Autodiff<Wgpu>>(WgpuDevice::default())?,
    };

    match summary.best_val_loss {
        Some(loss) => println!("Training complete. Best val_loss={loss:.4}."),
        None       => println!("Training complete."),
    }
    if let Some(path) = summary.last_checkpoint {
        println!("Last checkpoint: {}", path.display());
    }
    Ok(())
}

fn run_validate(device: DeviceKind, args: ValidateArgs) -> Result<()> {
    let split = args.split.clone();
    let use_case = EvalUseCase::new(args.into());

    let loss = match device {
        DeviceKind::Cpu  => use_case.validate::<NdArray>(NdArrayDevice::default())?,
        DeviceKind::Wgpu => use_case.validate::<Wgpu>(WgpuDevice::default())?,
    };

    match loss {
        Some(loss) => println!("{split}_loss={loss:.4}"),
        None       => println!("'{split}' split has no samples"),
    }
    Ok(())
}

fn run_predict(device: DeviceKind, args: PredictArgs) -> Result<()> {
    let use_case = EvalUseCase::new(args.into());

    let predictions = match device {
        DeviceKind::Cpu  => use_case.predict::<NdArray>(NdArrayDevice::default())?,
        DeviceKind::Wgpu => use_case.predict::<Wgpu>(WgpuDevice::default())?,
    };

    for line in &predictions {
        println!("{line}");
    }
    Ok(())
}

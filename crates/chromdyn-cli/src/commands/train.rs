use crate::cli::{SamplingArgs, TrainAdamArgs, TrainArgs, TrainCommands, TrainTypesArgs};
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use crate::utils::parser;
use chromdyn::analysis::FrameRange;
use chromdyn::core::forcefield::nonbonded::{DEFAULT_IC_DINIT, DEFAULT_MU, DEFAULT_RC};
use chromdyn::engine::progress::ProgressReporter;
use chromdyn::optimization::adam::AdamParams;
use chromdyn::optimization::types::{DEFAULT_EIG_CUTOFF, DEFAULT_TRAINING_DEND};
use chromdyn::workflows::train::{self, AdamPlan, TypeTrainingPlan};
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: TrainArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    match args.command {
        TrainCommands::Types(args) => {
            let plan = types_plan(args)?;
            info!(
                trajectories = plan.trajectories.len(),
                frames = %plan.frames,
                "Starting type training"
            );
            let summary = tokio::task::block_in_place(|| train::train_types(&plan, &reporter))?;
            println!(
                "✓ Trained on {} frame(s): type error {:.4}, ideal-chromosome error {:.4}",
                summary.frames, summary.type_error, summary.ideal_error
            );
            for path in &summary.files {
                println!("  wrote {}", path.display());
            }
        }
        TrainCommands::Adam(args) => {
            let plan = adam_plan(args)?;
            info!(
                iteration = plan.iteration,
                trajectories = plan.trajectories.len(),
                accumulators = plan.accumulators.len(),
                "Starting Adam training"
            );
            let summary = tokio::task::block_in_place(|| train::train_adam(&plan, &reporter))?;
            println!(
                "✓ Adam step from {} frame(s): error {:.4}, next iteration {}",
                summary.frames, summary.error, summary.iteration
            );
            for path in &summary.files {
                println!("  wrote {}", path.display());
            }
        }
    }
    Ok(())
}

fn frame_range(sampling: &SamplingArgs) -> Result<FrameRange> {
    parser::parse_frame_range(&sampling.frames).map_err(|e| CliError::Argument(e.to_string()))
}

fn check_samples(sampling: &SamplingArgs) -> Result<()> {
    if sampling.trajectories.is_empty() && sampling.accumulators.is_empty() {
        return Err(CliError::Argument(
            "training needs trajectories (-t) or saved accumulators (--accumulator)".to_string(),
        ));
    }
    Ok(())
}

fn types_plan(args: TrainTypesArgs) -> Result<TypeTrainingPlan> {
    check_samples(&args.sampling)?;
    Ok(TypeTrainingPlan {
        frames: frame_range(&args.sampling)?,
        sequence: args.sequence,
        trajectories: args.sampling.trajectories,
        accumulators: args.sampling.accumulators,
        save_accumulator: args.sampling.save_accumulator,
        hic: args.sampling.hic,
        output_dir: args.output_dir,
        current_types: args.current_types,
        current_ideal: args.current_ideal,
        mu: args.sampling.mu.unwrap_or(DEFAULT_MU),
        rc: args.sampling.rc.unwrap_or(DEFAULT_RC),
        dinit: args.dinit.unwrap_or(DEFAULT_IC_DINIT),
        dend: args.dend.unwrap_or(DEFAULT_TRAINING_DEND),
        eig_cutoff: args.eig_cutoff.unwrap_or(DEFAULT_EIG_CUTOFF),
    })
}

fn adam_plan(args: TrainAdamArgs) -> Result<AdamPlan> {
    check_samples(&args.sampling)?;
    if args.iteration == 0 {
        return Err(CliError::Argument(
            "iterations are counted from 1".to_string(),
        ));
    }
    let defaults = AdamParams::default();
    Ok(AdamPlan {
        frames: frame_range(&args.sampling)?,
        hic: args.sampling.hic,
        lambdas: args.lambdas,
        trajectories: args.sampling.trajectories,
        accumulators: args.sampling.accumulators,
        save_accumulator: args.sampling.save_accumulator,
        state: args.state,
        params: AdamParams {
            mu: args.sampling.mu.unwrap_or(defaults.mu),
            rc: args.sampling.rc.unwrap_or(defaults.rc),
            eta: args.eta.unwrap_or(defaults.eta),
            ..defaults
        },
        iteration: args.iteration,
        output: args.output,
    })
}

use crate::cli::RunArgs;
use crate::config::PartialSimulationConfig;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use chromdyn::engine::progress::ProgressReporter;
use chromdyn::workflows::simulate::{self, SimulationSummary};
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: RunArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialSimulationConfig::from_file(path)?,
        None => PartialSimulationConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let plan = partial_config.merge_with_cli(&args)?;
    info!(
        name = %plan.config.name,
        platform = %plan.config.platform,
        steps = plan.steps,
        forces = plan.forces.len(),
        "Simulation plan ready"
    );

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting simulation '{}' ({} steps)...",
        plan.config.name, plan.steps
    );
    let summary = tokio::task::block_in_place(|| simulate::run(&plan, &reporter))?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &SimulationSummary) {
    println!(
        "✓ {} steps on {} beads, radius of gyration {:.3}",
        summary.steps, summary.n_beads, summary.radius_of_gyration
    );
    println!("  Potential energy per bead by term:");
    for (name, energy) in summary.energies.per_bead(summary.n_beads).iter() {
        println!("    {:<28} {:>12.5}", name, energy);
    }
    for path in &summary.files {
        println!("  wrote {}", path.display());
    }
}

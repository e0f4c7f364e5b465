use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "ChromDyn CLI - Chromatin polymer dynamics with the Minimal Chromatin Model (MiChroM): simulation, trajectory analysis and energy training against Hi-C maps.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a Langevin dynamics simulation of a chromatin polymer.
    Run(RunArgs),
    /// Compute structural observables from a stored trajectory.
    Analyze(AnalyzeArgs),
    /// Train interaction energies against an experimental contact map.
    Train(TrainArgs),
    /// Export trajectory frames as structure files.
    Convert(ConvertArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the simulation configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the run name used to prefix output files.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Override the output directory.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    // --- Structure Overrides ---
    /// Generate the initial structure from a bead sequence file.
    #[arg(short, long, value_name = "PATH", conflicts_with = "structure")]
    pub sequence: Option<PathBuf>,

    /// Start from a structure file (ndb, pdb, gro, xyz) or the last frame of a .cndb trajectory.
    #[arg(long, value_name = "PATH")]
    pub structure: Option<PathBuf>,

    // --- Dynamics Overrides ---
    /// Override the number of integration steps.
    #[arg(long, value_name = "INT")]
    pub steps: Option<u64>,

    /// Override the compute platform (reference, cpu; opencl, cuda and hip run on the CPU).
    #[arg(long, value_name = "NAME")]
    pub platform: Option<String>,

    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S integrator.temperature=1.2
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Path to the .cndb trajectory.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub trajectory: PathBuf,

    /// Restrict per-selection observables to these bead types. Defaults to all beads.
    #[arg(long, value_name = "TYPE", num_args(1..))]
    pub types: Vec<String>,

    /// Frames to analyse as FIRST:LAST:STEP, counted from 1 with LAST excluded.
    #[arg(long, value_name = "RANGE", default_value = "1::1")]
    pub frames: String,

    /// Directory receiving the CSV and dense outputs.
    #[arg(long, required = true, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Radius of gyration of every frame.
    #[arg(long)]
    pub rg: bool,

    /// Eigenvalues of the gyration tensor of every frame.
    #[arg(long)]
    pub gyration: bool,

    /// Radial density profile around the centroid.
    #[arg(long)]
    pub rdp: bool,

    /// Local chirality with segments joining beads N apart.
    #[arg(long, value_name = "N")]
    pub chirality: Option<usize>,

    /// Mean contact probability map over the selected frames.
    #[arg(long)]
    pub hic: bool,

    /// Outer radius of the radial density profile.
    #[arg(long, value_name = "FLOAT")]
    pub rdp_radius: Option<f64>,

    /// Number of shells of the radial density profile.
    #[arg(long, value_name = "INT")]
    pub rdp_bins: Option<usize>,
}

/// Arguments for the `train` subcommand.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(subcommand)]
    pub command: TrainCommands,
}

#[derive(Subcommand, Debug)]
pub enum TrainCommands {
    /// One Newton iteration over type-to-type and ideal-chromosome energies.
    Types(TrainTypesArgs),
    /// One Adam iteration over bead-resolution energies.
    Adam(TrainAdamArgs),
}

/// Options shared by both training methods.
#[derive(Args, Debug)]
pub struct SamplingArgs {
    /// Sampled trajectories. Can be given multiple times.
    #[arg(short, long = "trajectory", value_name = "PATH", num_args(1..))]
    pub trajectories: Vec<PathBuf>,

    /// Frames to use from every trajectory as FIRST:LAST:STEP.
    #[arg(long, value_name = "RANGE", default_value = "1::1")]
    pub frames: String,

    /// Sums saved by other sampling runs. Can be given multiple times.
    #[arg(long = "accumulator", value_name = "PATH", num_args(1..))]
    pub accumulators: Vec<PathBuf>,

    /// Save the combined sums so later runs can continue from them.
    #[arg(long, value_name = "PATH")]
    pub save_accumulator: Option<PathBuf>,

    /// Experimental contact probabilities as a dense text matrix.
    #[arg(long, required = true, value_name = "PATH")]
    pub hic: PathBuf,

    /// Contact function steepness.
    #[arg(long, value_name = "FLOAT")]
    pub mu: Option<f64>,

    /// Contact function midpoint distance.
    #[arg(long, value_name = "FLOAT")]
    pub rc: Option<f64>,
}

/// Arguments for `train types`.
#[derive(Args, Debug)]
pub struct TrainTypesArgs {
    /// Bead sequence file of the sampled chromosome.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub sequence: PathBuf,

    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Directory receiving the energy changes and updated tables.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Current type-to-type table; an updated copy is written when given.
    #[arg(long, value_name = "PATH")]
    pub current_types: Option<PathBuf>,

    /// Current ideal-chromosome table; an updated copy is written when given.
    #[arg(long, value_name = "PATH")]
    pub current_ideal: Option<PathBuf>,

    /// First genomic separation trained by the ideal-chromosome term.
    #[arg(long, value_name = "INT")]
    pub dinit: Option<usize>,

    /// Separation past which the ideal-chromosome term is not trained.
    #[arg(long, value_name = "INT")]
    pub dend: Option<usize>,

    /// Relative singular value cutoff of the pseudo-inverse.
    #[arg(long, value_name = "FLOAT")]
    pub eig_cutoff: Option<f64>,
}

/// Arguments for `train adam`.
#[derive(Args, Debug)]
pub struct TrainAdamArgs {
    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Current bead-resolution energies.
    #[arg(long, required = true, value_name = "PATH")]
    pub lambdas: PathBuf,

    /// Optimiser moments; read when present and rewritten after the update.
    #[arg(long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Iteration number of this update, counted from 1.
    #[arg(long, value_name = "INT", default_value_t = 1)]
    pub iteration: u32,

    /// Learning rate.
    #[arg(long, value_name = "FLOAT")]
    pub eta: Option<f64>,

    /// Path of the updated energies.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}

/// Arguments for the `convert` subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Path to the .cndb trajectory.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub trajectory: PathBuf,

    /// Output structure format (ndb, pdb, gro, xyz).
    #[arg(short, long, default_value = "ndb", value_name = "FORMAT")]
    pub format: String,

    /// Frames to export as FIRST:LAST:STEP.
    #[arg(long, value_name = "RANGE", default_value = "1::1")]
    pub frames: String,

    /// Directory receiving one file per frame.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,
}

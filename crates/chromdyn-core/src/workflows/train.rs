use crate::analysis::trajectory::{FrameRange, Trajectory};
use crate::core::forcefield::params::{IdealChromosomeTable, InteractionTable};
use crate::core::io::dense;
use crate::core::models::sequence::ChromSequence;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::optimization::adam::{AdamParams, AdamState, AdamTraining};
use crate::optimization::contact::ContactAccumulator;
use crate::optimization::error::TrainingError;
use crate::optimization::types::TypeTraining;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Inputs of one Newton iteration over type-to-type and ideal-chromosome energies.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeTrainingPlan {
    pub sequence: PathBuf,
    pub trajectories: Vec<PathBuf>,
    pub frames: FrameRange,
    /// Observable sums saved by other sampling runs of the same sequence.
    pub accumulators: Vec<PathBuf>,
    /// Where to save the combined sums for later runs.
    pub save_accumulator: Option<PathBuf>,
    pub hic: PathBuf,
    pub output_dir: PathBuf,
    /// Current energies; when given, updated tables are written next to the changes.
    pub current_types: Option<PathBuf>,
    pub current_ideal: Option<PathBuf>,
    pub mu: f64,
    pub rc: f64,
    pub dinit: usize,
    pub dend: usize,
    pub eig_cutoff: f64,
}

#[derive(Debug, Clone)]
pub struct TypeTrainingSummary {
    pub frames: usize,
    pub type_error: f64,
    pub ideal_error: f64,
    pub files: Vec<PathBuf>,
}

fn create_dir(dir: &Path) -> Result<(), TrainingError> {
    fs::create_dir_all(dir).map_err(|e| {
        TrainingError::InvalidParameter(format!("cannot create '{}': {}", dir.display(), e))
    })
}

/// Feeds the selected frames of every trajectory to `sink`, returning the frame count.
fn sample_frames<F>(
    trajectories: &[PathBuf],
    frames: FrameRange,
    reporter: &ProgressReporter,
    mut sink: F,
) -> Result<usize, TrainingError>
where
    F: FnMut(&[nalgebra::Point3<f64>]) -> Result<(), TrainingError>,
{
    let mut count = 0;
    for path in trajectories {
        let trajectory = Trajectory::load(path)?;
        let xyz = trajectory.xyz(frames, None)?;
        reporter.report(Progress::TaskStart {
            total: xyz.len() as u64,
        });
        for frame in &xyz {
            sink(frame)?;
            reporter.report(Progress::TaskIncrement { amount: 1 });
        }
        reporter.report(Progress::TaskFinish);
        count += xyz.len();
    }
    if count == 0 && !trajectories.is_empty() {
        warn!("No frames selected from the given trajectories");
    }
    Ok(count)
}

#[instrument(skip_all, name = "type_training_workflow")]
pub fn train_types(
    plan: &TypeTrainingPlan,
    reporter: &ProgressReporter,
) -> Result<TypeTrainingSummary, TrainingError> {
    reporter.report(Progress::PhaseStart { name: "Sampling" });
    let sequence = ChromSequence::from_path(&plan.sequence)?;
    let mut training = TypeTraining::with_parameters(
        sequence,
        plan.mu,
        plan.rc,
        0.0,
        plan.dinit,
        plan.dend,
        plan.eig_cutoff,
    );
    for path in &plan.accumulators {
        training.load_accumulators(path)?;
    }
    sample_frames(&plan.trajectories, plan.frames, reporter, |frame| {
        training.add_state(frame)
    })?;
    let frames = training.type_frames();
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Update" });
    let exp_map = dense::read_dense(&plan.hic)?;
    let types = training.type_lambdas(&exp_map)?;
    let ideal = training.ic_lambdas(&exp_map)?;

    create_dir(&plan.output_dir)?;
    let mut files = Vec::new();
    if let Some(path) = &plan.save_accumulator {
        training.save_accumulators(path)?;
        files.push(path.clone());
    }
    let types_delta = plan.output_dir.join("types_delta.csv");
    types.delta.save(&types_delta)?;
    files.push(types_delta);
    let ideal_delta = plan.output_dir.join("ideal_delta.csv");
    ideal.delta.save(&ideal_delta)?;
    files.push(ideal_delta);

    if let Some(path) = &plan.current_types {
        let updated = InteractionTable::load(path)?.add(&types.delta)?;
        let out = plan.output_dir.join("types_updated.csv");
        updated.save(&out)?;
        files.push(out);
    }
    if let Some(path) = &plan.current_ideal {
        let updated = IdealChromosomeTable::load(path)?.add(&ideal.delta)?;
        let out = plan.output_dir.join("ideal_updated.csv");
        updated.save(&out)?;
        files.push(out);
    }
    reporter.report(Progress::PhaseFinish);

    info!(
        frames,
        type_error = types.error,
        ideal_error = ideal.error,
        "Type training complete"
    );
    Ok(TypeTrainingSummary {
        frames,
        type_error: types.error,
        ideal_error: ideal.error,
        files,
    })
}

/// Inputs of one Adam iteration over bead-resolution energies.
#[derive(Debug, Clone, PartialEq)]
pub struct AdamPlan {
    pub hic: PathBuf,
    pub lambdas: PathBuf,
    pub trajectories: Vec<PathBuf>,
    pub frames: FrameRange,
    /// Contact sums saved by other sampling runs.
    pub accumulators: Vec<PathBuf>,
    pub save_accumulator: Option<PathBuf>,
    /// Moments from the previous iteration; read if present, always rewritten.
    pub state: Option<PathBuf>,
    pub params: AdamParams,
    pub iteration: u32,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AdamSummary {
    pub frames: usize,
    pub error: f64,
    pub iteration: u32,
    pub files: Vec<PathBuf>,
}

#[instrument(skip_all, name = "adam_workflow")]
pub fn train_adam(plan: &AdamPlan, reporter: &ProgressReporter) -> Result<AdamSummary, TrainingError> {
    reporter.report(Progress::PhaseStart { name: "Sampling" });
    let mut opt = AdamTraining::new(plan.params, plan.iteration);
    opt.load_hic(&plan.hic)?;
    if let Some(path) = plan.state.as_deref().filter(|p| p.exists()) {
        opt.set_state(AdamState::load(path)?)?;
        info!(path = %path.display(), "Resumed Adam moments");
    }
    for path in &plan.accumulators {
        opt.merge(&ContactAccumulator::load(path)?)?;
    }
    sample_frames(&plan.trajectories, plan.frames, reporter, |frame| {
        opt.add_state(frame)
    })?;
    let frames = opt.accumulator.n_frames;
    let mut files = Vec::new();
    if let Some(path) = &plan.save_accumulator {
        opt.accumulator.save(path)?;
        files.push(path.clone());
    }
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Update" });
    let lambdas = InteractionTable::load(&plan.lambdas)?;
    let updated = opt.update_lambdas(&lambdas)?;
    if let Some(parent) = plan.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    updated.save(&plan.output)?;
    files.push(plan.output.clone());
    let (error, iteration) = match (opt.error(), opt.state()) {
        (Some(error), Some(state)) => (error, state.iteration),
        _ => return Err(TrainingError::NoFrames),
    };
    if let (Some(path), Some(state)) = (&plan.state, opt.state()) {
        state.save(path)?;
        files.push(path.clone());
    }
    reporter.report(Progress::PhaseFinish);

    info!(frames, error, iteration, "Adam training complete");
    Ok(AdamSummary {
        frames,
        error,
        iteration,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::trajectory::test_support::write_line_trajectory;
    use crate::core::io::dense::write_dense_path;
    use nalgebra::DMatrix;
    use tempfile::tempdir;

    fn banded(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| {
            let d = (i as f64 - j as f64).abs();
            if d > 4.0 { 0.0 } else { 1.0 / (1.0 + d) }
        })
    }

    #[test]
    fn type_training_writes_delta_tables() {
        let dir = tempdir().unwrap();
        let types = ["A1", "A1", "B1", "B1", "NA", "NA", "A1", "B1", "NA", "A1"];
        let seq = dir.path().join("seq.txt");
        fs::write(&seq, types.join("\n")).unwrap();
        let traj = dir.path().join("traj.cndb");
        write_line_trajectory(&traj, &types, 4);
        let hic = dir.path().join("map.dense");
        write_dense_path(&banded(10), &hic).unwrap();

        let plan = TypeTrainingPlan {
            sequence: seq,
            trajectories: vec![traj],
            frames: FrameRange::default(),
            accumulators: vec![],
            save_accumulator: Some(dir.path().join("types.acc")),
            hic,
            output_dir: dir.path().join("out"),
            current_types: None,
            current_ideal: None,
            mu: 3.22,
            rc: 1.78,
            dinit: 3,
            dend: 200,
            eig_cutoff: 1e-3,
        };
        let summary = train_types(&plan, &ProgressReporter::new()).unwrap();
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.files.len(), 3);
        let table = InteractionTable::load(&summary.files[1]).unwrap();
        assert_eq!(table.names(), &["A1", "B1", "NA"]);
        let ideal = IdealChromosomeTable::load(&summary.files[2]).unwrap();
        assert_eq!(ideal.dinit(), 3);
        assert_eq!(ideal.dend(), 10);

        let resumed = TypeTrainingPlan {
            trajectories: vec![],
            accumulators: vec![dir.path().join("types.acc")],
            save_accumulator: None,
            output_dir: dir.path().join("resumed"),
            ..plan
        };
        let again = train_types(&resumed, &ProgressReporter::new()).unwrap();
        assert_eq!(again.frames, 4);
        assert!((again.type_error - summary.type_error).abs() < 1e-12);
    }

    #[test]
    fn adam_iterations_chain_through_state_file() {
        let dir = tempdir().unwrap();
        let n = 8;
        let types = vec!["A1"; n];
        let traj = dir.path().join("traj.cndb");
        write_line_trajectory(&traj, &types, 3);
        let hic = dir.path().join("map.dense");
        write_dense_path(&banded(n), &hic).unwrap();
        let lambdas = dir.path().join("lambda_0");
        InteractionTable::zeros((0..n).map(|i| format!("b{}", i)).collect())
            .save(&lambdas)
            .unwrap();

        let mut plan = AdamPlan {
            hic,
            lambdas,
            trajectories: vec![traj],
            frames: FrameRange::default(),
            accumulators: vec![],
            save_accumulator: None,
            state: Some(dir.path().join("adam.state")),
            params: AdamParams::default(),
            iteration: 1,
            output: dir.path().join("out").join("lambda_1"),
        };
        let first = train_adam(&plan, &ProgressReporter::new()).unwrap();
        assert_eq!(first.frames, 3);
        assert_eq!(first.iteration, 2);
        assert!(plan.output.exists());

        plan.lambdas = plan.output.clone();
        plan.output = dir.path().join("out").join("lambda_2");
        let second = train_adam(&plan, &ProgressReporter::new()).unwrap();
        assert_eq!(second.iteration, 3);
        let table = InteractionTable::load(&plan.output).unwrap();
        assert_eq!(table.len(), n);
    }
}

use chromdyn::analysis::{self, FrameRange, Trajectory};
use chromdyn::core::forcefield::bonded::{DEFAULT_ANGLE_KA, DEFAULT_FENE_K, DEFAULT_FENE_R0};
use chromdyn::core::forcefield::external::{DEFAULT_RESTRAINT_K, DEFAULT_RESTRAINT_RADIUS};
use chromdyn::core::forcefield::nonbonded::{
    ContactShape, DEFAULT_E_CUT, DEFAULT_IC_DEND, DEFAULT_IC_DINIT, DEFAULT_MU, DEFAULT_RC,
};
use chromdyn::core::forcefield::params::InteractionTable;
use chromdyn::core::io::StructureFormat;
use chromdyn::core::io::dense::{read_dense, write_dense_path};
use chromdyn::engine::config::{
    InitMode, Platform, ReporterConfig, SimulationConfigBuilder, TrajectoryFormat,
};
use chromdyn::engine::progress::ProgressReporter;
use chromdyn::engine::simulation::Simulation;
use chromdyn::optimization::adam::{AdamParams, AdamTraining};
use chromdyn::optimization::contact::ContactAccumulator;
use chromdyn::optimization::types::TypeTraining;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

const TYPES: [&str; 3] = ["A1", "B1", "NA"];

fn write_sequence(path: &Path, n: usize) {
    let body: String = (0..n)
        .map(|i| format!("{} {}\n", i + 1, TYPES[(i / 5) % TYPES.len()]))
        .collect();
    fs::write(path, body).unwrap();
}

fn standard_forces(sim: &mut Simulation) {
    sim.add_fene_bonds(DEFAULT_FENE_K, DEFAULT_FENE_R0).unwrap();
    sim.add_angles(DEFAULT_ANGLE_KA).unwrap();
    sim.add_repulsive_soft_core(DEFAULT_E_CUT).unwrap();
    sim.add_type_to_type(None, ContactShape::default()).unwrap();
    sim.add_ideal_chromosome(DEFAULT_IC_DINIT, DEFAULT_IC_DEND, ContactShape::default())
        .unwrap();
    sim.add_flat_bottom_harmonic(DEFAULT_RESTRAINT_K, DEFAULT_RESTRAINT_RADIUS)
        .unwrap();
}

/// Sequence file and a `.cndb` trajectory with `frames` frames of a short simulation.
fn training_inputs(n_beads: usize, frames: u64) -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let seq = dir.path().join("seq");
    write_sequence(&seq, n_beads);

    let config = SimulationConfigBuilder::new()
        .name("sample")
        .seed(Some(2024))
        .platform(Platform::Reference)
        .build()
        .unwrap();
    let mut sim = Simulation::new(config);
    sim.save_folder(dir.path()).unwrap();
    let positions = sim
        .init_structure_from_file(InitMode::Spring, &seq, false)
        .unwrap();
    sim.load_structure(positions, true).unwrap();
    standard_forces(&mut sim);
    sim.create_simulation().unwrap();
    sim.create_reporters(&ReporterConfig {
        statistics: false,
        trajectory: true,
        format: TrajectoryFormat::Cndb,
        interval: 20,
        energy_components: false,
    })
    .unwrap();
    sim.run(frames * 20, false, 100, &ProgressReporter::new())
        .unwrap();
    sim.finish_reporters().unwrap();
    let traj = dir.path().join("sample_0.cndb");
    (dir, seq, traj)
}

#[test]
fn default_simulation_runs_and_saves_every_format() {
    let dir = tempdir().unwrap();
    let seq = dir.path().join("chr_beads.txt");
    write_sequence(&seq, 80);

    let config = SimulationConfigBuilder::new()
        .name("test")
        .temperature(1.0)
        .time_step(0.01)
        .platform("opencl".parse().unwrap())
        .seed(Some(7))
        .build()
        .unwrap();
    let mut sim = Simulation::new(config);
    let out = dir.path().join("output");
    sim.save_folder(&out).unwrap();

    let positions = sim
        .init_structure_from_file(InitMode::Spring, &seq, false)
        .unwrap();
    sim.load_structure(positions, true).unwrap();
    standard_forces(&mut sim);
    sim.create_simulation().unwrap();
    sim.create_reporters(&ReporterConfig {
        statistics: true,
        trajectory: true,
        format: TrajectoryFormat::Structure(StructureFormat::Pdb),
        interval: 500,
        energy_components: false,
    })
    .unwrap();

    sim.run(500, true, 100, &ProgressReporter::new()).unwrap();
    sim.finish_reporters().unwrap();

    let energies = sim.print_forces().unwrap();
    assert_eq!(energies.len(), 6);
    for format in StructureFormat::ALL {
        let path = sim.save_structure(None, format).unwrap();
        assert!(path.exists());
    }
    assert!(out.join("test_statistics.csv").exists());
    assert!(out.join("test_1.pdb").exists());

    let reloaded = StructureFormat::Gro.read_path(&out.join("test_500.gro")).unwrap();
    assert_eq!(reloaded.len(), 80);
}

#[test]
fn custom_michrom_training_from_trajectory_frames() {
    let (dir, seq, traj) = training_inputs(45, 10);

    let mut training = TypeTraining::from_sequence_file(&seq).unwrap();
    assert_eq!(training.type_pairs().len(), 6);

    let trajectory = Trajectory::load(&traj).unwrap();
    for frame in trajectory.xyz(FrameRange::new(1, Some(10), 1), None).unwrap() {
        training.add_state_ic(&frame).unwrap();
        training.add_state_types(&frame).unwrap();
    }
    assert_eq!(training.type_frames(), 9);

    let map_path = dir.path().join("exp.dense");
    let all = trajectory.xyz(FrameRange::default(), None).unwrap();
    let hic = analysis::traj_to_hic(&all, DEFAULT_MU, DEFAULT_RC).unwrap();
    write_dense_path(&hic, &map_path).unwrap();
    let exp_map = read_dense(&map_path).unwrap();

    let types = training.type_lambdas(&exp_map).unwrap();
    let ideal = training.ic_lambdas(&exp_map).unwrap();
    assert_eq!(types.delta.len(), 3);
    assert!(types.error.is_finite());
    assert_eq!(ideal.delta.dinit(), DEFAULT_IC_DINIT);
    assert!(ideal.delta.values().iter().all(|v| v.is_finite()));
}

#[test]
fn trajectory_analysis_tools() {
    let (_dir, _seq, traj) = training_inputs(45, 6);

    let trajectory = Trajectory::load(&traj).unwrap();
    assert!(trajectory.to_string().contains("45 beads"));
    assert_eq!(trajectory.unique_types(), TYPES.to_vec());

    let by_type = trajectory.beads_by_type();
    let range = FrameRange::new(1, Some(100), 1);
    let sample_a1 = trajectory.xyz(range, Some(by_type["A1"].as_slice())).unwrap();
    let sample_b1 = trajectory.xyz(range, Some(by_type["B1"].as_slice())).unwrap();
    assert_eq!(sample_a1.len(), 6);

    let rg = analysis::radius_of_gyration(&sample_a1).unwrap();
    assert_eq!(rg.len(), 6);
    assert!(rg.iter().all(|r| *r > 0.0));

    let (xa1, rdp_a1) = analysis::radial_distribution(&sample_a1, 20.0, 200).unwrap();
    let (_, rdp_b1) = analysis::radial_distribution(&sample_b1, 20.0, 200).unwrap();
    assert_eq!(xa1.len(), 200);
    assert_eq!(rdp_a1.len(), rdp_b1.len());

    let psi = analysis::chirality(&trajectory.xyz(range, None).unwrap(), 4).unwrap();
    assert_eq!(psi[0].len(), 45 - 12);

    let all = trajectory.xyz(FrameRange::default(), None).unwrap();
    let dense = analysis::traj_to_hic(&all, DEFAULT_MU, DEFAULT_RC).unwrap();
    assert_eq!(dense.shape(), (45, 45));
}

#[test]
fn adam_training_step_from_partial_sums() {
    let (dir, _seq, traj) = training_inputs(30, 5);
    let trajectory = Trajectory::load(&traj).unwrap();
    let frames = trajectory.xyz(FrameRange::default(), None).unwrap();

    let map_path = dir.path().join("chr.dense");
    let hic = analysis::traj_to_hic(&frames[..2], DEFAULT_MU, DEFAULT_RC).unwrap();
    write_dense_path(&hic, &map_path).unwrap();

    let mut partial = ContactAccumulator::new(30);
    for frame in &frames {
        partial.add_state(frame, DEFAULT_MU, DEFAULT_RC).unwrap();
    }
    let pi_path = dir.path().join("Pi_0");
    partial.save(&pi_path).unwrap();

    let lambda_0 = dir.path().join("lambda_0");
    InteractionTable::zeros((1..=30).map(|i| format!("b{}", i)).collect())
        .save(&lambda_0)
        .unwrap();

    let mut opt = AdamTraining::new(
        AdamParams {
            mu: 3.22,
            rc: 1.78,
            eta: 0.01,
            ..AdamParams::default()
        },
        1,
    );
    opt.load_hic(&map_path).unwrap();
    let loaded = ContactAccumulator::load(&pi_path).unwrap();
    opt.accumulator.pi += &loaded.pi;
    opt.accumulator.n_frames += loaded.n_frames;

    let lamb_new = opt
        .update_lambdas(&InteractionTable::load(&lambda_0).unwrap())
        .unwrap();
    let lambda_1 = dir.path().join("lambda_1");
    lamb_new.save(&lambda_1).unwrap();

    let ff_new = InteractionTable::load(&lambda_1).unwrap();
    assert_eq!(ff_new, lamb_new);
    assert_eq!(ff_new.len(), 30);
    assert_eq!(ff_new.names()[0], "b1");
    assert!(opt.error().unwrap().is_finite());
}

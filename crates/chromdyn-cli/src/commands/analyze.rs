use crate::cli::AnalyzeArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use chromdyn::analysis::observables::{DEFAULT_RDP_BINS, DEFAULT_RDP_RADIUS, mean_and_std};
use chromdyn::analysis::{self, FrameRange, Trajectory};
use chromdyn::core::forcefield::nonbonded::{DEFAULT_MU, DEFAULT_RC};
use chromdyn::core::io::dense::write_dense_path;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Beads an observable is computed over, labelled for output file names.
struct Selection {
    label: String,
    beads: Option<Vec<usize>>,
}

pub async fn run(args: AnalyzeArgs) -> Result<()> {
    let range = parser::parse_frame_range(&args.frames)
        .map_err(|e| CliError::Argument(e.to_string()))?;
    let files = tokio::task::block_in_place(|| analyze(&args, range))?;
    for path in files {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn analyze(args: &AnalyzeArgs, range: FrameRange) -> Result<Vec<PathBuf>> {
    let trajectory = Trajectory::load(&args.trajectory)?;
    println!("{}", trajectory);

    let frame_ids = range.indices(trajectory.n_frames())?;
    if frame_ids.is_empty() {
        return Err(CliError::Argument(format!(
            "frame range {} selects no frames of {}",
            range,
            trajectory.n_frames()
        )));
    }
    fs::create_dir_all(&args.out_dir)?;

    let selections = if args.types.is_empty() {
        vec![Selection {
            label: "all".to_string(),
            beads: None,
        }]
    } else {
        args.types
            .iter()
            .map(|t| -> Result<Selection> {
                Ok(Selection {
                    label: t.clone(),
                    beads: Some(trajectory.beads_of_type(t)?),
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mut files = Vec::new();
    for selection in &selections {
        let xyz = trajectory.xyz(range, selection.beads.as_deref())?;
        info!(selection = %selection.label, frames = xyz.len(), "Analysing selection");

        if args.rg {
            let rg = analysis::radius_of_gyration(&xyz)?;
            if let Some((mean, std)) = mean_and_std(&rg) {
                println!("  Rg[{}] = {:.4} ± {:.4}", selection.label, mean, std);
            }
            let path = args.out_dir.join(format!("rg_{}.csv", selection.label));
            write_csv(
                &path,
                &["frame", "rg"],
                frame_ids
                    .iter()
                    .zip(&rg)
                    .map(|(f, r)| vec![f.to_string(), r.to_string()]),
            )?;
            files.push(path);
        }

        if args.gyration {
            let eigenvalues = analysis::gyration_tensor_eigenvalues(&xyz)?;
            let path = args.out_dir.join(format!("gyration_{}.csv", selection.label));
            write_csv(
                &path,
                &["frame", "lambda1", "lambda2", "lambda3"],
                frame_ids.iter().zip(&eigenvalues).map(|(f, l)| {
                    vec![
                        f.to_string(),
                        l[0].to_string(),
                        l[1].to_string(),
                        l[2].to_string(),
                    ]
                }),
            )?;
            files.push(path);
        }

        if args.rdp {
            let (radii, density) = analysis::radial_distribution(
                &xyz,
                args.rdp_radius.unwrap_or(DEFAULT_RDP_RADIUS),
                args.rdp_bins.unwrap_or(DEFAULT_RDP_BINS),
            )?;
            let path = args.out_dir.join(format!("rdp_{}.csv", selection.label));
            write_csv(
                &path,
                &["r", "density"],
                radii
                    .iter()
                    .zip(&density)
                    .map(|(r, d)| vec![r.to_string(), d.to_string()]),
            )?;
            files.push(path);
        }
    }

    if args.chirality.is_some() || args.hic {
        let all = trajectory.xyz(range, None)?;

        if let Some(neighbors) = args.chirality {
            let psi = analysis::chirality(&all, neighbors)?;
            let path = args.out_dir.join("chirality.csv");
            write_csv(
                &path,
                &["frame", "bead", "psi"],
                frame_ids.iter().zip(&psi).flat_map(|(f, values)| {
                    values
                        .iter()
                        .enumerate()
                        .map(move |(i, v)| vec![f.to_string(), i.to_string(), v.to_string()])
                }),
            )?;
            files.push(path);
        }

        if args.hic {
            let dense = analysis::traj_to_hic(&all, DEFAULT_MU, DEFAULT_RC)?;
            let path = args.out_dir.join("hic.dense");
            write_dense_path(&dense, &path).map_err(|e| CliError::FileWriting {
                path: path.clone(),
                source: e.into(),
            })?;
            files.push(path);
        }
    }

    if files.is_empty() {
        println!("No observables requested; use --rg, --gyration, --rdp, --chirality or --hic.");
    }
    Ok(files)
}

fn write_csv<I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let to_error = |e: csv::Error| CliError::FileWriting {
        path: path.to_path_buf(),
        source: e.into(),
    };
    let mut writer = csv::Writer::from_path(path).map_err(to_error)?;
    writer.write_record(header).map_err(to_error)?;
    for row in rows {
        writer.write_record(&row).map_err(to_error)?;
    }
    writer.flush()?;
    Ok(())
}

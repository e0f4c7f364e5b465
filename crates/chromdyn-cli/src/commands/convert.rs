use crate::cli::ConvertArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use chromdyn::analysis::{FrameRange, Trajectory};
use chromdyn::core::io::StructureFormat;
use chromdyn::core::models::system::ChromatinSystem;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub async fn run(args: ConvertArgs) -> Result<()> {
    let format: StructureFormat = args.format.parse().map_err(CliError::Argument)?;
    let range = parser::parse_frame_range(&args.frames)
        .map_err(|e| CliError::Argument(e.to_string()))?;
    let written = tokio::task::block_in_place(|| convert(&args, format, range))?;
    println!(
        "✓ Wrote {} {} file(s) to {}",
        written.len(),
        format,
        args.output_dir.display()
    );
    Ok(())
}

/// Writes `<stem>_<frame>.<ext>` for every selected frame of the trajectory.
fn convert(args: &ConvertArgs, format: StructureFormat, range: FrameRange) -> Result<Vec<PathBuf>> {
    let trajectory = Trajectory::load(&args.trajectory)?;
    let frame_ids = range.indices(trajectory.n_frames())?;
    let frames = trajectory.xyz(range, None)?;
    fs::create_dir_all(&args.output_dir)?;

    let stem = args
        .trajectory
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    let mut written = Vec::with_capacity(frames.len());
    for (frame_id, positions) in frame_ids.into_iter().zip(frames) {
        let system = ChromatinSystem::new(
            positions,
            trajectory.sequence().clone(),
            trajectory.chains().to_vec(),
        )
        .map_err(|e| CliError::FileParsing {
            path: args.trajectory.clone(),
            source: e.into(),
        })?;
        let path = args
            .output_dir
            .join(format!("{}_{}.{}", stem, frame_id, format.extension()));
        format
            .write_path(&system, &path)
            .map_err(|e| CliError::FileWriting {
                path: path.clone(),
                source: e.into(),
            })?;
        written.push(path);
    }
    info!(frames = written.len(), format = %format, "Converted trajectory frames");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromdyn::core::io::cndb::{CndbHeader, CndbWriter};
    use chromdyn::core::models::system::Chain;
    use nalgebra::Point3;
    use tempfile::tempdir;

    #[test]
    fn exports_selected_frames_that_read_back() {
        let dir = tempdir().unwrap();
        let traj = dir.path().join("run_0.cndb");
        let header = CndbHeader {
            info: "two chains".into(),
            types: ["A1", "A2", "B1", "B1", "NA", "A1"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            chains: vec![Chain::new(0, 3, false), Chain::new(3, 6, false)],
        };
        let mut writer = CndbWriter::create(&traj, &header).unwrap();
        for frame in 0..5u64 {
            let positions: Vec<_> = (0..6)
                .map(|i| Point3::new(i as f64, frame as f64, 0.5))
                .collect();
            writer.append_frame(frame * 10, &positions).unwrap();
        }
        writer.finish().unwrap();

        let args = ConvertArgs {
            trajectory: traj,
            format: "gro".into(),
            frames: "2:5:2".into(),
            output_dir: dir.path().join("frames"),
        };
        let written = convert(&args, StructureFormat::Gro, FrameRange::new(2, Some(5), 2)).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("frames/run_0_2.gro"),
                dir.path().join("frames/run_0_4.gro"),
            ]
        );

        let system = StructureFormat::Gro.read_path(&written[1]).unwrap();
        assert_eq!(system.len(), 6);
        assert!((system.positions()[2].y - 3.0).abs() < 1e-3);
    }
}

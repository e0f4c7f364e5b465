use super::layout::chains_from_labels;
use super::traits::{ParseErrorKind, StructureFile, StructureFileError, parse_float, parse_int};
use crate::core::models::sequence::ChromSequence;
use crate::core::models::system::ChromatinSystem;
use nalgebra::Point3;
use std::collections::HashSet;
use std::io::{BufRead, Write};

/// GROMACS fixed-width coordinates. The residue number stores the 1-based chain index and
/// the residue name the bead type; ring closures cannot be expressed.
pub struct GroFile;

const MIN_BEAD_LINE: usize = 44;

fn columns(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

impl StructureFile for GroFile {
    type Error = StructureFileError;

    fn read_from(reader: &mut impl BufRead) -> Result<ChromatinSystem, Self::Error> {
        let mut lines = reader.lines();
        lines
            .next()
            .transpose()?
            .ok_or_else(|| StructureFileError::MissingRecord("title line".into()))?;
        let count_line = lines
            .next()
            .transpose()?
            .ok_or_else(|| StructureFileError::MissingRecord("bead count line".into()))?;
        let n_beads = parse_int(&count_line, "bead count", 2)?;

        let mut positions = Vec::with_capacity(n_beads);
        let mut types = Vec::with_capacity(n_beads);
        let mut labels = Vec::with_capacity(n_beads);
        for k in 0..n_beads {
            let line_num = k + 3;
            let line = lines.next().transpose()?.ok_or_else(|| {
                StructureFileError::Inconsistency(format!(
                    "expected {} beads, found {}",
                    n_beads, k
                ))
            })?;
            if line.len() < MIN_BEAD_LINE {
                return Err(StructureFileError::Parse {
                    line: line_num,
                    kind: ParseErrorKind::LineTooShort { record: "bead" },
                });
            }
            labels.push(parse_int(columns(&line, 0, 5), "residue number", line_num)?);
            types.push(columns(&line, 5, 10).to_string());
            let x = parse_float(columns(&line, 20, 28), "x", line_num)?;
            let y = parse_float(columns(&line, 28, 36), "y", line_num)?;
            let z = parse_float(columns(&line, 36, 44), "z", line_num)?;
            positions.push(Point3::new(x, y, z));
        }

        if positions.is_empty() {
            return Err(StructureFileError::MissingRecord("bead lines".into()));
        }
        let chains = chains_from_labels(&labels, &HashSet::new());
        let sequence = ChromSequence::new(types)?;
        Ok(ChromatinSystem::new(positions, sequence, chains)?)
    }

    fn write_to(system: &ChromatinSystem, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "Chromatin polymer")?;
        writeln!(writer, "{:>5}", system.len())?;
        for (chain_idx, chain) in system.chains().iter().enumerate() {
            for bead in chain.start..chain.end {
                let p = system.positions()[bead];
                let bead_type: String = system
                    .sequence()
                    .bead_type(bead)
                    .unwrap_or("NA")
                    .chars()
                    .take(5)
                    .collect();
                writeln!(
                    writer,
                    "{:>5}{:<5}{:>5}{:>5}{:>8.3}{:>8.3}{:>8.3}",
                    (chain_idx + 1) % 100_000,
                    bead_type,
                    "CA",
                    (bead + 1) % 100_000,
                    p.x,
                    p.y,
                    p.z
                )?;
            }
        }
        let extent = system
            .positions()
            .iter()
            .flat_map(|p| [p.x.abs(), p.y.abs(), p.z.abs()])
            .fold(0.0_f64, f64::max);
        let side = 2.0 * extent + 1.0;
        writeln!(writer, "{:>10.5}{:>10.5}{:>10.5}", side, side, side)?;
        Ok(())
    }
}

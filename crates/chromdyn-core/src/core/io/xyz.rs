use super::traits::{ParseErrorKind, StructureFile, StructureFileError, parse_float, parse_int};
use crate::core::models::sequence::ChromSequence;
use crate::core::models::system::ChromatinSystem;
use nalgebra::Point3;
use std::io::{BufRead, Write};

/// Plain XYZ: a count line, a comment line, then `<type> x y z` per bead. The whole
/// polymer is read back as one linear chain.
pub struct XyzFile;

impl StructureFile for XyzFile {
    type Error = StructureFileError;

    fn read_from(reader: &mut impl BufRead) -> Result<ChromatinSystem, Self::Error> {
        let mut lines = reader.lines();
        let count_line = lines
            .next()
            .transpose()?
            .ok_or_else(|| StructureFileError::MissingRecord("bead count line".into()))?;
        let n_beads = parse_int(&count_line, "bead count", 1)?;
        lines.next().transpose()?;

        let mut positions = Vec::with_capacity(n_beads);
        let mut types = Vec::with_capacity(n_beads);
        for (k, line_res) in lines.enumerate().take(n_beads) {
            let line = line_res?;
            let line_num = k + 3;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return Err(StructureFileError::Parse {
                    line: line_num,
                    kind: ParseErrorKind::MissingFields {
                        expected: 4,
                        found: parts.len(),
                    },
                });
            }
            types.push(parts[0].to_string());
            positions.push(Point3::new(
                parse_float(parts[1], "x", line_num)?,
                parse_float(parts[2], "y", line_num)?,
                parse_float(parts[3], "z", line_num)?,
            ));
        }
        if positions.len() != n_beads {
            return Err(StructureFileError::Inconsistency(format!(
                "expected {} beads, found {}",
                n_beads,
                positions.len()
            )));
        }
        let sequence = ChromSequence::new(types)?;
        Ok(ChromatinSystem::single_chain(positions, sequence)?)
    }

    fn write_to(system: &ChromatinSystem, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", system.len())?;
        writeln!(writer, "chromatin polymer")?;
        for (bead, p) in system.positions().iter().enumerate() {
            let bead_type = system.sequence().bead_type(bead).unwrap_or("NA");
            writeln!(writer, "{} {:.3} {:.3} {:.3}", bead_type, p.x, p.y, p.z)?;
        }
        Ok(())
    }
}

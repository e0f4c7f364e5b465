use super::layout::{chain_letter, chains_from_labels};
use super::traits::{ParseErrorKind, StructureFile, StructureFileError, parse_float};
use crate::core::models::sequence::ChromSequence;
use crate::core::models::system::ChromatinSystem;
use nalgebra::Point3;
use std::collections::HashSet;
use std::io::{BufRead, Write};

/// PDB with one `ATOM` record per bead; the residue name carries the bead type.
///
/// Bead types are limited to three characters by the residue-name column. Serial numbers
/// wrap at 100000 and are not used to identify beads on reading; `CONECT` records are
/// resolved by bead order.
pub struct PdbFile;

const MIN_ATOM_LINE: usize = 54;
const MAX_SERIAL: usize = 100_000;

fn columns(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

impl StructureFile for PdbFile {
    type Error = StructureFileError;

    fn read_from(reader: &mut impl BufRead) -> Result<ChromatinSystem, Self::Error> {
        let mut positions = Vec::new();
        let mut types = Vec::new();
        let mut labels: Vec<String> = Vec::new();
        let mut links = HashSet::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            match columns(&line, 0, 6) {
                "ATOM" | "HETATM" => {
                    if line.len() < MIN_ATOM_LINE {
                        return Err(StructureFileError::Parse {
                            line: line_num,
                            kind: ParseErrorKind::LineTooShort { record: "ATOM" },
                        });
                    }
                    let x = parse_float(columns(&line, 30, 38), "columns 31-38", line_num)?;
                    let y = parse_float(columns(&line, 38, 46), "columns 39-46", line_num)?;
                    let z = parse_float(columns(&line, 46, 54), "columns 47-54", line_num)?;
                    types.push(columns(&line, 17, 20).to_string());
                    labels.push(columns(&line, 21, 22).to_string());
                    positions.push(Point3::new(x, y, z));
                }
                "CONECT" => {
                    let serials: Vec<usize> = line[6..]
                        .split_whitespace()
                        .filter_map(|s| s.parse().ok())
                        .collect();
                    if let Some((&first, rest)) = serials.split_first() {
                        for &other in rest {
                            links.insert((first.saturating_sub(1), other.saturating_sub(1)));
                        }
                    }
                }
                "END" | "ENDMDL" => break,
                _ => {}
            }
        }

        if positions.is_empty() {
            return Err(StructureFileError::MissingRecord("ATOM records".into()));
        }
        let chains = chains_from_labels(&labels, &links);
        let sequence = ChromSequence::new(types)?;
        Ok(ChromatinSystem::new(positions, sequence, chains)?)
    }

    fn write_to(system: &ChromatinSystem, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "REMARK   1 CHROMATIN POLYMER WITH {} BEADS", system.len())?;
        for (chain_idx, chain) in system.chains().iter().enumerate() {
            let letter = chain_letter(chain_idx);
            for bead in chain.start..chain.end {
                let p = system.positions()[bead];
                let bead_type = system.sequence().bead_type(bead).unwrap_or("NA");
                let res_name: String = bead_type.chars().take(3).collect();
                writeln!(
                    writer,
                    "ATOM  {:>5} {:<4} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}",
                    (bead + 1) % MAX_SERIAL,
                    "CA",
                    res_name,
                    letter,
                    (bead - chain.start + 1) % 10_000,
                    p.x,
                    p.y,
                    p.z,
                    1.0,
                    0.0
                )?;
            }
        }
        for (a, b) in system.bonds() {
            writeln!(writer, "CONECT{:>5}{:>5}", (a + 1) % MAX_SERIAL, (b + 1) % MAX_SERIAL)?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::system::Chain;
    use std::io::Cursor;

    #[test]
    fn atom_records_use_standard_columns() {
        let system = ChromatinSystem::single_chain(
            vec![Point3::new(1.5, -2.25, 10.0)],
            ChromSequence::uniform(1, "B2"),
        )
        .unwrap();
        let mut buffer = Vec::new();
        PdbFile::write_to(&system, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let atom = text.lines().find(|l| l.starts_with("ATOM")).unwrap();
        assert_eq!(&atom[17..20], " B2");
        assert_eq!(&atom[21..22], "A");
        assert_eq!(atom[30..38].trim(), "1.500");
        assert_eq!(atom[38..46].trim(), "-2.250");
    }

    #[test]
    fn write_then_read_preserves_ring_chains() {
        let positions = (0..6)
            .map(|i| {
                let t = i as f64;
                Point3::new(t.cos(), t.sin(), 0.0)
            })
            .collect();
        let system = ChromatinSystem::new(
            positions,
            ChromSequence::uniform(6, "A1"),
            vec![Chain::new(0, 3, false), Chain::new(3, 6, true)],
        )
        .unwrap();
        let mut buffer = Vec::new();
        PdbFile::write_to(&system, &mut buffer).unwrap();
        let restored = PdbFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(restored.chains(), system.chains());
        assert_eq!(restored.sequence(), system.sequence());
    }

    #[test]
    fn short_atom_line_is_rejected() {
        let mut input = Cursor::new("ATOM      1 CA   A1 A   1       1.000\n");
        assert!(matches!(
            PdbFile::read_from(&mut input),
            Err(StructureFileError::Parse { line: 1, .. })
        ));
    }
}

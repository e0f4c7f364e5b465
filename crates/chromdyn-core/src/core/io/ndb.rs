use super::layout::{chain_letter, chains_from_labels};
use super::traits::{ParseErrorKind, StructureFile, StructureFileError, parse_float, parse_int};
use crate::core::models::sequence::ChromSequence;
use crate::core::models::system::ChromatinSystem;
use nalgebra::Point3;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};

/// Nucleome Data Bank style text: `CHROM` records for beads and `CONECT` records for the
/// chain bonds.
pub struct NdbFile;

const CHROM_FIELDS: usize = 8;

impl StructureFile for NdbFile {
    type Error = StructureFileError;

    fn read_from(reader: &mut impl BufRead) -> Result<ChromatinSystem, Self::Error> {
        let mut positions = Vec::new();
        let mut types = Vec::new();
        let mut labels: Vec<String> = Vec::new();
        let mut index_of_serial: HashMap<usize, usize> = HashMap::new();
        let mut conect: Vec<(usize, usize)> = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let parts: Vec<&str> = line.split_whitespace().collect();
            let Some(&record) = parts.first() else {
                continue;
            };

            match record {
                "CHROM" => {
                    if parts.len() < CHROM_FIELDS {
                        return Err(StructureFileError::Parse {
                            line: line_num,
                            kind: ParseErrorKind::MissingFields {
                                expected: CHROM_FIELDS,
                                found: parts.len(),
                            },
                        });
                    }
                    let serial = parse_int(parts[1], "serial", line_num)?;
                    let x = parse_float(parts[5], "x", line_num)?;
                    let y = parse_float(parts[6], "y", line_num)?;
                    let z = parse_float(parts[7], "z", line_num)?;
                    if index_of_serial.insert(serial, positions.len()).is_some() {
                        return Err(StructureFileError::Inconsistency(format!(
                            "duplicate bead serial {} on line {}",
                            serial, line_num
                        )));
                    }
                    types.push(parts[2].to_string());
                    labels.push(parts[3].to_string());
                    positions.push(Point3::new(x, y, z));
                }
                "CONECT" => {
                    if parts.len() < 3 {
                        continue;
                    }
                    let a = parse_int(parts[1], "CONECT serial", line_num)?;
                    for other in &parts[2..] {
                        conect.push((a, parse_int(other, "CONECT serial", line_num)?));
                    }
                }
                "END" => break,
                _ => {}
            }
        }

        if positions.is_empty() {
            return Err(StructureFileError::MissingRecord("CHROM records".into()));
        }

        let links: HashSet<(usize, usize)> = conect
            .into_iter()
            .filter_map(|(a, b)| Some((*index_of_serial.get(&a)?, *index_of_serial.get(&b)?)))
            .collect();
        let chains = chains_from_labels(&labels, &links);
        let sequence = ChromSequence::new(types)?;
        Ok(ChromatinSystem::new(positions, sequence, chains)?)
    }

    fn write_to(system: &ChromatinSystem, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "HEADER    CHROMATIN POLYMER")?;
        writeln!(
            writer,
            "TITLE     {} beads in {} chains",
            system.len(),
            system.chains().len()
        )?;
        for (chain_idx, chain) in system.chains().iter().enumerate() {
            let letter = chain_letter(chain_idx);
            for bead in chain.start..chain.end {
                let p = system.positions()[bead];
                let bead_type = system.sequence().bead_type(bead).unwrap_or("NA");
                writeln!(
                    writer,
                    "CHROM  {:>8} {:<6} {} {:>8} {:>10.3} {:>10.3} {:>10.3}",
                    bead + 1,
                    bead_type,
                    letter,
                    bead - chain.start + 1,
                    p.x,
                    p.y,
                    p.z
                )?;
            }
        }
        for (a, b) in system.bonds() {
            writeln!(writer, "CONECT {:>8} {:>8}", a + 1, b + 1)?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

use crate::codec::{fit_width, parse_field, slice_and_trim};
use crate::structure::ResidueCounter;
use crate::{MolecularStructure, StructureCodec, StructureError};
use common_types::FileFormat;
use ndarray::Array3;
use std::fmt::Write;

const ANGSTROM_PER_NM: f64 = 10.0;
const ATOM_NAME_WIDTH: usize = 4;
const RESIDUE_NAME_WIDTH: usize = 3;
const SERIAL_WRAP: usize = 100_000;
const RESIDUE_SEQ_WRAP: usize = 10_000;

/// Protein Data Bank text format. Coordinates are written in Ångström with
/// three decimals; multiple frames become `MODEL`/`ENDMDL` blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdbCodec;

struct AtomRecord {
    name: String,
    residue_name: String,
    residue_key: (String, String),
    position: [f64; 3],
}

fn parse_atom(line_num: usize, line: &str) -> Result<AtomRecord, StructureError> {
    let fmt = FileFormat::Pdb;
    let name = slice_and_trim(fmt, line_num, line, 12, 16)?;
    if name.is_empty() {
        return Err(StructureError::parse(fmt, line_num, "missing atom name in columns 13-16"));
    }
    let x: f64 = parse_field(fmt, line_num, line, (30, 38), "x coordinate")?;
    let y: f64 = parse_field(fmt, line_num, line, (38, 46), "y coordinate")?;
    let z: f64 = parse_field(fmt, line_num, line, (46, 54), "z coordinate")?;

    Ok(AtomRecord {
        name: name.to_owned(),
        residue_name: slice_and_trim(fmt, line_num, line, 17, 20)?.to_owned(),
        residue_key: (
            slice_and_trim(fmt, line_num, line, 21, 22)?.to_owned(),
            slice_and_trim(fmt, line_num, line, 22, 27)?.to_owned(),
        ),
        position: [x / ANGSTROM_PER_NM, y / ANGSTROM_PER_NM, z / ANGSTROM_PER_NM],
    })
}

/// The record type in columns 1-6, cut on a char boundary.
fn record_name(line: &str) -> &str {
    fit_width(line, 6).trim()
}

/// Moves the atoms collected so far into a new frame.
fn close_frame(
    frames: &mut Vec<Vec<[f64; 3]>>,
    current: &mut Vec<[f64; 3]>,
    line_num: usize,
) -> Result<(), StructureError> {
    if current.is_empty() {
        return Ok(());
    }
    let expected = frames.first().map_or(current.len(), Vec::len);
    if expected != current.len() {
        return Err(StructureError::parse(
            FileFormat::Pdb,
            line_num,
            format!("model has {} atoms, first model has {expected}", current.len()),
        ));
    }
    frames.push(std::mem::take(current));
    Ok(())
}

impl StructureCodec for PdbCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Pdb
    }

    fn parse_str(&self, content: &str) -> Result<MolecularStructure, StructureError> {
        let mut atom_names = Vec::new();
        let mut residue_names = Vec::new();
        let mut residue_ids = Vec::new();
        let mut residues = ResidueCounter::default();

        let mut frames: Vec<Vec<[f64; 3]>> = Vec::new();
        let mut current: Vec<[f64; 3]> = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line_num = index + 1;
            match record_name(line) {
                "ATOM" | "HETATM" => {
                    let atom = parse_atom(line_num, line)?;
                    // Topology comes from the first model only.
                    if frames.is_empty() {
                        atom_names.push(atom.name);
                        residue_names.push(atom.residue_name);
                        residue_ids.push(residues.index_for(atom.residue_key));
                    }
                    current.push(atom.position);
                }
                "MODEL" | "ENDMDL" | "END" => close_frame(&mut frames, &mut current, line_num)?,
                _ => {}
            }
        }
        close_frame(&mut frames, &mut current, content.lines().count())?;

        if frames.is_empty() {
            return Err(StructureError::parse(FileFormat::Pdb, 0, "no ATOM records found"));
        }

        let n_atoms = atom_names.len();
        let flat: Vec<f64> = frames.iter().flatten().flatten().copied().collect();
        let coordinates = Array3::from_shape_vec((frames.len(), n_atoms, 3), flat)
            .map_err(|e| StructureError::Inconsistent(e.to_string()))?;
        MolecularStructure::new(coordinates, atom_names, residue_names, residue_ids)
    }

    fn render_text(&self, structure: &MolecularStructure) -> String {
        let mut out = String::new();
        let multi_frame = structure.n_frames() > 1;

        for (frame_idx, frame) in structure.coordinates().outer_iter().enumerate() {
            if multi_frame {
                let _ = writeln!(out, "MODEL     {}", frame_idx + 1);
            }
            for (i, position) in frame.outer_iter().enumerate() {
                let serial = (i + 1) % SERIAL_WRAP;
                let name = fit_width(&structure.atom_names()[i], ATOM_NAME_WIDTH);
                let residue = fit_width(&structure.residue_names()[i], RESIDUE_NAME_WIDTH);
                let residue_seq = (structure.residue_ids()[i] + 1) % RESIDUE_SEQ_WRAP;
                let element = name.chars().next().unwrap_or(' ');
                let x = position[0] * ANGSTROM_PER_NM;
                let y = position[1] * ANGSTROM_PER_NM;
                let z = position[2] * ANGSTROM_PER_NM;
                let _ = writeln!(
                    out,
                    "ATOM  {serial:5} {name:<4} {residue:<3} A{residue_seq:4}    {x:8.3}{y:8.3}{z:8.3}  1.00  0.00          {element:>2}"
                );
            }
            if multi_frame {
                out.push_str("ENDMDL\n");
            }
        }
        out.push_str("END\n");
        out
    }
}

use crate::codec::{fit_width, parse_field, slice_and_trim};
use crate::structure::ResidueCounter;
use crate::{MolecularStructure, StructureCodec, StructureError};
use common_types::FileFormat;
use ndarray::Array3;
use std::fmt::Write;

const NAME_WIDTH: usize = 5;
const NUMBER_WRAP: usize = 100_000;

/// GROMACS coordinate format. Coordinates stay in nanometers; every frame is a
/// title line, an atom count, the atom lines and a box line.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroCodec;

struct Frame {
    positions: Vec<[f64; 3]>,
    box_lengths: [f64; 3],
}

impl StructureCodec for GroCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Gro
    }

    fn parse_str(&self, content: &str) -> Result<MolecularStructure, StructureError> {
        let fmt = FileFormat::Gro;
        let lines: Vec<&str> = content.lines().collect();
        let mut atom_names = Vec::new();
        let mut residue_names = Vec::new();
        let mut residue_ids = Vec::new();
        let mut residues = ResidueCounter::default();
        let mut frames: Vec<Frame> = Vec::new();

        let mut cursor = 0;
        while cursor < lines.len() {
            // Title line; trailing blank lines end the file.
            if lines[cursor..].iter().all(|l| l.trim().is_empty()) {
                break;
            }
            let count_line = cursor + 1;
            let Some(count_text) = lines.get(count_line) else {
                return Err(StructureError::parse(fmt, count_line + 1, "missing atom count"));
            };
            let n_atoms: usize = count_text.trim().parse().map_err(|_| {
                StructureError::parse(fmt, count_line + 1, format!("invalid atom count '{count_text}'"))
            })?;
            let expected = frames.first().map_or(n_atoms, |f| f.positions.len());
            if expected != n_atoms {
                return Err(StructureError::parse(
                    fmt,
                    count_line + 1,
                    format!("frame has {n_atoms} atoms, first frame has {expected}"),
                ));
            }

            let mut positions = Vec::with_capacity(n_atoms);
            for offset in 0..n_atoms {
                let index = count_line + 1 + offset;
                let line_num = index + 1;
                let Some(line) = lines.get(index) else {
                    return Err(StructureError::parse(fmt, line_num, "unexpected end of file"));
                };
                let x: f64 = parse_field(fmt, line_num, line, (20, 28), "x coordinate")?;
                let y: f64 = parse_field(fmt, line_num, line, (28, 36), "y coordinate")?;
                let z: f64 = parse_field(fmt, line_num, line, (36, 44), "z coordinate")?;
                positions.push([x, y, z]);

                if frames.is_empty() {
                    let residue_number = slice_and_trim(fmt, line_num, line, 0, 5)?.to_owned();
                    let residue_name = slice_and_trim(fmt, line_num, line, 5, 10)?.to_owned();
                    residue_ids.push(residues.index_for((residue_number, residue_name.clone())));
                    residue_names.push(residue_name);
                    atom_names.push(slice_and_trim(fmt, line_num, line, 10, 15)?.to_owned());
                }
            }

            let box_index = count_line + 1 + n_atoms;
            let box_lengths = parse_box(lines.get(box_index).copied(), box_index + 1)?;
            frames.push(Frame {
                positions,
                box_lengths,
            });
            cursor = box_index + 1;
        }

        if frames.is_empty() {
            return Err(StructureError::parse(fmt, 0, "no frames found"));
        }

        let n_atoms = atom_names.len();
        let box_lengths: Vec<[f64; 3]> = frames.iter().map(|f| f.box_lengths).collect();
        let flat: Vec<f64> = frames
            .iter()
            .flat_map(|f| f.positions.iter().flatten().copied())
            .collect();
        let coordinates = Array3::from_shape_vec((frames.len(), n_atoms, 3), flat)
            .map_err(|e| StructureError::Inconsistent(e.to_string()))?;
        MolecularStructure::new(coordinates, atom_names, residue_names, residue_ids)?
            .with_box_lengths(box_lengths)
    }

    fn render_text(&self, structure: &MolecularStructure) -> String {
        let mut out = String::new();
        let n_atoms = structure.n_atoms();

        for (frame_idx, frame) in structure.coordinates().outer_iter().enumerate() {
            let _ = writeln!(out, "Frame {}", frame_idx + 1);
            let _ = writeln!(out, "{n_atoms}");
            for (i, position) in frame.outer_iter().enumerate() {
                let residue_seq = (structure.residue_ids()[i] + 1) % NUMBER_WRAP;
                let residue = fit_width(&structure.residue_names()[i], NAME_WIDTH);
                let name = fit_width(&structure.atom_names()[i], NAME_WIDTH);
                let serial = (i + 1) % NUMBER_WRAP;
                let (x, y, z) = (position[0], position[1], position[2]);
                let _ = writeln!(
                    out,
                    "{residue_seq:5}{residue:<5}{name:>5}{serial:5}{x:8.3}{y:8.3}{z:8.3}"
                );
            }
            let [bx, by, bz] = structure
                .box_lengths()
                .and_then(|b| b.get(frame_idx).copied())
                .unwrap_or([0.0; 3]);
            let _ = writeln!(out, "{bx:10.5}{by:10.5}{bz:10.5}");
        }
        out
    }
}

/// Reads the first three box values. Triclinic lines carry six more, which are ignored.
fn parse_box(line: Option<&str>, line_num: usize) -> Result<[f64; 3], StructureError> {
    let Some(line) = line else {
        return Err(StructureError::parse(FileFormat::Gro, line_num, "missing box line"));
    };
    let values: Vec<f64> = line
        .split_whitespace()
        .take(3)
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| {
            StructureError::parse(FileFormat::Gro, line_num, format!("invalid box line '{line}'"))
        })?;
    match values.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(StructureError::parse(
            FileFormat::Gro,
            line_num,
            "box line needs three values",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATER: &str = "\
Water dimer
    6
    1SOL     OW    1   0.126   1.624   1.679
    1SOL    HW1    2   0.190   1.661   1.747
    1SOL    HW2    3   0.177   1.568   1.613
    2SOL     OW    4   1.275   0.053   0.622
    2SOL    HW1    5   1.337   0.002   0.680
    2SOL    HW2    6   1.326   0.120   0.568
   1.86206   1.86206   1.86206
";

    #[test]
    fn parses_atoms_residues_and_box() -> Result<(), StructureError> {
        let structure = GroCodec.parse_str(WATER)?;

        assert_eq!(structure.n_frames(), 1);
        assert_eq!(structure.n_atoms(), 6);
        assert_eq!(structure.atom_names()[1], "HW1");
        assert_eq!(structure.residue_names()[3], "SOL");
        assert_eq!(structure.residue_ids(), &[0, 0, 0, 1, 1, 1]);
        assert!((structure.coordinates()[[0, 3, 0]] - 1.275).abs() < 1e-9);
        assert_eq!(structure.box_lengths(), Some(&[[1.86206; 3]][..]));
        Ok(())
    }

    #[test]
    fn round_trip_keeps_everything_within_precision() -> Result<(), StructureError> {
        let original = GroCodec.parse_str(WATER)?;

        let reparsed = GroCodec.parse_str(&GroCodec.render_text(&original))?;

        assert_eq!(reparsed.atom_names(), original.atom_names());
        assert_eq!(reparsed.residue_names(), original.residue_names());
        assert_eq!(reparsed.residue_ids(), original.residue_ids());
        assert_eq!(reparsed.box_lengths(), original.box_lengths());
        for (a, b) in original.coordinates().iter().zip(reparsed.coordinates()) {
            assert!((a - b).abs() < 1e-3);
        }
        Ok(())
    }

    #[test]
    fn multiple_frames_and_zero_box() -> Result<(), StructureError> {
        let mut coordinates = Array3::zeros((3, 2, 3));
        coordinates[[2, 1, 2]] = 1.25;
        let structure = MolecularStructure::placeholder(coordinates)?;

        let text = GroCodec.render_text(&structure);
        let reparsed = GroCodec.parse_str(&text)?;

        assert!(text.contains("Frame 3\n"));
        assert!(text.contains("   0.00000   0.00000   0.00000"));
        assert_eq!(reparsed.n_frames(), 3);
        assert!((reparsed.coordinates()[[2, 1, 2]] - 1.25).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn large_systems_wrap_number_columns() -> Result<(), StructureError> {
        let n_atoms = 100_002;
        let mut coordinates = Array3::zeros((2, n_atoms, 3));
        coordinates[[1, n_atoms - 1, 0]] = 3.5;
        let structure = MolecularStructure::placeholder(coordinates)?;

        let text = GroCodec.render_text(&structure);
        let reparsed = GroCodec.parse_str(&text)?;

        let wrapped = text.lines().nth(2 + 99_999).unwrap_or_default();
        assert!(wrapped.starts_with("    0ALA     CA    0"), "{wrapped}");
        assert_eq!(reparsed.n_frames(), 2);
        assert_eq!(reparsed.residue_ids(), structure.residue_ids());
        assert!((reparsed.coordinates()[[1, n_atoms - 1, 0]] - 3.5).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn truncated_file_is_a_parse_error() {
        let truncated: String = WATER.lines().take(4).collect::<Vec<_>>().join("\n");
        assert!(matches!(
            GroCodec.parse_str(&truncated),
            Err(StructureError::Parse { .. })
        ));
    }
}

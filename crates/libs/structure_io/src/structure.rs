use crate::StructureError;
use ndarray::Array3;

pub const PLACEHOLDER_ATOM_NAME: &str = "CA";
pub const PLACEHOLDER_RESIDUE_NAME: &str = "ALA";

/// Coordinates plus per-atom naming across one or more frames.
///
/// Coordinates are in nanometers with shape `(frames, atoms, 3)`. The three
/// per-atom sequences always have one entry per atom. Residue ids are 0-based
/// indices into the residue sequence, not the numbers printed in files.
#[derive(Debug, Clone, PartialEq)]
pub struct MolecularStructure {
    coordinates: Array3<f64>,
    atom_names: Vec<String>,
    residue_names: Vec<String>,
    residue_ids: Vec<usize>,
    /// Rectangular box edge lengths per frame, in nanometers.
    box_lengths: Option<Vec<[f64; 3]>>,
}

impl MolecularStructure {
    pub fn new(
        coordinates: Array3<f64>,
        atom_names: Vec<String>,
        residue_names: Vec<String>,
        residue_ids: Vec<usize>,
    ) -> Result<Self, StructureError> {
        let (_, n_atoms, components) = coordinates.dim();
        if components != 3 {
            return Err(StructureError::Inconsistent(format!(
                "coordinates must have 3 components per atom, got {components}"
            )));
        }
        for (what, len) in [
            ("atom_names", atom_names.len()),
            ("residue_names", residue_names.len()),
            ("residue_ids", residue_ids.len()),
        ] {
            if len != n_atoms {
                return Err(StructureError::Inconsistent(format!(
                    "{what} has {len} entries for {n_atoms} atoms"
                )));
            }
        }
        Ok(Self {
            coordinates,
            atom_names,
            residue_names,
            residue_ids,
            box_lengths: None,
        })
    }

    /// One pseudo-atom per coordinate entry, each in its own generic residue.
    pub fn placeholder(coordinates: Array3<f64>) -> Result<Self, StructureError> {
        let n_atoms = coordinates.dim().1;
        Self::new(
            coordinates,
            vec![PLACEHOLDER_ATOM_NAME.to_owned(); n_atoms],
            vec![PLACEHOLDER_RESIDUE_NAME.to_owned(); n_atoms],
            (0..n_atoms).collect(),
        )
    }

    /// Reuses the naming of `template` for new coordinates with the same atom count.
    pub fn with_template(
        template: &Self,
        coordinates: Array3<f64>,
    ) -> Result<Self, StructureError> {
        let n_atoms = coordinates.dim().1;
        if n_atoms != template.n_atoms() {
            return Err(StructureError::Inconsistent(format!(
                "template has {} atoms, coordinates have {n_atoms}",
                template.n_atoms()
            )));
        }
        Self::new(
            coordinates,
            template.atom_names.clone(),
            template.residue_names.clone(),
            template.residue_ids.clone(),
        )
    }

    pub fn with_box_lengths(mut self, box_lengths: Vec<[f64; 3]>) -> Result<Self, StructureError> {
        if box_lengths.len() != self.n_frames() {
            return Err(StructureError::Inconsistent(format!(
                "{} box vectors for {} frames",
                box_lengths.len(),
                self.n_frames()
            )));
        }
        self.box_lengths = Some(box_lengths);
        Ok(self)
    }

    #[must_use]
    pub const fn coordinates(&self) -> &Array3<f64> {
        &self.coordinates
    }

    #[must_use]
    pub fn atom_names(&self) -> &[String] {
        &self.atom_names
    }

    #[must_use]
    pub fn residue_names(&self) -> &[String] {
        &self.residue_names
    }

    #[must_use]
    pub fn residue_ids(&self) -> &[usize] {
        &self.residue_ids
    }

    #[must_use]
    pub fn box_lengths(&self) -> Option<&[[f64; 3]]> {
        self.box_lengths.as_deref()
    }

    #[must_use]
    pub fn n_frames(&self) -> usize {
        self.coordinates.dim().0
    }

    #[must_use]
    pub fn n_atoms(&self) -> usize {
        self.coordinates.dim().1
    }

    #[must_use]
    pub fn into_coordinates(self) -> Array3<f64> {
        self.coordinates
    }
}

/// Assigns sequential 0-based residue indices, starting a new residue whenever the key changes.
#[derive(Debug, Default)]
pub(crate) struct ResidueCounter<K> {
    last: Option<K>,
    next: usize,
}

impl<K: PartialEq> ResidueCounter<K> {
    pub(crate) fn index_for(&mut self, key: K) -> usize {
        if self.last.as_ref() != Some(&key) {
            self.last = Some(key);
            self.next += 1;
        }
        self.next - 1
    }
}

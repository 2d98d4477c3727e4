use crate::{MolecularStructure, StructureError};
use common_types::FileFormat;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reads and writes one molecular file format.
pub trait StructureCodec: Send + Sync {
    fn format(&self) -> FileFormat;

    fn parse_str(&self, content: &str) -> Result<MolecularStructure, StructureError>;

    fn render_text(&self, structure: &MolecularStructure) -> String;

    fn parse_bytes(&self, bytes: &[u8]) -> Result<MolecularStructure, StructureError> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| StructureError::parse(self.format(), 0, format!("not UTF-8: {e}")))?;
        self.parse_str(content)
    }

    fn parse(&self, path: &Path) -> Result<MolecularStructure, StructureError> {
        let content = fs::read_to_string(path)?;
        self.parse_str(&content)
    }

    fn write(&self, path: &Path, structure: &MolecularStructure) -> Result<(), StructureError> {
        fs::write(path, self.render_text(structure))?;
        Ok(())
    }

    fn validate(&self, path: &Path) -> bool {
        match self.parse(path) {
            Ok(_) => true,
            Err(e) => {
                debug!("{} is not a valid {} file: {e}", path.display(), self.format());
                false
            }
        }
    }
}

/// Returns the trimmed column range, or "" if the line is too short. A range
/// that cuts through a multi-byte character is a parse error.
pub(crate) fn slice_and_trim(
    format: FileFormat,
    line_num: usize,
    line: &str,
    start: usize,
    end: usize,
) -> Result<&str, StructureError> {
    let end = end.min(line.len());
    if start >= end {
        return Ok("");
    }
    line.get(start..end).map(str::trim).ok_or_else(|| {
        StructureError::parse(
            format,
            line_num,
            format!("columns {}-{end} split a multi-byte character", start + 1),
        )
    })
}

/// Trims a name to the column width on a char boundary.
pub(crate) fn fit_width(name: &str, width: usize) -> &str {
    name.char_indices().nth(width).map_or(name, |(i, _)| &name[..i])
}

pub(crate) fn parse_field<T: std::str::FromStr>(
    format: FileFormat,
    line_num: usize,
    line: &str,
    (start, end): (usize, usize),
    field: &str,
) -> Result<T, StructureError> {
    let raw = slice_and_trim(format, line_num, line, start, end)?;
    raw.parse().map_err(|_| {
        StructureError::parse(
            format,
            line_num,
            format!("invalid {field} '{raw}' in columns {}-{end}", start + 1),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_give_empty_fields() -> Result<(), StructureError> {
        assert_eq!(slice_and_trim(FileFormat::Pdb, 1, "ATOM", 12, 16)?, "");
        assert_eq!(slice_and_trim(FileFormat::Pdb, 1, "ATOM  12", 4, 16)?, "12");
        Ok(())
    }

    #[test]
    fn split_multi_byte_character_is_a_parse_error() {
        // 'Å' is two bytes wide and starts at byte 12.
        let text = "ATOM      1 ÅCA  ALA A   1";
        let Err(StructureError::Parse { line, .. }) =
            slice_and_trim(FileFormat::Pdb, 7, text, 13, 16)
        else {
            panic!("expected parse error");
        };
        assert_eq!(line, 7);
    }

    #[test]
    fn fit_width_respects_char_boundaries() {
        assert_eq!(fit_width("POPC", 3), "POP");
        assert_eq!(fit_width("CA", 4), "CA");
        assert_eq!(fit_width("ÅÅÅÅÅ", 4), "ÅÅÅÅ");
    }
}

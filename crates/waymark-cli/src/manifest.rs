//! Manifest files: ordered migration identifiers, one per line.
//!
//! Blank lines and lines starting with `#` are ignored; surrounding
//! whitespace is trimmed.

use std::path::Path;

use crate::error::Error;

/// Read and parse a manifest file.
pub fn load(path: &Path) -> Result<Vec<String>, Error> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Manifest {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&content))
}

/// Parse manifest content.
pub fn parse(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

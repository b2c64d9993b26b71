//! Command-line front end: one module per processing mode.

pub mod app;
pub mod decompress;
pub mod decrypt;
pub mod parse;
pub mod rebuild;

use std::path::PathBuf;

/// Resolve an input path, retrying relative names against the data
/// directory environment variables.
pub fn resolve_input_path(path: &str) -> PathBuf {
    let direct = PathBuf::from(path);
    if direct.exists() || direct.is_absolute() {
        return direct;
    }
    for var in ["IB_PARSER_DATADIR", "MYSQL_DATADIR"] {
        if let Ok(dir) = std::env::var(var) {
            let candidate = PathBuf::from(dir).join(path);
            if candidate.exists() {
                return candidate;
            }
        }
    }
    direct
}

//! Index-id remap files.
//!
//! One mapping per line, `src=dst` or `src dst`; `#`-prefixed comments and
//! blank lines are ignored.

use std::collections::HashMap;
use std::path::Path;

use crate::IbdError;

/// Load an index-id map file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<HashMap<u64, u64>, IbdError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| IbdError::Io(format!("cannot read {}: {}", path.display(), e)))?;
    parse(&text).map_err(|e| IbdError::Argument(format!("{}: {}", path.display(), e)))
}

/// Parse index-id map text.
pub fn parse(text: &str) -> Result<HashMap<u64, u64>, String> {
    let mut map = HashMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (src, dst) = line
            .split_once('=')
            .or_else(|| line.split_once(char::is_whitespace))
            .ok_or_else(|| format!("line {}: expected 'src=dst'", lineno + 1))?;
        let src: u64 = src
            .trim()
            .parse()
            .map_err(|_| format!("line {}: bad source id {:?}", lineno + 1, src.trim()))?;
        let dst: u64 = dst
            .trim()
            .parse()
            .map_err(|_| format!("line {}: bad target id {:?}", lineno + 1, dst.trim()))?;
        map.insert(src, dst);
    }
    Ok(map)
}

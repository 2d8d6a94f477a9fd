use std::io::Write;
use tempfile::NamedTempFile;

/// Writes `json` to a fresh temporary file and returns it.
pub fn logits_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap_or_else(|e| panic!("create temp file: {e}"));
    write!(file, "{json}").unwrap_or_else(|e| panic!("write logits: {e}"));
    file
}

pub fn path_str(file: &NamedTempFile) -> &str {
    file.path().to_str().unwrap_or_else(|| panic!("path str"))
}

//! asnkit-std: Filesystem loader and CLI utilities
//!
//! This crate provides convenience utilities for native Rust usage,
//! including filesystem-based ASN.1 schema loading and the `asn1kit` CLI.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use asnkit_core;

/// Recursively collect ASN.1 schema files from a path.
///
/// A file path is returned as-is; a directory is walked for `.asn` and
/// `.asn1` files.
pub fn collect_asn_files(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if path.is_file() {
        files.push(path.to_path_buf());
        return files;
    }
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_files_recursive(&path, files);
            } else if path.is_file() {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                if ext.eq_ignore_ascii_case("asn") || ext.eq_ignore_ascii_case("asn1") {
                    files.push(path);
                }
            }
        }
    }
}

/// Read schema files as `(label, text)` pairs for `compile`.
pub fn load_sources(paths: &[PathBuf]) -> io::Result<Vec<(String, String)>> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(path)?;
        sources.push((path.display().to_string(), text));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_from_directory() {
        let dir = std::env::temp_dir().join("asnkit-collect-test");
        let nested = dir.join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.join("a.asn"), "A DEFINITIONS ::= BEGIN END").unwrap();
        fs::write(nested.join("b.asn1"), "B DEFINITIONS ::= BEGIN END").unwrap();
        fs::write(dir.join("ignored.txt"), "not a schema").unwrap();

        let files = collect_asn_files(&dir);
        assert_eq!(files.len(), 2);

        fs::remove_dir_all(&dir).unwrap();
    }
}

//! Ledger file loading.
//!
//! Only the directives the server needs are understood:
//!
//! ```text
//! include "2024/q1.ledger"
//! option "documents" "receipts"
//! 2024-01-05 * "Coffee"
//! ```
//!
//! The include list starts with the main file itself. Includes are
//! followed recursively (each relative to the file that declares it) and
//! recorded relative to the main file's directory when possible. Any
//! other line counts as an entry when it starts with a date.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use thiserror::Error;

use super::{DataSource, SourceKey, SourceOptions};
use crate::utils::path::clean_path;

const PGP_HEADER: &str = "-----BEGIN PGP MESSAGE-----";

/// Failure to read or parse a ledger.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Load the ledger at `path` (absolute) into a new `DataSource`.
pub fn load_file(key: SourceKey, path: &Path, generation: u64) -> Result<DataSource, LoadError> {
    if has_encrypted_extension(path) {
        return Ok(encrypted_source(key, path, generation));
    }
    let content = fs::read_to_string(path).map_err(|e| LoadError::Io(path.to_path_buf(), e))?;
    if content.starts_with(PGP_HEADER) {
        return Ok(encrypted_source(key, path, generation));
    }

    let root = path.parent().unwrap_or_else(|| Path::new("/"));
    let mut state = LoadState::default();
    state.visited.insert(path.to_path_buf());
    // The main file is the first file the ledger depends on
    state.options.include.push(relative_to(path, root));
    state.parse(path, &content, root)?;

    Ok(DataSource {
        key,
        path: path.to_path_buf(),
        encrypted: false,
        options: state.options,
        entries: state.entries,
        generation,
    })
}

fn has_encrypted_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("gpg" | "asc")
    )
}

/// Encrypted ledgers are never parsed.
fn encrypted_source(key: SourceKey, path: &Path, generation: u64) -> DataSource {
    DataSource {
        key,
        path: path.to_path_buf(),
        encrypted: true,
        options: SourceOptions::default(),
        entries: 0,
        generation,
    }
}

#[derive(Default)]
struct LoadState {
    options: SourceOptions,
    entries: usize,
    visited: FxHashSet<PathBuf>,
}

impl LoadState {
    /// Read and parse an included file. Missing includes stay in the
    /// include list (so their creation is noticed) but are not read.
    fn include(&mut self, file: &Path, root: &Path) -> Result<(), LoadError> {
        let content = match fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(LoadError::Io(file.to_path_buf(), e)),
        };
        self.parse(file, &content, root)
    }

    fn parse(&mut self, file: &Path, content: &str, root: &Path) -> Result<(), LoadError> {
        let dir = file.parent().unwrap_or(root);

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            let parse_error = |message: &str| LoadError::Parse {
                path: file.to_path_buf(),
                line: index + 1,
                message: message.to_string(),
            };

            if let Some(rest) = directive(line, "include") {
                let (target, _) = quoted(rest).map_err(parse_error)?;
                let absolute = clean_path(&dir.join(target));
                let recorded = relative_to(&absolute, root);
                if !self.options.include.contains(&recorded) {
                    self.options.include.push(recorded);
                }
                if self.visited.insert(absolute.clone()) {
                    self.include(&absolute, root)?;
                }
            } else if let Some(rest) = directive(line, "option") {
                let (name, rest) = quoted(rest).map_err(parse_error)?;
                let (value, _) = quoted(rest).map_err(parse_error)?;
                if name == "documents" {
                    let absolute = clean_path(&dir.join(value));
                    self.options.documents.push(relative_to(&absolute, root));
                }
            } else if starts_with_date(line) {
                self.entries += 1;
            }
        }

        Ok(())
    }
}

/// `path` relative to `root` when below it, else unchanged.
fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
}

/// Return the argument part of `line` if it starts with `keyword` followed
/// by whitespace.
fn directive<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim_start())
}

/// Split off a leading double-quoted string, returning it and the remainder.
fn quoted(text: &str) -> Result<(&str, &str), &'static str> {
    let text = text.trim_start();
    let body = text
        .strip_prefix('"')
        .ok_or("expected a double-quoted string")?;
    let end = body.find('"').ok_or("unterminated string")?;
    Ok((&body[..end], &body[end + 1..]))
}

/// `YYYY-MM-DD` at the start of the line.
fn starts_with_date(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

use std::path::PathBuf;

use rustc_hash::FxHashSet;

use super::DataSource;
use crate::utils::path::clean_path;

/// Absolute paths watched for one source.
pub type WatchSet = FxHashSet<PathBuf>;

/// Files and directories a source currently depends on.
///
/// Include and document paths are resolved against the directory of the
/// main file. Computed from the given snapshot only, so callers must pass
/// the source as it is after the latest reload.
pub fn file_set(source: &DataSource) -> WatchSet {
    let dir = source.dir();
    source
        .options
        .include
        .iter()
        .chain(&source.options.documents)
        .map(|path| clean_path(&dir.join(path)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{SourceKey, SourceOptions};

    fn source(include: &[&str], documents: &[&str]) -> DataSource {
        DataSource {
            key: SourceKey::new("a"),
            path: PathBuf::from("/books/a.dat"),
            encrypted: false,
            options: SourceOptions {
                include: include.iter().map(PathBuf::from).collect(),
                documents: documents.iter().map(PathBuf::from).collect(),
            },
            entries: 0,
            generation: 0,
        }
    }

    fn set(paths: &[&str]) -> WatchSet {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_includes_relative_to_source_dir() {
        let files = file_set(&source(&["inc.dat"], &[]));
        assert_eq!(files, set(&["/books/inc.dat"]));
    }

    #[test]
    fn test_union_of_includes_and_documents() {
        let files = file_set(&source(&["inc.dat", "2024/q1.dat"], &["docs", "inc.dat"]));
        assert_eq!(
            files,
            set(&["/books/inc.dat", "/books/2024/q1.dat", "/books/docs"])
        );
    }

    #[test]
    fn test_absolute_and_parent_paths() {
        let files = file_set(&source(&["/shared/prices.dat", "../other/x.dat", "./y.dat"], &[]));
        assert_eq!(
            files,
            set(&["/shared/prices.dat", "/other/x.dat", "/books/y.dat"])
        );
    }

    #[test]
    fn test_empty_options() {
        assert!(file_set(&source(&[], &[])).is_empty());
    }
}

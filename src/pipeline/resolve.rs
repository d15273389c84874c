//! Selecting a single file from a directory.

use std::path::PathBuf;
use crate::{
    Error,
    err::error,
    ext,
    storage::{DirHandle, FileHandle},
};

/// Finds files in `dir` that match `pattern`, and returns the first of them in lexicographic order.
/// Returns `NoCandidate` error if there are no matching files.
pub fn resolve(dir: &DirHandle, pattern: &str) -> Result<FileHandle, Error> {
    let local_dir = dir.local_path();
    let dir_str = local_dir.to_str().ok_or_else(|| error!(InvalidInput,
        "Cannot search directory {}: path is not valid UTF-8", ext::fmt::path(local_dir)))?;
    // Directory name may contain glob special characters.
    let escaped_dir = glob::Pattern::escape(dir_str);
    let full_pattern = format!("{}/{}", escaped_dir.trim_end_matches('/'), pattern);
    let entries = glob::glob(&full_pattern).map_err(|e|
        Error::InvalidInput(format!("Cannot parse pattern '{}': {}", pattern, e)))?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();
    log::debug!("    {} file(s) match {} in {}", candidates.len(), pattern, ext::fmt::path(local_dir));
    match candidates.into_iter().next() {
        Some(path) => Ok(dir.child(path)),
        None => Err(Error::NoCandidate { dir: local_dir.to_owned(), pattern: pattern.to_owned() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_in_sorted_order() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("ref [v1]");
        ext::sys::mkdir(&dir).unwrap();
        for name in ["zeta.fasta", "alpha.fasta", "alpha.fasta.bwt", "mid.fa"] {
            std::fs::write(&dir.join(name), b">chr\nACGT\n").unwrap();
        }
        ext::sys::mkdir(dir.join("sub.fasta")).unwrap();

        let handle = DirHandle::new(&dir, "mem:///ref");
        let first = resolve(&handle, "*.fasta").unwrap();
        assert_eq!(first.local_path(), dir.join("alpha.fasta"));
        assert_eq!(first.id(), "mem:///ref/alpha.fasta");
        for _ in 0..3 {
            assert_eq!(resolve(&handle, "*.fasta").unwrap(), first);
        }
    }

    #[test]
    fn no_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(&tmp.path().join("ref.fa"), b">chr\nACGT\n").unwrap();
        let handle = DirHandle::new(tmp.path(), "mem:///ref");
        match resolve(&handle, "*.fasta") {
            Err(Error::NoCandidate { dir, pattern }) => {
                assert_eq!(dir, tmp.path());
                assert_eq!(pattern, "*.fasta");
            }
            res => panic!("Expected NoCandidate, got {:?}", res),
        }
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_directory() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(OsStr::from_bytes(b"ref\xff"));
        let e = resolve(&DirHandle::new(&dir, "mem:///ref"), "*.fasta").unwrap_err();
        assert_eq!(e.kind(), "InvalidInputError");
    }
}

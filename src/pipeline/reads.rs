//! Quick sanity check of paired-end read files before alignment.

use std::{
    io::BufRead,
    path::Path,
};
use crate::{
    Error,
    err::{add_path, error},
    ext,
};

/// Returns the name of the first record in a FASTA/FASTQ file (possibly gzip-compressed).
fn first_record_name(path: &Path) -> Result<String, Error> {
    let mut reader = ext::sys::open(path)?;
    let mut line = String::new();
    // Skip empty lines at the start.
    while line.trim().is_empty() {
        line.clear();
        if reader.read_line(&mut line).map_err(add_path!(path))? == 0 {
            return Err(error!(InvalidInput, "Read file {} is empty", ext::fmt::path(path)));
        }
    }
    let line = line.trim_end();
    if !line.starts_with('@') && !line.starts_with('>') {
        return Err(error!(InvalidInput, "Read file {} is not in FASTQ/FASTA format: first line '{}'",
            ext::fmt::path(path), line));
    }
    Ok(line[1..].split_whitespace().next().unwrap_or("").to_owned())
}

/// Removes `/1`, `/2` mate suffixes.
fn strip_mate_suffix(name: &str) -> &str {
    lazy_static::lazy_static!{
        static ref MATE: regex::Regex = regex::Regex::new(r"/[12]$").unwrap();
    }
    match MATE.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// Checks that both read files are non-empty and look like FASTQ/FASTA.
/// Differing first read names are only reported, as some pipelines rename reads.
pub fn check_pair(read1: &Path, read2: &Path) -> Result<(), Error> {
    let name1 = first_record_name(read1)?;
    let name2 = first_record_name(read2)?;
    if strip_mate_suffix(&name1) != strip_mate_suffix(&name2) {
        log::warn!("    First reads in {} and {} have different names ({} and {}). Are the files paired?",
            ext::fmt::path(read1), ext::fmt::path(read2), name1, name2);
    }
    Ok(())
}

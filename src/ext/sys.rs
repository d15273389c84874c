use std::{
    io::{Read, BufRead, BufReader, Write, BufWriter},
    fs::{self, File},
    path::{Path, PathBuf},
    ffi::OsStr,
};
use flate2::bufread::MultiGzDecoder;
use crate::{
    Error,
    err::add_path,
};

/// Finds an executable, and returns Error, if executable is not available.
pub fn find_exe(p: impl AsRef<Path>) -> Result<PathBuf, Error> {
    which::which(p.as_ref()).map_err(|_| Error::ToolNotFound(p.as_ref().to_owned()))
}

/// Returns
/// - gzip reader if the file starts with gzip magic number,
/// - regular text file otherwise.
pub fn open(filename: &Path) -> Result<Box<dyn BufRead + Send>, Error> {
    let mut stream = BufReader::new(File::open(filename).map_err(add_path!(filename))?);
    let mut two_bytes = [0_u8; 2];
    let bytes_read = stream.read(&mut two_bytes).map_err(add_path!(filename))?;
    stream.seek_relative(-(bytes_read as i64)).map_err(add_path!(filename))?;
    // Check gzip magic number.
    if bytes_read == 2 && two_bytes[0] == 0x1f && two_bytes[1] == 0x8b {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(stream))))
    } else {
        Ok(Box::new(stream))
    }
}

/// Creates a buffered file.
pub fn create_file(filename: &Path) -> Result<BufWriter<File>, Error> {
    File::create(filename).map_err(add_path!(filename)).map(BufWriter::new)
}

/// Loads JSON file.
pub fn load_json(filename: &Path) -> Result<json::JsonValue, Error> {
    let mut s = String::new();
    File::open(filename).and_then(|mut f| f.read_to_string(&mut s)).map_err(add_path!(filename))?;
    Ok(json::parse(&s)?)
}

/// Writes JSON into the file with indentation.
pub fn save_json(obj: &json::JsonValue, filename: &Path) -> Result<(), Error> {
    let mut f = create_file(filename)?;
    obj.write_pretty(&mut f, 4).and_then(|()| f.flush()).map_err(add_path!(filename))
}

/// Returns a path with a new suffix appended to the end.
pub fn append_path(path: &Path, suffix: impl AsRef<OsStr>) -> PathBuf {
    let mut os_string = path.as_os_str().to_owned();
    os_string.push(suffix.as_ref());
    os_string.into()
}

/// Create directory with all parents, if it does not exist yet.
pub fn mkdir(path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(add_path!(path))
    } else {
        Ok(())
    }
}

/// Returns true if the file exists and is not empty.
pub fn nonempty_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

/// Returns true if the path is a directory containing at least one file.
pub fn nonempty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|entries| entries.filter_map(Result::ok).any(|entry| entry.path().is_file()))
        .unwrap_or(false)
}

/// Copies file or directory recursively.
pub fn copy_all(src: &Path, dst: &Path) -> Result<(), Error> {
    if src.is_dir() {
        mkdir(dst)?;
        for entry in fs::read_dir(src).map_err(add_path!(src))? {
            let entry = entry.map_err(add_path!(src))?;
            copy_all(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = dst.parent() {
            mkdir(parent)?;
        }
        fs::copy(src, dst).map_err(add_path!(src, dst))?;
    }
    Ok(())
}

/// Writes an empty file, that signifies successful completion.
pub fn write_success_file(path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    File::create(path).map_err(add_path!(path))?;
    Ok(())
}

/// Returns the last `max_lines` lines of the byte string.
pub fn tail_lines(bytes: &[u8], max_lines: usize) -> String {
    let s = String::from_utf8_lossy(bytes);
    let lines: Vec<_> = s.trim_end().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

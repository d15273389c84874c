//! File and directory handles, and the storage layer that moves them between
//! logical identifiers and local paths.

use std::{
    fmt,
    path::{Path, PathBuf, Component},
};
use crate::{
    Error,
    err::{add_path, error},
    ext,
};

/// Type of the artifact, passed between stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactType {
    File,
    Dir,
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Dir => "dir",
        })
    }
}

/// Local file, paired with its logical destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHandle {
    local: PathBuf,
    id: String,
}

impl FileHandle {
    pub fn new(local: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self { local: local.into(), id: id.into() }
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Logical identifier, opaque to the pipeline.
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Local directory, paired with its logical destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirHandle {
    local: PathBuf,
    id: String,
}

impl DirHandle {
    pub fn new(local: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self { local: local.into(), id: id.into() }
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle to a file within this directory. Logical identifier is extended with the file name.
    pub fn child(&self, local: PathBuf) -> FileHandle {
        let name = local.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        FileHandle::new(local, join_id(&self.id, &name))
    }
}

/// Artifact, produced by a stage or supplied by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Artifact {
    File(FileHandle),
    Dir(DirHandle),
}

impl Artifact {
    pub fn ty(&self) -> ArtifactType {
        match self {
            Self::File(_) => ArtifactType::File,
            Self::Dir(_) => ArtifactType::Dir,
        }
    }

    pub fn local_path(&self) -> &Path {
        match self {
            Self::File(h) => h.local_path(),
            Self::Dir(h) => h.local_path(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::File(h) => h.id(),
            Self::Dir(h) => h.id(),
        }
    }

    pub fn as_file(&self) -> Option<&FileHandle> {
        match self {
            Self::File(h) => Some(h),
            Self::Dir(_) => None,
        }
    }

    pub fn as_dir(&self) -> Option<&DirHandle> {
        match self {
            Self::Dir(h) => Some(h),
            Self::File(_) => None,
        }
    }
}

/// Appends a name to the logical identifier.
pub fn join_id(id: &str, name: &str) -> String {
    format!("{}/{}", id.trim_end_matches('/'), name)
}

/// Storage layer: converts logical identifiers to local paths and back.
pub trait Storage {
    /// Returns local path, under which the identifier is available.
    fn materialize(&self, id: &str) -> Result<PathBuf, Error>;

    /// Persists the local file or directory under the logical identifier.
    fn publish(&self, local: &Path, id: &str) -> Result<(), Error>;

    fn file(&self, id: &str) -> Result<FileHandle, Error> {
        let local = self.materialize(id)?;
        if !local.is_file() {
            return Err(error!(InvalidInput, "{} ({}) is not a file", id, ext::fmt::path(&local)));
        }
        Ok(FileHandle::new(local, id))
    }

    fn dir(&self, id: &str) -> Result<DirHandle, Error> {
        let local = self.materialize(id)?;
        if !local.is_dir() {
            return Err(error!(InvalidInput, "{} ({}) is not a directory", id, ext::fmt::path(&local)));
        }
        Ok(DirHandle::new(local, id))
    }

    /// Materializes artifact of the given type.
    fn artifact(&self, id: &str, ty: ArtifactType) -> Result<Artifact, Error> {
        match ty {
            ArtifactType::File => self.file(id).map(Artifact::File),
            ArtifactType::Dir => self.dir(id).map(Artifact::Dir),
        }
    }
}

/// Storage, backed by a local directory.
/// Identifier `scheme:///a/b` (as well as `/a/b` and `a/b`) corresponds to `root/a/b`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Converts logical identifier into a path within the root.
    pub fn path_of(&self, id: &str) -> Result<PathBuf, Error> {
        lazy_static::lazy_static!{
            static ref SCHEME: regex::Regex = regex::Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").unwrap();
        }
        let rel = SCHEME.find(id).map(|m| &id[m.end()..]).unwrap_or(id);
        let rel = Path::new(rel.trim_start_matches('/'));
        let mut path = self.root.clone();
        for comp in rel.components() {
            match comp {
                Component::Normal(s) => path.push(s),
                Component::CurDir => {}
                _ => return Err(error!(InvalidInput, "Logical identifier '{}' cannot be mapped to a local path", id)),
            }
        }
        Ok(path)
    }
}

impl Storage for LocalStorage {
    fn materialize(&self, id: &str) -> Result<PathBuf, Error> {
        let path = self.path_of(id)?;
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound,
                format!("{} is not available", id)), vec![path]));
        }
        Ok(path)
    }

    fn publish(&self, local: &Path, id: &str) -> Result<(), Error> {
        let dest = self.path_of(id)?;
        let same = match (local.canonicalize(), dest.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same {
            log::debug!("    {} is already published", id);
            return Ok(());
        }
        if dest.is_dir() && local.is_file() {
            std::fs::remove_dir_all(&dest).map_err(add_path!(dest))?;
        }
        log::debug!("    Publishing {} -> {}", ext::fmt::path(local), id);
        ext::sys::copy_all(local, &dest)
    }
}

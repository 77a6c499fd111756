//! Source stream resolution for shader and render-state files.
//!
//! A [`SourceStreamFactory`] resolves relative file names against an ordered
//! list of search directories, with an in-memory overlay that is consulted
//! first. The overlay serves two purposes: tests can run without touching
//! the filesystem, and hot-reload secondary sources can shadow files on
//! disk without rewriting them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

/// Errors that can occur while resolving or reading a source stream.
#[derive(Debug)]
pub enum StreamError {
    /// The name could not be resolved in the overlay or any search directory.
    NotFound(String),
    /// An IO error occurred while reading a resolved file.
    Io(std::io::Error),
    /// The stream was found but its contents are not valid UTF-8.
    InvalidData(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::NotFound(name) => write!(f, "stream not found: {name}"),
            StreamError::Io(err) => write!(f, "IO error: {err}"),
            StreamError::InvalidData(name) => write!(f, "stream is not valid UTF-8: {name}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io(err)
    }
}

/// Resolves named source streams against search directories and an
/// in-memory overlay.
///
/// Cloning is cheap and clones share the overlay.
///
/// # Resolution order
///
/// 1. The in-memory overlay, by exact name.
/// 2. The name itself, if it is an absolute path.
/// 3. Each search directory in registration order, joined with the name.
#[derive(Clone)]
pub struct SourceStreamFactory {
    search_dirs: Vec<PathBuf>,
    overlay: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl SourceStreamFactory {
    /// Creates a factory with the given search directories.
    pub fn new<P: Into<PathBuf>>(search_dirs: impl IntoIterator<Item = P>) -> Self {
        Self {
            search_dirs: search_dirs.into_iter().map(Into::into).collect(),
            overlay: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a factory with no search directories (overlay only).
    pub fn in_memory() -> Self {
        Self::new(Vec::<PathBuf>::new())
    }

    /// Inserts a stream into the in-memory overlay, shadowing any file of
    /// the same name on disk.
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.overlay.write().insert(name.into(), data.into());
    }

    /// Removes a stream from the overlay, returning its data if present.
    pub fn remove(&self, name: &str) -> Option<Vec<u8>> {
        self.overlay.write().remove(name)
    }

    /// The registered search directories, in resolution order.
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Checks whether a stream with the given name can be resolved.
    pub fn exists(&self, name: &str) -> bool {
        if self.overlay.read().contains_key(name) {
            return true;
        }
        self.resolve(name).is_some()
    }

    /// Reads the entire contents of the named stream.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, StreamError> {
        if let Some(data) = self.overlay.read().get(name) {
            return Ok(data.clone());
        }
        let path = self
            .resolve(name)
            .ok_or_else(|| StreamError::NotFound(name.to_owned()))?;
        log::trace!("reading stream '{}' from {}", name, path.display());
        Ok(std::fs::read(path)?)
    }

    /// Reads the named stream as a UTF-8 string.
    pub fn read_to_string(&self, name: &str) -> Result<String, StreamError> {
        let bytes = self.read(name)?;
        String::from_utf8(bytes).map_err(|_| StreamError::InvalidData(name.to_owned()))
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_absolute() && direct.is_file() {
            return Some(direct.to_path_buf());
        }
        self.search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

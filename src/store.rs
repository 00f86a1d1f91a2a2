//! Filesystem access for attachments.
//!
//! `AttachmentStore` is the only seam through which the crate touches files: the encoder reads
//! attachment sources and the receive flow writes extracted parts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::TransportError;

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "{} does not exist", "_0.display()")]
    NotFound(PathBuf),
    #[display(fmt = "{}: {}", "path.display()", source)]
    Io { path: PathBuf, source: io::Error },
    #[display(fmt = "refusing to write attachment named {:?}", _0)]
    InvalidFilename(String),
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<StoreError> for TransportError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(p) => {
                TransportError::io(p.display(), io::Error::from(io::ErrorKind::NotFound))
            }
            StoreError::Io { path, source } => TransportError::io(path.display(), source),
            StoreError::InvalidFilename(name) => TransportError::io(
                &name,
                io::Error::new(io::ErrorKind::InvalidInput, "unsafe attachment file name"),
            ),
        }
    }
}

pub trait AttachmentStore {
    /// read_attachment returns whole file. Missing file is reported as `StoreError::NotFound`.
    fn read_attachment(&self, path: &Path) -> Result<Vec<u8>, StoreError>;

    /// write_attachment stores `data` as `directory/filename`, creating directory if needed and
    /// overwriting existing file. Returns path of written file.
    fn write_attachment(&self, directory: &Path, filename: &str, data: &[u8]) -> Result<PathBuf, StoreError>;
}

/// FsAttachmentStore works on local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsAttachmentStore;

fn has_drive_prefix(name: &str) -> bool {
    let b = name.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

/// sanitize_filename turns file name taken from received mail into safe single path component.
///
/// Directory prefix is stripped (`docs/a.pdf` becomes `a.pdf`). Names which try to escape
/// target directory (any `..` component or absolute path), empty names, `.` and names
/// containing NUL are rejected.
pub fn sanitize_filename(name: &str) -> Result<&str, StoreError> {
    let invalid = || StoreError::InvalidFilename(name.to_string());

    if name.contains('\0') {
        return Err(invalid());
    }
    if name.starts_with('/') || name.starts_with('\\') || has_drive_prefix(name) {
        return Err(invalid());
    }
    let mut components = name.split(|c| c == '/' || c == '\\');
    if components.any(|c| c == "..") {
        return Err(invalid());
    }
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or("").trim();
    if base.is_empty() || base == "." {
        return Err(invalid());
    }
    Ok(base)
}

impl AttachmentStore for FsAttachmentStore {
    fn read_attachment(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
            _ => StoreError::Io { path: path.to_path_buf(), source: e },
        })
    }

    fn write_attachment(&self, directory: &Path, filename: &str, data: &[u8]) -> Result<PathBuf, StoreError> {
        let name = sanitize_filename(filename)?;
        fs::create_dir_all(directory).map_err(|e| StoreError::Io {
            path: directory.to_path_buf(),
            source: e,
        })?;
        let target = directory.join(name);
        fs::write(&target, data).map_err(|e| StoreError::Io {
            path: target.clone(),
            source: e,
        })?;
        debug!("wrote {} bytes to {}", data.len(), target.display());
        Ok(target)
    }
}

/// MemoryAttachmentStore serves files from a map, written files are kept in the same map.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryAttachmentStore {
    files: std::cell::RefCell<std::collections::HashMap<PathBuf, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryAttachmentStore {
    pub fn insert<P: AsRef<Path>>(&mut self, path: P, data: &[u8]) {
        self.files.borrow_mut().insert(path.as_ref().to_path_buf(), data.to_vec());
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<Vec<u8>> {
        self.files.borrow().get(path.as_ref()).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.borrow().len()
    }
}

#[cfg(test)]
impl AttachmentStore for MemoryAttachmentStore {
    fn read_attachment(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        self.get(path).ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn write_attachment(&self, directory: &Path, filename: &str, data: &[u8]) -> Result<PathBuf, StoreError> {
        let target = directory.join(sanitize_filename(filename)?);
        self.files.borrow_mut().insert(target.clone(), data.to_vec());
        Ok(target)
    }
}

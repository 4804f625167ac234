//! Byte-stream sources and targets.
//!
//! A [`VSource`] is somewhere encoded image bytes come from, a [`VTarget`]
//! somewhere they go. Both are opaque handles: loaders and savers take them
//! as arguments (`pngload_source`, `jpegsave_target`, ...) and read or write
//! through them without caring whether the other end is memory or a file.

use crate::error::{Error, Result};
use crate::object::Handle;
use crate::value::Blob;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

enum Origin {
    Memory(Blob),
    File(PathBuf),
}

pub struct SourceData {
    origin: Origin,
}

impl SourceData {
    /// Every byte the source holds.
    pub fn read_all(&self) -> std::io::Result<Blob> {
        match &self.origin {
            Origin::Memory(blob) => Ok(blob.clone()),
            Origin::File(path) => std::fs::read(path).map(Blob::new),
        }
    }

    pub fn filename(&self) -> Option<&Path> {
        match &self.origin {
            Origin::Memory(_) => None,
            Origin::File(path) => Some(path),
        }
    }
}

/// A handle on a readable byte stream.
#[derive(Clone, Default)]
pub struct VSource(Handle<SourceData>);

impl VSource {
    pub fn new_from_memory(bytes: impl Into<Blob>) -> Self {
        Self(Handle::from_object(SourceData {
            origin: Origin::Memory(bytes.into()),
        }))
    }

    /// Open a file source. Fails straight away if the file can't be opened.
    pub fn new_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        File::open(path).map_err(|e| {
            Error::Construction(format!("unable to open {}: {e}", path.display()))
        })?;
        Ok(Self(Handle::from_object(SourceData {
            origin: Origin::File(path.to_path_buf()),
        })))
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn ref_count(&self) -> usize {
        self.0.ref_count()
    }

    /// Read the whole stream. Errors on a null source.
    pub fn read_all(&self) -> std::io::Result<Blob> {
        match self.0.get_object() {
            Some(source) => source.read_all(),
            None => Err(std::io::Error::other("null source")),
        }
    }

    pub fn filename(&self) -> Option<&Path> {
        self.0.get_object().and_then(|s| s.filename())
    }
}

impl PartialEq for VSource {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl fmt::Debug for VSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get_object().map(|s| &s.origin) {
            Some(Origin::Memory(blob)) => write!(f, "VSource(memory, {} bytes)", blob.len()),
            Some(Origin::File(path)) => write!(f, "VSource({})", path.display()),
            None => f.write_str("VSource(null)"),
        }
    }
}

enum Sink {
    Memory(Mutex<Vec<u8>>),
    File { path: PathBuf, file: Mutex<File> },
}

pub struct TargetData {
    sink: Sink,
}

impl TargetData {
    pub fn write_all(&self, bytes: &[u8]) -> std::io::Result<()> {
        match &self.sink {
            Sink::Memory(buffer) => {
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(bytes);
                Ok(())
            }
            Sink::File { file, .. } => {
                let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
                file.write_all(bytes)?;
                file.flush()
            }
        }
    }
}

/// A handle on a writable byte stream.
#[derive(Clone, Default)]
pub struct VTarget(Handle<TargetData>);

impl VTarget {
    pub fn new_to_memory() -> Self {
        Self(Handle::from_object(TargetData {
            sink: Sink::Memory(Mutex::new(Vec::new())),
        }))
    }

    /// Create (or truncate) a file target.
    pub fn new_to_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            Error::Construction(format!("unable to create {}: {e}", path.display()))
        })?;
        Ok(Self(Handle::from_object(TargetData {
            sink: Sink::File {
                path: path.to_path_buf(),
                file: Mutex::new(file),
            },
        })))
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn ref_count(&self) -> usize {
        self.0.ref_count()
    }

    pub fn write_all(&self, bytes: &[u8]) -> std::io::Result<()> {
        match self.0.get_object() {
            Some(target) => target.write_all(bytes),
            None => Err(std::io::Error::other("null target")),
        }
    }

    /// Bytes written so far to a memory target, `None` for file targets.
    pub fn contents(&self) -> Option<Blob> {
        match &self.0.get_object()?.sink {
            Sink::Memory(buffer) => Some(Blob::new(
                buffer.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            )),
            Sink::File { .. } => None,
        }
    }

    pub fn filename(&self) -> Option<&Path> {
        match &self.0.get_object()?.sink {
            Sink::Memory(_) => None,
            Sink::File { path, .. } => Some(path),
        }
    }
}

impl PartialEq for VTarget {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl fmt::Debug for VTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.filename() {
            Some(path) => write!(f, "VTarget({})", path.display()),
            None if self.is_null() => f.write_str("VTarget(null)"),
            None => f.write_str("VTarget(memory)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_reads_back_bytes() {
        let source = VSource::new_from_memory(vec![1u8, 2, 3]);
        assert_eq!(source.read_all().unwrap().as_bytes(), &[1, 2, 3]);
        assert!(source.filename().is_none());
    }

    #[test]
    fn missing_file_source_fails_on_construction() {
        let err = VSource::new_from_file("/nonexistent/input.png").unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[test]
    fn memory_target_accumulates_writes() {
        let target = VTarget::new_to_memory();
        target.write_all(b"ab").unwrap();
        target.write_all(b"cd").unwrap();
        assert_eq!(target.contents().unwrap().as_bytes(), b"abcd");
    }

    #[test]
    fn file_target_writes_through() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out.bin");
        let target = VTarget::new_to_file(&path).unwrap();
        target.write_all(b"hello").unwrap();
        assert!(target.contents().is_none());
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");

        let source = VSource::new_from_file(&path).unwrap();
        assert_eq!(source.read_all().unwrap().as_bytes(), b"hello");
    }

    #[test]
    fn null_handles_refuse_io() {
        assert!(VSource::default().read_all().is_err());
        assert!(VTarget::default().write_all(b"x").is_err());
    }
}

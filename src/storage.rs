use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use url::Url;
use uuid::Uuid;

use crate::error::QueryError;

/// Extension of the published record streams (JSON Lines).
pub const RECORD_EXTENSION: &str = "jsonl";

/// Append-only buffer for serialized records.
///
/// Backed by a temporary file that is deleted on drop unless handed to a
/// [`Storage`], so a failed query never leaves a partial output behind.
pub struct RecordSink {
    writer: BufWriter<NamedTempFile>,
}

impl RecordSink {
    /// Create a sink in the system temporary directory.
    pub fn create() -> io::Result<Self> {
        Ok(Self::from_file(NamedTempFile::new()?))
    }

    /// Create a sink in `dir`.
    pub fn create_in(dir: &Path) -> io::Result<Self> {
        Ok(Self::from_file(NamedTempFile::new_in(dir)?))
    }

    fn from_file(file: NamedTempFile) -> Self {
        Self {
            writer: BufWriter::new(file),
        }
    }

    /// Flush buffered records and return the finished file.
    pub fn finish(self) -> Result<NamedTempFile, QueryError> {
        self.writer
            .into_inner()
            .map_err(|e| QueryError::Io(e.into_error()))
    }
}

impl Write for RecordSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Durable home for finished record streams.
pub trait Storage {
    /// Open a sink suitable for a later [`Storage::put_file`].
    fn create_sink(&self) -> Result<RecordSink, QueryError> {
        Ok(RecordSink::create()?)
    }

    /// Take ownership of a finished stream and return its address.
    fn put_file(&self, file: NamedTempFile) -> Result<Url, QueryError>;
}

/// Stores result files in a local directory and addresses them as `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<(), QueryError> {
        fs::create_dir_all(&self.root).map_err(|e| QueryError::Storage {
            message: format!("cannot create {}: {}", self.root.display(), e),
        })
    }
}

impl Storage for LocalStorage {
    fn create_sink(&self) -> Result<RecordSink, QueryError> {
        self.ensure_root()?;
        // Same directory as the final file so publishing is a rename.
        Ok(RecordSink::create_in(&self.root)?)
    }

    fn put_file(&self, file: NamedTempFile) -> Result<Url, QueryError> {
        self.ensure_root()?;
        let target = self
            .root
            .join(format!("{}.{}", Uuid::new_v4(), RECORD_EXTENSION));

        if let Err(err) = file.persist_noclobber(&target) {
            // Different filesystem: fall back to a copy, the temp file is
            // removed when `err.file` drops.
            fs::copy(err.file.path(), &target).map_err(|e| QueryError::Storage {
                message: format!("cannot store result in {}: {}", target.display(), e),
            })?;
        }

        let absolute = fs::canonicalize(&target)?;
        Url::from_file_path(&absolute).map_err(|_| QueryError::Storage {
            message: format!("cannot address {} as a URL", absolute.display()),
        })
    }
}

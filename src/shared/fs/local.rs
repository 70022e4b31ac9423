use opendal::{Buffer, ErrorKind, Operator, Writer, services};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::shared::errors::CliantError;

/// Size of the in-memory buffer flushed per write syscall.
const WRITE_CHUNK: usize = 4 * 1024 * 1024;

/// Files of one download, all living in the same directory.
///
/// Names passed to the methods are file names relative to that directory.
#[derive(Clone)]
pub struct LocalFs {
    op: Operator,
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: &Path) -> Result<Self, CliantError> {
        let root_str = root.to_str().ok_or_else(|| {
            CliantError::Config(format!("Directory {} is not valid UTF-8", root.display()))
        })?;
        let builder = services::Fs::default().root(root_str);
        let op = Operator::new(builder)
            .map_err(|err| CliantError::filesystem(root, err))?
            .finish();
        Ok(Self { op, root: root.to_path_buf() })
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Opens `name` for writing, truncating any previous content.
    pub async fn create(&self, name: &str) -> Result<LocalFile, CliantError> {
        let path = self.path_of(name);
        debug!(path = %path.display(), "Creating file.");
        let writer = self
            .op
            .writer_with(name)
            .chunk(WRITE_CHUNK)
            .await
            .map_err(|err| CliantError::filesystem(&path, err))?;
        Ok(LocalFile { writer, path, written: 0 })
    }

    /// Reads the whole file into memory.
    pub async fn read(&self, name: &str) -> Result<Buffer, opendal::Error> {
        self.op.read(name).await
    }

    pub async fn exists(&self, name: &str) -> Result<bool, CliantError> {
        self.op
            .exists(name)
            .await
            .map_err(|err| CliantError::filesystem(self.path_of(name), err))
    }

    /// Removes `name`; a missing file is not an error.
    pub async fn remove(&self, name: &str) -> Result<(), CliantError> {
        match self.op.delete(name).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CliantError::filesystem(self.path_of(name), err)),
        }
    }
}

/// Open file being written by exactly one owner.
pub struct LocalFile {
    writer: Writer,
    path: PathBuf,
    written: u64,
}

impl LocalFile {
    /// Appends `bytes` to the file.
    pub async fn append_bytes(&mut self, bytes: impl Into<Buffer>) -> Result<(), CliantError> {
        let buffer: Buffer = bytes.into();
        let len = buffer.len() as u64;
        self.writer
            .write(buffer)
            .await
            .map_err(|err| CliantError::filesystem(&self.path, err))?;
        self.written += len;
        Ok(())
    }

    /// Flushes buffered bytes and closes the file.
    pub async fn close_fs(mut self) -> Result<u64, CliantError> {
        if let Err(err) = self.writer.close().await {
            error!(path = %self.path.display(), "Can't close writer: {err}");
            return Err(CliantError::filesystem(&self.path, err));
        }
        Ok(self.written)
    }
}

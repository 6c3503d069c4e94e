//! Collaborator seams: the byte source drained by the sender and the byte
//! sink filled by the receiver.
//!
//! The transfer engines only see these traits; production code plugs in the
//! filesystem implementations below, tests plug in in-memory ones.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{FileFerryError, Result};

/// Byte stream consumed by the sending side.
pub trait ByteSource {
    /// Read up to `n` bytes. An empty result means the stream is exhausted.
    fn read_up_to(&mut self, n: usize) -> Result<Bytes>;
}

/// Byte stream produced by the receiving side.
pub trait ByteSink: Send + Sync {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Opens the sink once the filename prelude has been delivered.
pub trait SinkFactory {
    /// Create the sink for `<subdir>/<filename>.recv`. `subdir` may be
    /// empty. Fails when `filename` is empty.
    fn create(&mut self, subdir: &str, filename: &str) -> Result<Box<dyn ByteSink>>;
}

/// File-backed `ByteSource`.
pub struct FileSource {
    inner: BufReader<File>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).map_err(FileFerryError::Source)?;
        Ok(Self {
            inner: BufReader::new(file),
        })
    }
}

impl ByteSource for FileSource {
    fn read_up_to(&mut self, n: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let read = self
                .inner
                .read(&mut buf[filled..])
                .map_err(FileFerryError::Source)?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }
}

/// File-backed `ByteSink` writing through a buffered writer.
pub struct FileSink {
    inner: BufWriter<File>,
}

impl ByteSink for FileSink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).map_err(FileFerryError::Sink)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.flush().map_err(FileFerryError::Sink)
    }
}

/// Creates `<root>/<subdir>/<filename>.recv`, making directories as needed.
pub struct FsSinkFactory {
    root: PathBuf,
}

impl FsSinkFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SinkFactory for FsSinkFactory {
    fn create(&mut self, subdir: &str, filename: &str) -> Result<Box<dyn ByteSink>> {
        if filename.is_empty() {
            return Err(FileFerryError::MissingFilename);
        }
        // Both names arrive off the wire; nothing in them may climb out of
        // the receive root.
        if filename.contains(['/', '\\']) || filename == ".." {
            return Err(FileFerryError::UnsafePath(filename.to_string()));
        }
        if subdir.starts_with('/')
            || subdir
                .split('/')
                .any(|component| component == ".." || component.contains('\\'))
        {
            return Err(FileFerryError::UnsafePath(subdir.to_string()));
        }

        let mut dir = self.root.clone();
        if !subdir.is_empty() {
            dir.push(subdir);
            fs::create_dir_all(&dir).map_err(FileFerryError::Sink)?;
        }
        let path = dir.join(format!("{filename}.recv"));
        let file = File::create(&path).map_err(FileFerryError::Sink)?;
        Ok(Box::new(FileSink {
            inner: BufWriter::new(file),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_filename() {
        let mut factory = FsSinkFactory::new("/nonexistent");
        assert!(matches!(
            factory.create("sub", ""),
            Err(FileFerryError::MissingFilename)
        ));
    }

    #[test]
    fn rejects_escaping_names() {
        let mut factory = FsSinkFactory::new("/nonexistent");
        for (subdir, filename) in [
            ("..", "file.bin"),
            ("a/../b", "file.bin"),
            ("/abs", "file.bin"),
            ("a\\..\\b", "file.bin"),
            ("sub", ".."),
            ("sub", "../file.bin"),
            ("sub", "x/y.bin"),
        ] {
            assert!(
                matches!(
                    factory.create(subdir, filename),
                    Err(FileFerryError::UnsafePath(_))
                ),
                "{subdir:?}/{filename:?} must be rejected"
            );
        }
    }

    #[test]
    fn creates_sink_under_subdir() {
        let root = tempfile::tempdir().unwrap();
        let mut factory = FsSinkFactory::new(root.path());
        let mut sink = factory.create("nested/dir", "out.bin").unwrap();
        sink.write_all(b"bytes").unwrap();
        sink.close().unwrap();
        let written = fs::read(root.path().join("nested/dir/out.bin.recv")).unwrap();
        assert_eq!(written, b"bytes");
    }
}

//! Package assembly and container output.
//!
//! A [`Package`] is the finished, in-memory result of assembling a book: the
//! manifest, the reading order, the navigation records and the bytes of every
//! entry. It is written out through the [`ContainerSink`] trait, so the ZIP
//! writer in [`archive`] is one possible target among others.

pub mod archive;
pub mod manifest;
pub mod templates;

use std::io::{Seek, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::types::{ChapterRecord, ManifestEntry, SpineRef};

pub use archive::ZipSink;

/// Fixed content of the type declaration entry.
pub const MIMETYPE: &str = "application/epub+zip";
pub const MIMETYPE_PATH: &str = "mimetype";
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// How a single container entry is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Store,
    Deflate,
}

/// Append-only destination of named byte blobs.
///
/// Entries are written in call order. Every [`start_entry`](ContainerSink::start_entry)
/// ends the previous entry; [`seal`](ContainerSink::seal) ends the last one and
/// finalizes the container.
pub trait ContainerSink {
    type Output;

    fn start_entry(&mut self, name: &str, compression: Compression) -> Result<()>;

    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    fn seal(self) -> Result<Self::Output>;
}

/// An assembled book, ready to be written.
#[derive(Debug, Clone)]
pub struct Package {
    pub(crate) manifest: Vec<ManifestEntry>,
    pub(crate) spine: Vec<SpineRef>,
    pub(crate) chapters: Vec<ChapterRecord>,
    pub(crate) container: Vec<u8>,
    /// Entry bytes, parallel to `manifest`.
    pub(crate) data: Vec<Vec<u8>>,
    pub(crate) compress_entries: bool,
}

impl Package {
    /// Every manifest entry, in manifest order. The last one is the package document.
    pub fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    /// Reading order.
    pub fn spine(&self) -> &[SpineRef] {
        &self.spine
    }

    /// One navigation record per section, in reading order.
    pub fn chapters(&self) -> &[ChapterRecord] {
        &self.chapters
    }

    /// Bytes of the entry at container path `path`.
    pub fn entry_data(&self, path: &str) -> Option<&[u8]> {
        if path == MIMETYPE_PATH {
            return Some(MIMETYPE.as_bytes());
        }
        if path == CONTAINER_PATH {
            return Some(&self.container);
        }
        self.manifest
            .iter()
            .position(|entry| entry.path == path)
            .map(|index| self.data[index].as_slice())
    }

    /// Streams every entry into `sink` and seals it.
    ///
    /// The type declaration comes first and is always stored uncompressed,
    /// followed by the container description and then the manifest entries
    /// in manifest order.
    pub fn write_into<S: ContainerSink>(&self, mut sink: S) -> Result<S::Output> {
        let compression = if self.compress_entries {
            Compression::Deflate
        } else {
            Compression::Store
        };

        sink.start_entry(MIMETYPE_PATH, Compression::Store)?;
        sink.write_bytes(MIMETYPE.as_bytes())?;

        sink.start_entry(CONTAINER_PATH, compression)?;
        sink.write_bytes(&self.container)?;

        for (entry, data) in self.manifest.iter().zip(&self.data) {
            sink.start_entry(&entry.path, compression)?;
            sink.write_bytes(data)?;
        }

        log::debug!("Sealing container with {} entries", self.manifest.len() + 2);
        sink.seal()
    }

    /// Writes the package as a ZIP archive into `writer`.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        self.write_into(ZipSink::new(writer))
    }

    /// Writes the package to `dest`.
    ///
    /// The archive is built in a temporary file inside the destination
    /// directory and moved into place once sealed, so a failure never leaves a
    /// partial file at `dest`.
    pub fn persist(&self, dest: &Path) -> Result<()> {
        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = NamedTempFile::new_in(dir)?;
        let file = self.write_to(file)?;
        file.persist(dest).map_err(|e| Error::Io(e.error))?;
        log::info!("Wrote {}", dest.display());
        Ok(())
    }
}

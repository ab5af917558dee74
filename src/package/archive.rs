//! ZIP implementation of [`ContainerSink`].

use std::io::{Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::{Compression, ContainerSink};
use crate::error::{Error, Result};

/// Writes container entries into a ZIP archive.
///
/// Every entry carries the same fixed timestamp, so identical packages
/// produce identical archives.
pub struct ZipSink<W: Write + Seek> {
    zip: ZipWriter<W>,
    current: String,
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            zip: ZipWriter::new(writer),
            current: String::new(),
        }
    }

    fn options(compression: Compression) -> SimpleFileOptions {
        let method = match compression {
            Compression::Store => CompressionMethod::Stored,
            Compression::Deflate => CompressionMethod::Deflated,
        };
        SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
    }
}

impl<W: Write + Seek> ContainerSink for ZipSink<W> {
    type Output = W;

    fn start_entry(&mut self, name: &str, compression: Compression) -> Result<()> {
        self.current = name.to_string();
        self.zip
            .start_file(name, Self::options(compression))
            .map_err(|e| Error::container(name, e))
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.zip
            .write_all(data)
            .map_err(|e| Error::container(self.current.as_str(), e))
    }

    fn seal(self) -> Result<W> {
        self.zip
            .finish()
            .map_err(|e| Error::container(self.current, e))
    }
}

//! Common test utilities for the Quire crate.
//!
//! Provides helpers for temporary directories, dummy asset files, books with
//! their own directive registry, and reading back written containers.

use quire::error::HandlerError;
use quire::prelude::*;
use std::io::{Cursor, Read};
use tempfile::TempDir;
use tokio::fs;
use zip::ZipArchive;

/// Bytes standing in for a PNG file. Quire never decodes images.
#[allow(dead_code)]
pub const DUMMY_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
#[allow(dead_code)]
pub const DUMMY_JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF";

/// Creates a fresh temporary directory, removed when the guard is dropped.
#[allow(dead_code)]
pub fn setup_test_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Writes `data` to `path`, creating parent directories as needed.
#[allow(dead_code)]
pub async fn write_file(path: &Path, data: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.unwrap();
    }
    fs::write(path, data).await.unwrap();
}

/// A book resolving directives against `registry` instead of the global one.
#[allow(dead_code)]
pub fn book_with_registry(title: &str, registry: Arc<DirectiveRegistry>) -> Book {
    let config = BookConfig::builder()
        .metadata(BookMetadata::default_with_title(title))
        .registry(registry)
        .build()
        .unwrap();
    Book::from_config(config)
}

/// Directive handler echoing its name and sorted attributes.
#[allow(dead_code)]
pub fn echo_handler(
    _ctx: &DocumentContext<'_>,
    name: &str,
    attributes: &DirectiveAttributes,
    _source: &str,
) -> std::result::Result<String, HandlerError> {
    let attrs: Vec<String> = attributes
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    Ok(format!("<span class=\"{}\">{}</span>", name, attrs.join(";")))
}

/// Directive handler that always fails.
#[allow(dead_code)]
pub fn failing_handler(
    _ctx: &DocumentContext<'_>,
    _name: &str,
    _attributes: &DirectiveAttributes,
    _source: &str,
) -> std::result::Result<String, HandlerError> {
    Err("handler exploded".into())
}

/// Directive handler resolving `src` to the href of a registered image.
#[allow(dead_code)]
pub fn figure_handler(
    ctx: &DocumentContext<'_>,
    _name: &str,
    attributes: &DirectiveAttributes,
    _source: &str,
) -> std::result::Result<String, HandlerError> {
    let src = attributes.get("src").ok_or("figure needs a src")?;
    let href = ctx.lookup_image(src).ok_or("unknown image")?;
    Ok(format!("<img src=\"{}\" alt=\"\" />", href))
}

/// Opens an in-memory container.
#[allow(dead_code)]
pub fn open_archive(bytes: Vec<u8>) -> ZipArchive<Cursor<Vec<u8>>> {
    ZipArchive::new(Cursor::new(bytes)).unwrap()
}

/// Opens a container written to disk.
#[allow(dead_code)]
pub async fn open_archive_file(path: &Path) -> ZipArchive<Cursor<Vec<u8>>> {
    assert!(path.is_file(), "Output container does not exist: {:?}", path);
    open_archive(fs::read(path).await.unwrap())
}

/// Entry names in archive order.
#[allow(dead_code)]
pub fn entry_names(archive: &mut ZipArchive<Cursor<Vec<u8>>>) -> Vec<String> {
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Reads one entry of the archive as text.
#[allow(dead_code)]
pub fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

/// Assembles `book` and returns its container bytes.
#[allow(dead_code)]
pub fn write_to_memory(book: &Book) -> Vec<u8> {
    book.write_to(Cursor::new(Vec::new())).unwrap().into_inner()
}

/// Content of the entry at `path` of an assembled package, as text.
#[allow(dead_code)]
pub fn package_text(package: &Package, path: &str) -> String {
    String::from_utf8(package.entry_data(path).unwrap().to_vec()).unwrap()
}

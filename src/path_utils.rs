//! Path utilities for container path layout and safe file path handling.
//!
//! Everything inside the container uses `/`-separated string paths. This module
//! decides where each kind of entry lives (the [`PackageLayout`]), how caller-supplied
//! names are turned into container file names and manifest ids, and how one
//! container path is referenced from another.

use crate::error::{Error, Result};
use crate::types::AssetCategory;

use std::path::{Component, Path};

/// Directory (below the content root) holding the generated content documents.
pub const TEXT_DIR: &str = "text";

/// Placement policy for every entry of the container.
///
/// All content lives below a single root folder (`OEBPS` by default). An empty
/// root gives a flat layout where `text/`, `images/` and the package document
/// sit directly at the top of the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    root: String,
}

impl Default for PackageLayout {
    fn default() -> Self {
        Self::new("OEBPS")
    }
}

impl PackageLayout {
    pub fn new(root: impl Into<String>) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_matches('/').to_string(),
        }
    }

    /// The content root, without trailing slash. Empty for the flat layout.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Prefix that [`PackageLayout::entry`] puts in front of every path.
    pub fn root_prefix(&self) -> String {
        if self.root.is_empty() {
            String::new()
        } else {
            format!("{}/", self.root)
        }
    }

    /// Full container path of `relative`, placed below the content root.
    pub fn entry(&self, relative: &str) -> String {
        format!("{}{}", self.root_prefix(), relative)
    }

    /// Container directory of the content documents.
    pub fn text_dir(&self) -> String {
        self.entry(TEXT_DIR)
    }

    pub fn text_entry(&self, file_name: &str) -> String {
        self.entry(&format!("{}/{}", TEXT_DIR, file_name))
    }

    pub fn asset_entry(&self, category: AssetCategory, file_name: &str) -> String {
        self.entry(&format!("{}/{}", category.directory(), file_name))
    }

    pub fn package_document(&self) -> String {
        self.entry("content.opf")
    }

    /// Reference to `target` as seen from a content document.
    pub fn href_from_text(&self, target: &str) -> String {
        relative_path(&self.text_dir(), target)
    }
}

/// Computes the `/`-separated path leading from directory `from_dir` to `target`.
///
/// Both arguments are container paths relative to the container root.
pub fn relative_path(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(&to[common..]);
    parts.join("/")
}

/// Checks that a configured content root can be used inside a container.
pub fn validate_root(root: &str) -> std::result::Result<(), String> {
    if root.starts_with('/') || root.contains('\\') {
        return Err(format!("Content root must be a relative '/' path: {}", root));
    }
    if root.split('/').any(|segment| segment == "..") {
        return Err(format!("Content root must not leave the container: {}", root));
    }
    if root.trim_matches('/').eq_ignore_ascii_case("META-INF") {
        return Err("Content root must not be META-INF".to_string());
    }
    Ok(())
}

/// Turns a logical asset name into a container file name.
///
/// Path separators and spaces become underscores so every asset of a
/// category lives flat in its directory.
pub fn sanitize_asset_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Turns a container file name into an XML name usable as a manifest id.
///
/// Letters and digits of any script are kept, since XML names allow them.
pub fn manifest_id(file_name: &str) -> String {
    let mut id: String = file_name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !id.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        id.insert(0, '_');
    }
    id
}

/// Appends `-n` to the stem of `file_name`; `n == 1` leaves it unchanged.
pub fn numbered_file_name(file_name: &str, n: usize) -> String {
    if n <= 1 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, n, ext),
        _ => format!("{}-{}", file_name, n),
    }
}

/// Builds the logical name of a file found below `base`, using `/` separators.
pub fn logical_name(base: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(base).map_err(|_| {
        Error::InvalidPath(
            path.to_path_buf(),
            format!("Not inside {}", path_to_string_lossy(base)),
        )
    })?;

    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Checks if a filename starts with a dot (hidden file) using safe conversion.
pub fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

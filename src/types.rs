//! Core data types and enums for the Quire packaging library.
//!
//! This module defines the fundamental data structures used throughout Quire:
//! - Book-level metadata (`BookMetadata`)
//! - Content groupings (`Tier`, `Section`, `ContentFormat`)
//! - Registered resources (`Asset`, `AssetCategory`)
//! - Finalized package records (`ManifestEntry`, `SpineRef`, `ChapterRecord`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Media type of every generated content document.
pub const MEDIA_TYPE_XHTML: &str = "application/xhtml+xml";
/// Media type of the package document.
pub const MEDIA_TYPE_OPF: &str = "application/oebps-package+xml";
/// Media type of the legacy NCX table of contents.
pub const MEDIA_TYPE_NCX: &str = "application/x-dtbncx+xml";
/// Media type of stylesheets.
pub const MEDIA_TYPE_CSS: &str = "text/css";

/// Book-level metadata rendered into the package document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub language: String, // e.g., "en", "ja"
    pub release_date: Option<DateTime<Utc>>,
}

impl BookMetadata {
    /// Creates a default `BookMetadata` instance with a specified title and default language "en".
    pub fn default_with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            language: "en".to_string(),
            ..Default::default()
        }
    }
}

/// One of the three fixed content groupings. Declaration order is reading order.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum Tier {
    #[serde(rename = "introduction")]
    FrontMatter,
    #[serde(rename = "chapter")]
    Body,
    #[serde(rename = "postscript")]
    BackMatter,
}

impl Tier {
    /// All tiers in reading order.
    pub const ALL: [Tier; 3] = [Tier::FrontMatter, Tier::Body, Tier::BackMatter];

    /// The navigation kind tag of sections in this tier.
    pub fn kind(self) -> &'static str {
        match self {
            Tier::FrontMatter => "introduction",
            Tier::Body => "chapter",
            Tier::BackMatter => "postscript",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Whether a section's fragments still need markdown rendering at assembly time.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ContentFormat {
    Markdown,
    Html,
}

/// A titled unit of content, already split into fragments.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    pub format: ContentFormat,
    pub fragments: Vec<String>,
}

/// Category of a registered asset. Logical names are unique per category.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Image,
    Font,
    Asset,
}

impl AssetCategory {
    /// Directory (below the content root) holding assets of this category.
    pub fn directory(self) -> &'static str {
        match self {
            AssetCategory::Image => "images",
            AssetCategory::Font => "fonts",
            AssetCategory::Asset => "assets",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetCategory::Image => f.write_str("image"),
            AssetCategory::Font => f.write_str("font"),
            AssetCategory::Asset => f.write_str("asset"),
        }
    }
}

/// Special manifest properties consumed by the navigation and package templates.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Property {
    #[serde(rename = "cover-image")]
    CoverImage,
    #[serde(rename = "nav")]
    Nav,
}

impl Property {
    pub fn as_str(self) -> &'static str {
        match self {
            Property::CoverImage => "cover-image",
            Property::Nav => "nav",
        }
    }
}

/// A binary resource registered on a book.
#[derive(Debug, Clone)]
pub struct Asset {
    pub category: AssetCategory,
    /// Caller-supplied name used for lookups.
    pub name: String,
    /// Manifest id.
    pub id: String,
    /// Full path inside the container.
    pub path: String,
    /// Path relative to the content documents directory.
    pub href: String,
    pub media_type: String,
    pub property: Option<Property>,
    pub data: Vec<u8>,
}

/// One entry of the package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub id: String,
    pub path: String,
    pub media_type: String,
    pub properties: Option<Property>,
}

/// One item of the reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpineRef {
    pub idref: String,
}

/// Navigation record of one section, pointing at its first fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRecord {
    pub nav_point: String,
    pub id: usize,
    pub title: String,
    /// Full container path of fragment 0.
    pub path: String,
    /// `path` as referenced from the navigation document.
    pub href: String,
    pub kind: Tier,
}

/// Utility function: Determines the media type of an image from its extension
///
/// # Supported formats
///
/// png, jpg/jpeg, svg, webp, jxl, gif, heif, avif
pub fn image_media_type(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        Some("svg") => Ok("image/svg+xml"),
        Some("webp") => Ok("image/webp"),
        Some("jxl") => Ok("image/jxl"),
        Some("gif") => Ok("image/gif"),
        Some("heif") => Ok("image/heif"),
        Some("avif") => Ok("image/avif"),
        _ => Err(Error::Unsupported(format!("Image format {:?}", ext))),
    }
}

/// Utility function: Determines the media type of a font from its extension
pub fn font_media_type(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("ttf") => Ok("font/ttf"),
        Some("otf") => Ok("font/otf"),
        Some("woff") => Ok("font/woff"),
        Some("woff2") => Ok("font/woff2"),
        _ => Err(Error::Unsupported(format!("Font format {:?}", ext))),
    }
}

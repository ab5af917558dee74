//! Quire - Markdown to EPUB Packaging Library
//!
//! This crate assembles titled sections written in markdown, extended with
//! inline directives such as `{{< figure src="map.png" >}}`, into a single
//! EPUB 3 container: a package document, a navigation document and one XHTML
//! content file per page fragment, in reading order.
//!
//! # Getting Started
//!
//! Create a [`Book`], register the assets your content refers to, add
//! introductions, chapters and postscripts, then write it out. Sections are
//! split into several content files wherever `<!-- PAGE BREAK -->` appears.
//!
//! ```rust,no_run
//! use quire::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> quire::error::Result<()> {
//!     // 1. Directives are global unless a book is given its own registry
//!     register_directive(
//!         "figure",
//!         |ctx: &DocumentContext<'_>,
//!          _name: &str,
//!          attrs: &DirectiveAttributes,
//!          _source: &str|
//!          -> Result<String, HandlerError> {
//!             let href = attrs
//!                 .get("src")
//!                 .and_then(|src| ctx.lookup_image(src))
//!                 .ok_or("figure needs a registered src")?;
//!             Ok(format!("<img src=\"{}\" alt=\"\" />", href))
//!         },
//!     );
//!
//!     // 2. Configure and fill the book
//!     let config = BookConfig::builder()
//!         .metadata(BookMetadata::default_with_title("Travel Log"))
//!         .legacy_ncx(true)
//!         .build()?;
//!     let book = Book::from_config(config);
//!     book.set_author("A. Writer");
//!     book.set_cover("./assets/cover.jpg").await?;
//!     book.add_image_folder("./assets/maps").await?;
//!
//!     book.add_introduction_md("Preface", "Why this trip happened.")?;
//!     book.add_chapter_md(
//!         "Day One",
//!         "{{< figure src=\"harbour.png\" >}}\n\n<!-- PAGE BREAK -->\n\nThe second page.",
//!     )?;
//!
//!     // 3. Assemble and write the container
//!     book.write("./travel-log.epub").await?;
//!     Ok(())
//! }
//! ```

pub mod book;
pub mod collector;
pub mod directive;
pub mod error;
pub mod markdown;
pub mod package;
pub mod path_utils;
pub mod types;

pub use book::{Book, BookConfig, BookConfigBuilder, DocumentContext};
pub use package::Package;

// Re-export core types for direct access
pub use types::{
    Asset, AssetCategory, BookMetadata, ChapterRecord, ContentFormat, ManifestEntry, Property,
    Section, SpineRef, Tier,
};

/// Prelude module for convenient imports.
///
/// Brings the book, its configuration, the directive API and the core types
/// into scope with a single `use quire::prelude::*;`.
pub mod prelude {
    pub use super::{
        AssetCategory, Book, BookConfig, BookConfigBuilder, BookMetadata, ChapterRecord,
        DocumentContext, ManifestEntry, Package, SpineRef, Tier, error, types,
    };
    pub use crate::directive::{
        DirectiveAttributes, DirectiveHandler, DirectiveRegistry, register_directive,
    };
    pub use crate::error::HandlerError;
    pub use crate::markdown::MarkdownOptions;
    pub use crate::package::{Compression, ContainerSink, ZipSink};
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}

//! The in-memory book and its configuration.
//!
//! A [`Book`] collects metadata, assets and sections from any number of
//! threads and turns them into a [`Package`] in one pass. All state sits behind
//! a single lock: every mutation holds it for its whole duration, and so does
//! assembly. Directive handlers run while that lock is held and see the book
//! through a read-only [`DocumentContext`].

use std::collections::HashMap;
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::spawn_blocking;
use uuid::Uuid;

use crate::collector::ImageCollector;
use crate::directive::DirectiveRegistry;
use crate::error::{Error, Result};
use crate::markdown::{MarkdownOptions, MarkdownRenderer};
use crate::package::Package;
use crate::package::manifest::{self, AssemblyOptions};
use crate::package::templates::TemplateSet;
use crate::path_utils::{
    PackageLayout, manifest_id, numbered_file_name, path_to_string_lossy, sanitize_asset_name,
    validate_root,
};
use crate::types::{
    Asset, AssetCategory, BookMetadata, ContentFormat, Property, Section, Tier, font_media_type,
    image_media_type,
};

/// Settings fixed for the lifetime of a [`Book`].
///
/// ```rust
/// use quire::prelude::*;
///
/// let config = BookConfig::builder()
///     .metadata(BookMetadata::default_with_title("Field Notes"))
///     .content_root("")
///     .legacy_ncx(true)
///     .build()
///     .expect("Invalid configuration");
/// let book = Book::from_config(config);
/// assert_eq!(book.title(), "Field Notes");
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct BookConfig {
    /// Initial metadata. Everything but the identifier can still be changed on the book.
    #[builder(default = "BookMetadata::default_with_title(\"Untitled\")")]
    pub metadata: BookMetadata,

    /// Unique identifier of the book. A fresh `urn:uuid:` is generated when absent.
    #[builder(default)]
    pub identifier: Option<String>,

    /// Folder holding all content inside the container. `""` gives a flat layout.
    #[builder(default = "\"OEBPS\".to_string()")]
    pub content_root: String,

    /// Turn soft line breaks of markdown paragraphs into `<br />`.
    #[builder(default = "true")]
    pub hard_wraps: bool,

    /// Markdown extensions enabled on top of tables, strikethrough and
    /// definition lists, e.g. `MarkdownOptions::ENABLE_FOOTNOTES`.
    #[builder(default = "MarkdownOptions::empty()")]
    pub markdown_extensions: MarkdownOptions,

    /// Deflate every entry except the type declaration.
    #[builder(default = "true")]
    pub compress_entries: bool,

    /// Also emit an EPUB 2 `toc.ncx` next to the navigation document.
    #[builder(default)]
    pub legacy_ncx: bool,

    /// Directive registry used instead of the process-wide one.
    #[builder(default)]
    pub registry: Option<Arc<DirectiveRegistry>>,
}

impl BookConfig {
    pub fn builder() -> BookConfigBuilder {
        BookConfigBuilder::default()
    }
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            metadata: BookMetadata::default_with_title("Untitled"),
            identifier: None,
            content_root: "OEBPS".to_string(),
            hard_wraps: true,
            markdown_extensions: MarkdownOptions::empty(),
            compress_entries: true,
            legacy_ncx: false,
            registry: None,
        }
    }
}

impl BookConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(root) = &self.content_root {
            validate_root(root)?;
        }
        if let Some(metadata) = &self.metadata {
            if metadata.title.trim().is_empty() {
                return Err("Book title must not be empty".to_string());
            }
        }
        if let Some(Some(identifier)) = &self.identifier {
            if identifier.trim().is_empty() {
                return Err("Identifier must not be empty".to_string());
            }
        }
        Ok(())
    }
}

/// Mutable part of a book, guarded by the book lock.
#[derive(Debug)]
pub(crate) struct BookState {
    pub(crate) metadata: BookMetadata,
    pub(crate) current_date: DateTime<Utc>,
    pub(crate) stylesheet: Option<Vec<u8>>,
    /// Index of the cover in `assets`.
    pub(crate) cover: Option<usize>,
    pub(crate) assets: Vec<Asset>,
    lookups: HashMap<AssetCategory, HashMap<String, usize>>,
    pub(crate) sections: [Vec<Section>; 3],
    pub(crate) templates: TemplateSet,
}

impl BookState {
    fn new(metadata: BookMetadata) -> Self {
        Self {
            metadata,
            current_date: Utc::now(),
            stylesheet: None,
            cover: None,
            assets: Vec::new(),
            lookups: HashMap::new(),
            sections: Default::default(),
            templates: TemplateSet::default(),
        }
    }

    fn lookup(&self, category: AssetCategory, name: &str) -> Option<&Asset> {
        self.lookups
            .get(&category)
            .and_then(|names| names.get(name))
            .map(|&index| &self.assets[index])
    }

    /// Whether a container path or a manifest id is already used by an asset.
    fn is_taken(&self, path: &str, id: &str) -> bool {
        self.assets.iter().any(|a| a.path == path || a.id == id)
    }

    /// Registers `asset`, leaving the registry untouched on a collision.
    fn insert_asset(&mut self, asset: Asset) -> Result<usize> {
        if self.lookup(asset.category, &asset.name).is_some() {
            return Err(Error::collision(asset.category, asset.name));
        }

        let index = self.assets.len();
        self.lookups
            .entry(asset.category)
            .or_default()
            .insert(asset.name.clone(), index);
        self.assets.push(asset);
        Ok(index)
    }

    fn push_section(&mut self, tier: Tier, mut section: Section) {
        if section.fragments.is_empty() {
            section.fragments.push(String::new());
        }
        self.sections[tier.index()].push(section);
    }
}

/// Read-only view of a book handed to directive handlers.
#[derive(Debug, Clone, Copy)]
pub struct DocumentContext<'a> {
    pub(crate) state: &'a BookState,
    pub(crate) layout: &'a PackageLayout,
    pub(crate) identifier: &'a str,
}

impl<'a> DocumentContext<'a> {
    /// Href of a registered image, relative to the content documents.
    pub fn lookup_image(&self, name: &str) -> Option<&'a str> {
        self.lookup(AssetCategory::Image, name)
    }

    pub fn lookup_font(&self, name: &str) -> Option<&'a str> {
        self.lookup(AssetCategory::Font, name)
    }

    pub fn lookup_asset(&self, name: &str) -> Option<&'a str> {
        self.lookup(AssetCategory::Asset, name)
    }

    fn lookup(&self, category: AssetCategory, name: &str) -> Option<&'a str> {
        let href = self.state.lookup(category, name).map(|a| a.href.as_str());
        log::debug!("{} lookup: {} => {:?}", category, name, href);
        href
    }

    pub fn metadata(&self) -> &'a BookMetadata {
        &self.state.metadata
    }

    pub fn identifier(&self) -> &'a str {
        self.identifier
    }

    /// Href of the cover image, relative to the content documents.
    pub fn cover_href(&self) -> Option<&'a str> {
        self.state
            .cover
            .map(|index| self.state.assets[index].href.as_str())
    }

    pub fn layout(&self) -> &'a PackageLayout {
        self.layout
    }
}

/// A book being assembled.
///
/// Every method takes `&self`, so a `Book` can be shared between tasks behind
/// an [`Arc`]. Sections keep their tier order (introductions, chapters,
/// postscripts) no matter how additions interleave.
#[derive(Debug)]
pub struct Book {
    layout: PackageLayout,
    renderer: MarkdownRenderer,
    registry: Arc<DirectiveRegistry>,
    compress_entries: bool,
    legacy_ncx: bool,
    identifier: String,
    state: Mutex<BookState>,
}

impl Book {
    /// Creates a book with default settings and the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self::from_config(BookConfig {
            metadata: BookMetadata::default_with_title(title),
            ..BookConfig::default()
        })
    }

    pub fn from_config(config: BookConfig) -> Self {
        let identifier = config
            .identifier
            .unwrap_or_else(|| format!("urn:uuid:{}", Uuid::new_v4()));
        log::info!("Creating book '{}' ({})", config.metadata.title, identifier);

        Self {
            layout: PackageLayout::new(config.content_root),
            renderer: MarkdownRenderer::with_options(config.hard_wraps, config.markdown_extensions),
            registry: config.registry.unwrap_or_else(DirectiveRegistry::global),
            compress_entries: config.compress_entries,
            legacy_ncx: config.legacy_ncx,
            identifier,
            state: Mutex::new(BookState::new(config.metadata)),
        }
    }

    fn state(&self) -> MutexGuard<'_, BookState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context<'a>(&'a self, state: &'a BookState) -> DocumentContext<'a> {
        DocumentContext {
            state,
            layout: &self.layout,
            identifier: &self.identifier,
        }
    }

    // --- Metadata ---

    /// The identifier assigned when the book was created.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn metadata(&self) -> BookMetadata {
        self.state().metadata.clone()
    }

    pub fn title(&self) -> String {
        self.state().metadata.title.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.state().metadata.title = title.into();
    }

    pub fn author(&self) -> Option<String> {
        self.state().metadata.author.clone()
    }

    pub fn set_author(&self, author: impl Into<String>) {
        self.state().metadata.author = Some(author.into());
    }

    pub fn publisher(&self) -> Option<String> {
        self.state().metadata.publisher.clone()
    }

    pub fn set_publisher(&self, publisher: impl Into<String>) {
        self.state().metadata.publisher = Some(publisher.into());
    }

    pub fn description(&self) -> Option<String> {
        self.state().metadata.description.clone()
    }

    pub fn set_description(&self, description: impl Into<String>) {
        self.state().metadata.description = Some(description.into());
    }

    pub fn language(&self) -> String {
        self.state().metadata.language.clone()
    }

    pub fn set_language(&self, language: impl Into<String>) {
        self.state().metadata.language = language.into();
    }

    pub fn release_date(&self) -> Option<DateTime<Utc>> {
        self.state().metadata.release_date
    }

    pub fn set_release_date(&self, date: DateTime<Utc>) {
        self.state().metadata.release_date = Some(date);
    }

    /// Timestamp written as the modification date of the package.
    pub fn current_date(&self) -> DateTime<Utc> {
        self.state().current_date
    }

    pub fn registry(&self) -> &Arc<DirectiveRegistry> {
        &self.registry
    }

    pub fn layout(&self) -> &PackageLayout {
        &self.layout
    }

    // --- Assets ---

    /// Builds the asset registered as `name`.
    ///
    /// Distinct names can sanitize to the same file name, so the file name is
    /// numbered until neither its path nor its manifest id is in use.
    fn build_asset(
        &self,
        state: &BookState,
        category: AssetCategory,
        name: &str,
        media_type: &str,
        data: Vec<u8>,
    ) -> Asset {
        let sanitized = sanitize_asset_name(name);
        let (base, id_prefix) = match category {
            AssetCategory::Image => (format!("img_{}", sanitized), ""),
            AssetCategory::Font => (sanitized, "font_"),
            AssetCategory::Asset => (sanitized, "asset_"),
        };

        let mut n = 1;
        let (path, id) = loop {
            let file_name = numbered_file_name(&base, n);
            let path = self.layout.asset_entry(category, &file_name);
            let id = manifest_id(&format!("{}{}", id_prefix, file_name));
            if !state.is_taken(&path, &id) {
                break (path, id);
            }
            n += 1;
        };

        Asset {
            category,
            name: name.to_string(),
            id,
            href: self.layout.href_from_text(&path),
            path,
            media_type: media_type.to_string(),
            property: None,
            data,
        }
    }

    fn register(
        &self,
        category: AssetCategory,
        name: &str,
        media_type: &str,
        data: Vec<u8>,
    ) -> Result<String> {
        let mut state = self.state();
        let asset = self.build_asset(&state, category, name, media_type, data);
        log::debug!("Registering {} '{}' as {}", asset.category, asset.name, asset.path);
        let href = asset.href.clone();
        state.insert_asset(asset)?;
        Ok(href)
    }

    /// Registers image bytes under `name`. The media type follows the extension of `name`.
    ///
    /// Returns the href content documents use to reference the image.
    pub fn add_image_bytes(&self, name: &str, data: Vec<u8>) -> Result<String> {
        let media_type = image_media_type(Path::new(name))?;
        self.register(AssetCategory::Image, name, media_type, data)
    }

    /// Reads the image at `source` and registers it under `name`.
    pub async fn add_image(&self, source: impl AsRef<Path>, name: &str) -> Result<String> {
        let source = source.as_ref();
        let media_type = image_media_type(source)?;
        let data = read_source(source).await?;
        self.register(AssetCategory::Image, name, media_type, data)
    }

    /// Registers every image below `directory`, named by its path relative to it.
    ///
    /// Images are registered in sorted name order. On a collision the images
    /// registered before it stay registered.
    pub async fn add_image_folder(&self, directory: impl AsRef<Path>) -> Result<usize> {
        let directory = directory.as_ref();
        let images = ImageCollector::new(directory).collect().await?;
        log::info!(
            "Adding {} images from {}",
            images.len(),
            path_to_string_lossy(directory)
        );

        let count = images.len();
        for image in images {
            let media_type = image_media_type(&image.path)?;
            self.register(AssetCategory::Image, &image.name, media_type, image.data)?;
        }
        Ok(count)
    }

    pub fn add_font_bytes(&self, name: &str, data: Vec<u8>) -> Result<String> {
        let media_type = font_media_type(Path::new(name))?;
        self.register(AssetCategory::Font, name, media_type, data)
    }

    pub async fn add_font(&self, source: impl AsRef<Path>, name: &str) -> Result<String> {
        let source = source.as_ref();
        let media_type = font_media_type(source)?;
        let data = read_source(source).await?;
        self.register(AssetCategory::Font, name, media_type, data)
    }

    /// Registers an arbitrary file with an explicit media type.
    pub fn add_asset_bytes(&self, name: &str, media_type: &str, data: Vec<u8>) -> Result<String> {
        self.register(AssetCategory::Asset, name, media_type, data)
    }

    pub async fn add_asset(
        &self,
        source: impl AsRef<Path>,
        name: &str,
        media_type: &str,
    ) -> Result<String> {
        let data = read_source(source.as_ref()).await?;
        self.register(AssetCategory::Asset, name, media_type, data)
    }

    /// Sets the cover image from bytes. `file_name` only provides the extension.
    ///
    /// The cover is registered as the image `cover.<ext>` and a cover page is
    /// put at the start of the reading order. A book has at most one cover.
    pub fn set_cover_bytes(&self, file_name: &str, data: Vec<u8>) -> Result<String> {
        let extension = Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = format!("cover.{}", extension);
        let media_type = image_media_type(Path::new(&name))?;

        let mut state = self.state();
        if state.cover.is_some() {
            return Err(Error::collision("cover", name));
        }
        let mut asset = self.build_asset(&state, AssetCategory::Image, &name, media_type, data);
        asset.property = Some(Property::CoverImage);
        let href = asset.href.clone();
        let index = state.insert_asset(asset)?;
        state.cover = Some(index);
        log::debug!("Cover set to {}", state.assets[index].path);
        Ok(href)
    }

    pub async fn set_cover(&self, source: impl AsRef<Path>) -> Result<String> {
        let source = source.as_ref();
        let data = read_source(source).await?;
        self.set_cover_bytes(&path_to_string_lossy(source), data)
    }

    /// Replaces the built-in stylesheet.
    pub fn set_stylesheet_bytes(&self, css: Vec<u8>) {
        self.state().stylesheet = Some(css);
    }

    pub async fn set_stylesheet(&self, source: impl AsRef<Path>) -> Result<()> {
        let css = read_source(source.as_ref()).await?;
        self.set_stylesheet_bytes(css);
        Ok(())
    }

    pub fn lookup_image(&self, name: &str) -> Option<String> {
        self.lookup(AssetCategory::Image, name)
    }

    pub fn lookup_font(&self, name: &str) -> Option<String> {
        self.lookup(AssetCategory::Font, name)
    }

    pub fn lookup_asset(&self, name: &str) -> Option<String> {
        self.lookup(AssetCategory::Asset, name)
    }

    fn lookup(&self, category: AssetCategory, name: &str) -> Option<String> {
        let state = self.state();
        self.context(&state)
            .lookup(category, name)
            .map(str::to_string)
    }

    // --- Content ---

    /// Appends a section of already rendered markup, one string per content file.
    pub fn add_content(&self, tier: Tier, title: impl Into<String>, fragments: Vec<String>) {
        self.state().push_section(
            tier,
            Section {
                title: title.into(),
                format: ContentFormat::Html,
                fragments,
            },
        );
    }

    /// Appends a markdown section, split into content files on the page-break marker.
    ///
    /// Directives are expanded once here to detect page breaks they produce,
    /// and again per fragment when the book is assembled.
    pub fn add_markdown(&self, tier: Tier, title: impl Into<String>, source: &str) -> Result<()> {
        let mut state = self.state();
        let fragments = {
            let ctx = self.context(&state);
            self.renderer.split_fragments(source, &ctx, &self.registry)?
        };
        state.push_section(
            tier,
            Section {
                title: title.into(),
                format: ContentFormat::Markdown,
                fragments,
            },
        );
        Ok(())
    }

    pub fn add_introduction_md(&self, title: impl Into<String>, source: &str) -> Result<()> {
        self.add_markdown(Tier::FrontMatter, title, source)
    }

    pub fn add_introduction_html(&self, title: impl Into<String>, fragments: Vec<String>) {
        self.add_content(Tier::FrontMatter, title, fragments)
    }

    pub fn add_chapter_md(&self, title: impl Into<String>, source: &str) -> Result<()> {
        self.add_markdown(Tier::Body, title, source)
    }

    pub fn add_chapter_html(&self, title: impl Into<String>, fragments: Vec<String>) {
        self.add_content(Tier::Body, title, fragments)
    }

    pub fn add_postscript_md(&self, title: impl Into<String>, source: &str) -> Result<()> {
        self.add_markdown(Tier::BackMatter, title, source)
    }

    pub fn add_postscript_html(&self, title: impl Into<String>, fragments: Vec<String>) {
        self.add_content(Tier::BackMatter, title, fragments)
    }

    /// Sections of `tier`, in the order they were added.
    pub fn sections(&self, tier: Tier) -> Vec<Section> {
        self.state().sections[tier.index()].clone()
    }

    /// Replaces one of the built-in templates for this book.
    pub fn override_template(&self, name: &str, source: impl Into<String>) -> Result<()> {
        self.state().templates.set(name, source)
    }

    // --- Output ---

    /// Builds the package without writing it.
    ///
    /// The book is left unchanged, so assembling again without further
    /// changes yields an identical package.
    pub fn assemble(&self) -> Result<Package> {
        let state = self.state();
        let ctx = self.context(&state);
        let package = manifest::assemble(
            &ctx,
            &AssemblyOptions {
                renderer: &self.renderer,
                registry: &self.registry,
                legacy_ncx: self.legacy_ncx,
                compress_entries: self.compress_entries,
            },
        )?;
        log::info!(
            "Assembled '{}' with {} manifest entries",
            state.metadata.title,
            package.manifest().len()
        );
        Ok(package)
    }

    /// Assembles the book and writes it as a ZIP archive into `writer`.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        self.assemble()?.write_to(writer)
    }

    /// Assembles the book and writes it to `dest`.
    ///
    /// Nothing is created at `dest` unless the whole package was written.
    pub async fn write(&self, dest: impl AsRef<Path>) -> Result<()> {
        let package = self.assemble()?;
        let dest = dest.as_ref().to_path_buf();
        spawn_blocking(move || package.persist(&dest)).await??;
        Ok(())
    }
}

async fn read_source(source: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(source)
        .await
        .map_err(|e| Error::SourceRetrieval {
            origin: path_to_string_lossy(source),
            error: e,
        })
}

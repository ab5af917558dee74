//! Chaptering and manifest building.
//!
//! Walks the book model once, in reading order, and turns it into the flat list
//! of container entries: numbered fragment files, the navigation documents and
//! the package document that lists all of them.

use std::collections::HashSet;

use crate::book::DocumentContext;
use crate::directive::DirectiveRegistry;
use crate::error::{Error, Result};
use crate::markdown::MarkdownRenderer;
use crate::package::Package;
use crate::package::templates::{self, ChapterContext, CoverContext, PackageContext, TemplateSet};
use crate::types::{
    ChapterRecord, ContentFormat, MEDIA_TYPE_CSS, MEDIA_TYPE_NCX, MEDIA_TYPE_OPF,
    MEDIA_TYPE_XHTML, ManifestEntry, Property, SpineRef, Tier,
};

const COVER_PAGE: &str = "cover.xhtml";
const NAV_DOCUMENT: &str = "nav.xhtml";
const NCX_DOCUMENT: &str = "toc.ncx";
const CUSTOM_STYLESHEET: &str = "stylesheet.css";

/// Accumulates manifest entries and rejects duplicate ids or paths.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    entries: Vec<ManifestEntry>,
    data: Vec<Vec<u8>>,
    ids: HashSet<String>,
    paths: HashSet<String>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry with its bytes.
    pub fn push(&mut self, entry: ManifestEntry, data: Vec<u8>) -> Result<()> {
        if self.ids.contains(&entry.id) {
            return Err(Error::collision("manifest id", entry.id));
        }
        if self.paths.contains(&entry.path) {
            return Err(Error::collision("manifest path", entry.path));
        }
        self.ids.insert(entry.id.clone());
        self.paths.insert(entry.path.clone());
        self.entries.push(entry);
        self.data.push(data);
        Ok(())
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry(id: &str, path: String, media_type: &str, properties: Option<Property>) -> ManifestEntry {
    ManifestEntry {
        id: id.to_string(),
        path,
        media_type: media_type.to_string(),
        properties,
    }
}

/// Settings of one assembly run that are not part of the book model.
pub(crate) struct AssemblyOptions<'a> {
    pub renderer: &'a MarkdownRenderer,
    pub registry: &'a DirectiveRegistry,
    pub legacy_ncx: bool,
    pub compress_entries: bool,
}

/// Builds the complete package of the book behind `ctx`.
///
/// The model is only read. Any failure aborts the whole run.
pub(crate) fn assemble(
    ctx: &DocumentContext<'_>,
    options: &AssemblyOptions<'_>,
) -> Result<Package> {
    let state = ctx.state;
    let layout = ctx.layout;
    let templates: &TemplateSet = &state.templates;
    let metadata = &state.metadata;

    let mut manifest = ManifestBuilder::new();
    let mut spine = Vec::new();
    let mut chapters = Vec::new();

    // Stylesheet
    let stylesheet_path = match &state.stylesheet {
        Some(css) => {
            let path = layout.entry(CUSTOM_STYLESHEET);
            manifest.push(
                entry(CUSTOM_STYLESHEET, path.clone(), MEDIA_TYPE_CSS, None),
                css.clone(),
            )?;
            path
        }
        None => {
            let css = templates.retrieve(templates::DEFAULT_CSS)?;
            let path = layout.entry(templates::DEFAULT_CSS);
            manifest.push(
                entry(templates::DEFAULT_CSS, path.clone(), MEDIA_TYPE_CSS, None),
                css.as_bytes().to_vec(),
            )?;
            path
        }
    };
    let stylesheet = layout.href_from_text(&stylesheet_path);

    for asset in &state.assets {
        manifest.push(
            entry(&asset.id, asset.path.clone(), &asset.media_type, asset.property),
            asset.data.clone(),
        )?;
    }

    // Cover page
    let cover = state.cover.map(|index| &state.assets[index]);
    let cover_page = match cover {
        Some(asset) => {
            let path = layout.text_entry(COVER_PAGE);
            let page = templates.render(
                templates::COVER,
                &CoverContext {
                    title: &metadata.title,
                    language: &metadata.language,
                    stylesheet: &stylesheet,
                    cover_image: &asset.href,
                },
            )?;
            manifest.push(
                entry("cover-page", path.clone(), MEDIA_TYPE_XHTML, None),
                page.into_bytes(),
            )?;
            spine.push(SpineRef {
                idref: "cover-page".to_string(),
            });
            Some(path)
        }
        None => None,
    };

    // Sections, one chapter number per section across all tiers
    let mut chapter_no = 0usize;
    for tier in Tier::ALL {
        for section in &state.sections[tier.index()] {
            chapter_no += 1;
            let mut first_path = None;

            for (i, fragment) in section.fragments.iter().enumerate() {
                let file_name = format!("chapter{:03}-{}.xhtml", chapter_no, i);
                let path = layout.text_entry(&file_name);

                let content = match section.format {
                    ContentFormat::Markdown => {
                        options.renderer.render_html(fragment, ctx, options.registry)?
                    }
                    ContentFormat::Html => fragment.clone(),
                };
                let page = templates.render(
                    templates::CHAPTER,
                    &ChapterContext {
                        book_title: &metadata.title,
                        title: &section.title,
                        language: &metadata.language,
                        stylesheet: &stylesheet,
                        id: &file_name,
                        kind: tier.kind(),
                        header: i == 0,
                        content: &content,
                    },
                )?;

                manifest.push(
                    entry(&file_name, path.clone(), MEDIA_TYPE_XHTML, None),
                    page.into_bytes(),
                )?;
                spine.push(SpineRef { idref: file_name });
                first_path.get_or_insert(path);
            }

            let path = first_path.unwrap_or_default();
            chapters.push(ChapterRecord {
                nav_point: format!("navPoint-{}", chapter_no),
                id: chapter_no,
                title: section.title.clone(),
                href: layout.href_from_text(&path),
                path,
                kind: tier,
            });
        }
    }
    log::debug!(
        "Laid out {} sections in {} content documents",
        chapters.len(),
        spine.len()
    );

    let release_date = metadata
        .release_date
        .map(|date| date.format("%Y-%m-%d").to_string());
    let current_date = state.current_date.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let package_path = layout.package_document();

    // Navigation documents
    let nav_ctx = PackageContext {
        title: &metadata.title,
        author: metadata.author.as_deref(),
        publisher: metadata.publisher.as_deref(),
        description: metadata.description.as_deref(),
        language: &metadata.language,
        identifier: ctx.identifier,
        release_date,
        current_date,
        stylesheet,
        cover_id: cover.map(|asset| asset.id.as_str()),
        cover_page: cover_page.as_deref(),
        root: layout.root_prefix(),
        text_dir: format!("{}/", layout.text_dir()),
        package_path: package_path.clone(),
        legacy_ncx: options.legacy_ncx,
        files: &[],
        spine: &spine,
        chapters: &chapters,
    };
    let nav = templates.render(templates::NAV, &nav_ctx)?;
    manifest.push(
        entry(
            "nav",
            layout.text_entry(NAV_DOCUMENT),
            MEDIA_TYPE_XHTML,
            Some(Property::Nav),
        ),
        nav.into_bytes(),
    )?;
    if options.legacy_ncx {
        let ncx = templates.render(templates::NCX, &nav_ctx)?;
        manifest.push(
            entry("ncx", layout.entry(NCX_DOCUMENT), MEDIA_TYPE_NCX, None),
            ncx.into_bytes(),
        )?;
    }

    // Package document. It lists every entry pushed so far, not itself.
    let package_ctx = PackageContext {
        files: manifest.entries(),
        ..nav_ctx
    };
    let opf = templates.render(templates::PACKAGE, &package_ctx)?;
    let container = templates.render(templates::CONTAINER, &package_ctx)?;
    manifest.push(
        entry("package", package_path, MEDIA_TYPE_OPF, None),
        opf.into_bytes(),
    )?;

    let ManifestBuilder { entries, data, .. } = manifest;
    Ok(Package {
        manifest: entries,
        spine,
        chapters,
        container: container.into_bytes(),
        data,
        compress_entries: options.compress_entries,
    })
}

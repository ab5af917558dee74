//! Built-in package templates and their rendering.
//!
//! Every generated text entry of the container (package document, navigation,
//! content documents, container description, default stylesheet) comes from a
//! named template. A book may override any of them before it is assembled.

use std::collections::HashMap;

use minijinja::{AutoEscape, Environment};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{ChapterRecord, ManifestEntry, SpineRef};

pub const CONTAINER: &str = "container.xml";
pub const PACKAGE: &str = "content.opf";
pub const NAV: &str = "nav.xhtml";
pub const NCX: &str = "toc.ncx";
pub const CHAPTER: &str = "chapter.xhtml";
pub const COVER: &str = "cover.xhtml";
pub const DEFAULT_CSS: &str = "default.css";

const BUILTIN: [(&str, &str); 7] = [
    (CONTAINER, include_str!("../../templates/container.xml")),
    (PACKAGE, include_str!("../../templates/content.opf")),
    (NAV, include_str!("../../templates/nav.xhtml")),
    (NCX, include_str!("../../templates/toc.ncx")),
    (CHAPTER, include_str!("../../templates/chapter.xhtml")),
    (COVER, include_str!("../../templates/cover.xhtml")),
    (DEFAULT_CSS, include_str!("../../templates/default.css")),
];

/// The templates of one book: the built-in set plus per-book overrides.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    overrides: HashMap<String, String>,
}

impl TemplateSet {
    /// Replaces the template `name`. Names outside the built-in set are rejected.
    pub fn set(&mut self, name: &str, source: impl Into<String>) -> Result<()> {
        if !BUILTIN.iter().any(|(builtin, _)| *builtin == name) {
            return Err(Error::TemplateNotFound(name.to_string()));
        }
        log::debug!("Overriding template '{}'", name);
        self.overrides.insert(name.to_string(), source.into());
        Ok(())
    }

    /// Raw source of the template `name`, override first.
    pub fn retrieve(&self, name: &str) -> Result<&str> {
        if let Some(source) = self.overrides.get(name) {
            return Ok(source);
        }
        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, source)| *source)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))
    }

    /// Renders the template `name` with `ctx`.
    ///
    /// Output is not auto-escaped; templates escape text fields with `|xml` and
    /// splice already rendered markup verbatim.
    pub fn render<S: Serialize>(&self, name: &str, ctx: &S) -> Result<String> {
        let source = self.retrieve(name)?;

        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        env.add_filter("clean", clean);
        env.add_filter("xml", xml);

        let template = env
            .template_from_str(source)
            .map_err(|error| Error::TemplateCompilation {
                template: name.to_string(),
                error,
            })?;
        template.render(ctx).map_err(|error| Error::TemplateExecution {
            template: name.to_string(),
            error,
        })
    }
}

/// Template filter trimming `prefix` from the front of `value`.
fn clean(value: String, prefix: String) -> String {
    match value.strip_prefix(&prefix) {
        Some(rest) => rest.to_string(),
        None => value,
    }
}

/// Template filter escaping text for XML content and attribute values.
fn xml(value: String) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Fields shared by the package document, the navigation documents and the
/// container description.
#[derive(Debug, Clone, Serialize)]
pub struct PackageContext<'a> {
    pub title: &'a str,
    pub author: Option<&'a str>,
    pub publisher: Option<&'a str>,
    pub description: Option<&'a str>,
    pub language: &'a str,
    pub identifier: &'a str,
    pub release_date: Option<String>,
    pub current_date: String,
    /// Stylesheet href as seen from the content documents.
    pub stylesheet: String,
    pub cover_id: Option<&'a str>,
    pub cover_page: Option<&'a str>,
    /// Content root prefix, with trailing slash (empty for a flat layout).
    pub root: String,
    /// Content documents directory, with trailing slash.
    pub text_dir: String,
    pub package_path: String,
    pub legacy_ncx: bool,
    pub files: &'a [ManifestEntry],
    pub spine: &'a [SpineRef],
    pub chapters: &'a [ChapterRecord],
}

/// Fields of one content document.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterContext<'a> {
    pub book_title: &'a str,
    pub title: &'a str,
    pub language: &'a str,
    pub stylesheet: &'a str,
    /// File name of the fragment, e.g. `chapter001-0.xhtml`.
    pub id: &'a str,
    pub kind: &'a str,
    /// Whether the section title is printed on top of this fragment.
    pub header: bool,
    pub content: &'a str,
}

/// Fields of the cover page.
#[derive(Debug, Clone, Serialize)]
pub struct CoverContext<'a> {
    pub title: &'a str,
    pub language: &'a str,
    pub stylesheet: &'a str,
    pub cover_image: &'a str,
}

//! Markdown rendering with directive expansion and page-break splitting.
//!
//! Directive tokens are lifted out of the source before `pulldown-cmark` sees
//! it. Each complete token is swapped for an inert placeholder, so delimiters
//! inside attribute values never pair with markup around the token. After
//! parsing, placeholders in inline text are replaced by the handler output,
//! while code and raw HTML get the original token text back.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};

use crate::book::DocumentContext;
use crate::directive::DirectiveRegistry;
use crate::directive::parser::{Directive, TRIGGER, parse_directive};
use crate::error::{Error, Result};

/// Parser extensions of the markdown engine.
pub use pulldown_cmark::Options as MarkdownOptions;

/// Literal marker that splits one section into several content files.
pub const PAGE_BREAK: &str = "<!-- PAGE BREAK -->";

/// Converts markdown sections into XHTML fragments.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
    hard_wraps: bool,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MarkdownRenderer {
    /// Creates a renderer with tables, strikethrough and definition lists enabled.
    ///
    /// With `hard_wraps`, every soft line break inside a paragraph becomes `<br />`.
    pub fn new(hard_wraps: bool) -> Self {
        Self::with_options(hard_wraps, Options::empty())
    }

    /// Like [`MarkdownRenderer::new`], with `extra` parser extensions such as
    /// footnotes or task lists enabled on top of the defaults.
    pub fn with_options(hard_wraps: bool, extra: Options) -> Self {
        let mut options = Self::default_options();
        options.insert(extra);
        Self {
            options,
            hard_wraps,
        }
    }

    pub fn default_options() -> Options {
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_DEFINITION_LIST
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Renders `source` to XHTML, expanding directives against `registry`.
    ///
    /// Unknown directives render to an HTML comment naming them. A handler error
    /// aborts the whole render with [`Error::DirectiveExpansion`].
    pub fn render_html(
        &self,
        source: &str,
        ctx: &DocumentContext<'_>,
        registry: &DirectiveRegistry,
    ) -> Result<String> {
        let tokens = TokenizedSource::new(source);
        let events = self.expand(&tokens, ctx, registry)?;
        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        Ok(out)
    }

    /// Splits one section's markdown into its page fragments.
    ///
    /// The source is rendered once to find out whether it produces a page break.
    /// Without one the trimmed source is returned as the only fragment. Otherwise
    /// the raw source, never the rendered output, is cut on [`PAGE_BREAK`], so
    /// directive tokens and unfinished markup are kept intact for the later
    /// per-fragment render.
    pub fn split_fragments(
        &self,
        source: &str,
        ctx: &DocumentContext<'_>,
        registry: &DirectiveRegistry,
    ) -> Result<Vec<String>> {
        let rendered = self.render_html(source, ctx, registry)?;
        if !rendered.contains(PAGE_BREAK) {
            return Ok(vec![source.trim().to_string()]);
        }

        Ok(source
            .split(PAGE_BREAK)
            .map(|part| {
                let part = part.trim();
                let part = part.strip_suffix("<p>").unwrap_or(part);
                let part = part.strip_prefix("</p>").unwrap_or(part);
                part.to_string()
            })
            .collect())
    }

    fn expand<'a>(
        &self,
        tokens: &'a TokenizedSource<'_>,
        ctx: &DocumentContext<'_>,
        registry: &DirectiveRegistry,
    ) -> Result<Vec<Event<'a>>> {
        let mut events = Vec::new();
        let mut code_depth = 0usize;

        for event in Parser::new_ext(&tokens.text, self.options) {
            match event {
                Event::Start(Tag::CodeBlock(_)) => {
                    code_depth += 1;
                    events.push(event);
                }
                Event::End(TagEnd::CodeBlock) => {
                    code_depth = code_depth.saturating_sub(1);
                    events.push(event);
                }
                Event::SoftBreak if self.hard_wraps && code_depth == 0 => {
                    events.push(Event::HardBreak);
                }
                Event::Text(text) if code_depth == 0 && tokens.has_placeholder(&text) => {
                    self.expand_text(&text, tokens, ctx, registry, &mut events)?;
                }
                Event::Text(text) => events.push(Event::Text(tokens.restore(text))),
                Event::Code(code) => events.push(Event::Code(tokens.restore(code))),
                Event::Html(raw) => events.push(Event::Html(tokens.restore(raw))),
                Event::InlineHtml(raw) => events.push(Event::InlineHtml(tokens.restore(raw))),
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url: tokens.restore(dest_url),
                    title: tokens.restore(title),
                    id,
                })),
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url: tokens.restore(dest_url),
                    title: tokens.restore(title),
                    id,
                })),
                event => events.push(event),
            }
        }
        Ok(events)
    }

    /// Emits `text`, replacing every placeholder with its handler output.
    fn expand_text<'a>(
        &self,
        text: &str,
        tokens: &TokenizedSource<'_>,
        ctx: &DocumentContext<'_>,
        registry: &DirectiveRegistry,
        events: &mut Vec<Event<'a>>,
    ) -> Result<()> {
        let mut rest = text;
        while let Some((before, token, after)) = tokens.next_placeholder(rest) {
            push_text(events, before);
            let expanded = self.resolve(&token.directive, ctx, registry, tokens.source)?;
            events.push(Event::InlineHtml(CowStr::from(expanded)));
            rest = after;
        }
        push_text(events, rest);
        Ok(())
    }

    fn resolve(
        &self,
        directive: &Directive,
        ctx: &DocumentContext<'_>,
        registry: &DirectiveRegistry,
        source: &str,
    ) -> Result<String> {
        let Some(handler) = registry.resolve(&directive.name) else {
            log::warn!("Unknown directive '{}' left in output", directive.name);
            return Ok(format!("<!-- unknown directive: {} -->", directive.name));
        };

        log::debug!("Expanding directive '{}'", directive.name);
        handler
            .handle(ctx, &directive.name, &directive.attributes, source)
            .map_err(|error| Error::DirectiveExpansion {
                name: directive.name.clone(),
                error,
            })
    }
}

fn push_text(events: &mut Vec<Event<'_>>, text: &str) {
    if !text.is_empty() {
        events.push(Event::Text(CowStr::from(text.to_string())));
    }
}

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

/// One directive token lifted out of the source.
#[derive(Debug)]
struct Token<'s> {
    raw: &'s str,
    directive: Directive,
}

/// Markdown source with every complete directive token replaced by a
/// placeholder of private-use characters around the token's index.
#[derive(Debug)]
struct TokenizedSource<'s> {
    source: &'s str,
    text: String,
    tokens: Vec<Token<'s>>,
}

impl<'s> TokenizedSource<'s> {
    fn new(source: &'s str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut tokens = Vec::new();
        let mut cursor = 0;

        while let Some(found) = source[cursor..].find(TRIGGER) {
            let offset = cursor + found;
            match parse_directive(&source[offset..]) {
                Some((directive, len)) => {
                    text.push_str(&source[cursor..offset]);
                    text.push(PLACEHOLDER_OPEN);
                    text.push_str(&tokens.len().to_string());
                    text.push(PLACEHOLDER_CLOSE);
                    tokens.push(Token {
                        raw: &source[offset..offset + len],
                        directive,
                    });
                    cursor = offset + len;
                }
                None => {
                    // Not a complete token; keep the trigger as plain text.
                    let next = offset + TRIGGER.len();
                    text.push_str(&source[cursor..next]);
                    cursor = next;
                }
            }
        }
        text.push_str(&source[cursor..]);

        Self {
            source,
            text,
            tokens,
        }
    }

    fn has_placeholder(&self, text: &str) -> bool {
        !self.tokens.is_empty() && text.contains(PLACEHOLDER_OPEN)
    }

    /// Splits `text` around its first well-formed placeholder.
    fn next_placeholder<'t>(&self, text: &'t str) -> Option<(&'t str, &Token<'s>, &'t str)> {
        let mut from = 0;
        while let Some(found) = text[from..].find(PLACEHOLDER_OPEN) {
            let open = from + found;
            let body_start = open + PLACEHOLDER_OPEN.len_utf8();
            let token = text[body_start..].find(PLACEHOLDER_CLOSE).and_then(|len| {
                let index: usize = text[body_start..body_start + len].parse().ok()?;
                let after = body_start + len + PLACEHOLDER_CLOSE.len_utf8();
                self.tokens.get(index).map(|token| (token, after))
            });
            if let Some((token, after)) = token {
                return Some((&text[..open], token, &text[after..]));
            }
            from = body_start;
        }
        None
    }

    /// Puts the original token text back into `text`.
    fn restore<'a>(&self, text: CowStr<'a>) -> CowStr<'a> {
        if !self.has_placeholder(&text) {
            return text;
        }
        let mut out = String::with_capacity(text.len());
        let mut rest: &str = &text;
        while let Some((before, token, after)) = self.next_placeholder(rest) {
            out.push_str(before);
            out.push_str(token.raw);
            rest = after;
        }
        out.push_str(rest);
        CowStr::from(out)
    }
}

//! Directive token parsing.
//!
//! Recognises `{{< name attr=val ... >}}` on a single line and parses the
//! attribute list with the HTML attribute grammar of `quick-xml`.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use quick_xml::events::BytesStart;
use regex::Regex;

/// Byte sequence that triggers directive recognition.
pub const TRIGGER: &str = "{{<";

lazy_static! {
    /// A whole directive token. The body is matched lazily so that two
    /// directives on one line stay two directives.
    static ref DIRECTIVE_TOKEN: Regex = Regex::new(r"^\{\{<(.+?)>\}\}").unwrap();
}

/// Attribute name to raw value mapping of one directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveAttributes(BTreeMap<String, String>);

impl DirectiveAttributes {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// True for attributes present without a value, like `controls`.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn insert(&mut self, key: String, value: String) {
        self.0.insert(key, value);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DirectiveAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A parsed directive node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub attributes: DirectiveAttributes,
}

/// Parses a directive token at the very start of `line`.
///
/// Only the current line is considered. Returns the directive and the number of
/// bytes it occupies, or `None` when `line` does not start with a complete token.
pub fn parse_directive(line: &str) -> Option<(Directive, usize)> {
    let line = line.split('\n').next().unwrap_or_default();
    let caps = DIRECTIVE_TOKEN.captures(line)?;
    let whole = caps.get(0)?;
    let body = caps.get(1)?.as_str().trim();

    let (name, attributes) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, parse_attributes(rest)),
        None => (body, DirectiveAttributes::default()),
    };
    if name.is_empty() {
        return None;
    }

    Some((
        Directive {
            name: name.to_string(),
            attributes,
        },
        whole.end(),
    ))
}

/// Parses `attrs` as if it were the attribute list of an HTML element.
///
/// Quoted, unquoted and valueless attributes are accepted. Malformed pieces are
/// skipped rather than reported, matching how browsers treat attribute soup.
pub fn parse_attributes(attrs: &str) -> DirectiveAttributes {
    let mut parsed = DirectiveAttributes::default();
    let attrs = attrs.trim();
    if attrs.is_empty() {
        return parsed;
    }

    let element = BytesStart::from_content(format!("div {}", attrs), 3);
    for attr in element.html_attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let value = attr.unescape_value().map_or_else(
            |_| String::from_utf8_lossy(&attr.value).to_string(),
            |v| v.to_string(),
        );
        parsed.insert(key, value);
    }
    parsed
}

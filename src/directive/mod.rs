//! Directive registry and handler interface.
//!
//! A directive is an inline token `{{< name attr=val ... >}}` inside markdown
//! content. When a section is rendered, every directive is resolved by name
//! against a [`DirectiveRegistry`] and replaced by whatever its handler returns.
//!
//! Every book resolves against the process-wide registry returned by
//! [`DirectiveRegistry::global`] unless it was configured with its own through
//! [`BookConfigBuilder::registry`](crate::book::BookConfigBuilder::registry).
//! Populate the global registry during setup, before any rendering starts.
//!
//! ```rust
//! use quire::directive::{register_directive, DirectiveAttributes};
//! use quire::book::DocumentContext;
//! use quire::error::HandlerError;
//!
//! register_directive(
//!     "figure",
//!     |ctx: &DocumentContext<'_>,
//!      _name: &str,
//!      attrs: &DirectiveAttributes,
//!      _source: &str|
//!      -> Result<String, HandlerError> {
//!         let src = attrs.get("src").ok_or("figure needs a src")?;
//!         let href = ctx.lookup_image(src).ok_or("unknown image")?;
//!         Ok(format!("<img src=\"{}\" alt=\"\" />", href))
//!     },
//! );
//! ```

pub mod parser;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;

use crate::book::DocumentContext;
use crate::error::HandlerError;

pub use parser::{Directive, DirectiveAttributes, parse_attributes, parse_directive};

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<DirectiveRegistry> = Arc::new(DirectiveRegistry::new());
}

/// Expands one directive into replacement markup.
pub trait DirectiveHandler: Send + Sync {
    /// Produces the markup spliced in place of the directive.
    ///
    /// `source` is the complete markdown input of the render call, not just the
    /// directive token; handlers that need their own slice must locate it.
    fn handle(
        &self,
        ctx: &DocumentContext<'_>,
        name: &str,
        attributes: &DirectiveAttributes,
        source: &str,
    ) -> Result<String, HandlerError>;
}

impl<F> DirectiveHandler for F
where
    F: Fn(&DocumentContext<'_>, &str, &DirectiveAttributes, &str) -> Result<String, HandlerError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        ctx: &DocumentContext<'_>,
        name: &str,
        attributes: &DirectiveAttributes,
        source: &str,
    ) -> Result<String, HandlerError> {
        self(ctx, name, attributes, source)
    }
}

/// Name to handler table.
///
/// The last registration for a name wins.
#[derive(Default)]
pub struct DirectiveRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn DirectiveHandler>>>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by books without their own.
    pub fn global() -> Arc<DirectiveRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn register<H>(&self, name: impl Into<String>, handler: H)
    where
        H: DirectiveHandler + 'static,
    {
        let name = name.into();
        log::debug!("Registering directive '{}'", name);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(handler));
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn DirectiveHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered directive names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("directives", &self.names())
            .finish()
    }
}

/// Registers `handler` under `name` in the process-wide registry.
pub fn register_directive<H>(name: impl Into<String>, handler: H)
where
    H: DirectiveHandler + 'static,
{
    GLOBAL_REGISTRY.register(name, handler);
}

//! Resource hook handed to the framework compiler.
//!
//! The compiler calls back into [`ResourceHost`] when a component references a
//! stylesheet or template. Reads are strict, style transforms are lenient: a
//! failing stylesheet transform degrades to empty CSS and compilation goes on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use futures::future::BoxFuture;
use futures::FutureExt;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{BuildError, Result};
use crate::paths::normalize;

lazy_static! {
    static ref TS_SUFFIX_RE: Regex = Regex::new(r"\.ts$").unwrap();
}

/// External stylesheet pipeline (preprocessor, PostCSS, ...).
pub trait StylesheetTransform: Send + Sync {
    /// `id` is the synthetic module id, suffixed with `?direct`.
    fn transform<'a>(&'a self, code: &'a str, id: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Returns stylesheets unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughStylesheet;

impl StylesheetTransform for PassthroughStylesheet {
    fn transform<'a>(&'a self, code: &'a str, _id: &'a str) -> BoxFuture<'a, Result<String>> {
        async move { Ok(code.to_string()) }.boxed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Style,
    Template,
}

#[derive(Debug, Clone)]
pub struct ResourceContext {
    pub kind: ResourceKind,
    /// Only set for external resources (`styleUrls`, `templateUrl`).
    pub resource_file: Option<PathBuf>,
    pub containing_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContent {
    pub content: String,
}

pub struct ResourceHost {
    inline_styles_extension: Option<String>,
    stylesheets: Arc<dyn StylesheetTransform>,
}

impl std::fmt::Debug for ResourceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHost")
            .field("inline_styles_extension", &self.inline_styles_extension)
            .finish_non_exhaustive()
    }
}

impl ResourceHost {
    pub fn new(
        inline_styles_extension: Option<String>,
        stylesheets: Arc<dyn StylesheetTransform>,
    ) -> Self {
        Self {
            inline_styles_extension: inline_styles_extension.filter(|ext| !ext.is_empty()),
            stylesheets,
        }
    }

    /// Host with style transforms disabled.
    pub fn disabled() -> Self {
        Self::new(None, Arc::new(PassthroughStylesheet))
    }

    pub async fn read_resource(&self, file_name: &Path) -> Result<String> {
        let path = normalize(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| BuildError::ResourceNotFound { path })
    }

    /// Returns `None` for non-style resources or when inline styles are disabled.
    pub async fn transform_resource(
        &self,
        data: &str,
        context: &ResourceContext,
    ) -> Option<ResourceContent> {
        if context.kind != ResourceKind::Style {
            return None;
        }
        let extension = self.inline_styles_extension.as_deref()?;

        let id = format!("{}?direct", self.stylesheet_id(context, extension));
        let content = match self.stylesheets.transform(data, &id).await {
            Ok(css) => css,
            Err(e) => {
                tracing::error!("{}", e);
                String::new()
            }
        };

        Some(ResourceContent { content })
    }

    fn stylesheet_id(&self, context: &ResourceContext, extension: &str) -> String {
        match &context.resource_file {
            Some(file) => file.to_string_lossy().to_string(),
            None => {
                let containing = context.containing_file.to_string_lossy();
                TS_SUFFIX_RE
                    .replace(&containing, format!(".{}", extension).as_str())
                    .to_string()
            }
        }
    }
}

//! Filesystem route table generator.
//!
//! Every script under the pages directory becomes one route. The file's path
//! relative to the pages root, minus its extension, is the route key:
//!
//! | file                  | path          |
//! |-----------------------|---------------|
//! | `index.ts`            | `''`          |
//! | `about.ts`            | `'about'`     |
//! | `post/[id].ts`        | `'post/:id'`  |
//! | `blog/index.ts`       | `'blog'`      |
//! | `docs/[...slug].ts`   | `'docs/**'`   |
//!
//! The generated module imports each page's `routerMeta` export under an
//! alias numbered by scan position and spreads it into the route descriptor.

#[cfg(feature = "napi")]
use napi_derive::napi;

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use walkdir::WalkDir;

use crate::config::RoutingOptions;
use crate::error::{BuildError, Result};
use crate::instrument::escape_js_string;
use crate::paths::{absolutize_cwd, relative, to_slash};

/// Name of the per-page metadata export.
pub const META_EXPORT: &str = "routerMeta";

const PAGE_EXTENSIONS: [&str; 4] = ["ts", "tsx", "js", "jsx"];

lazy_static! {
    static ref CATCH_ALL_RE: Regex = Regex::new(r"\[\[?\.\.\.[^\]]*\]\]?").unwrap();
    static ref PARAM_RE: Regex = Regex::new(r"\[(.*?)\]").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCAN
// ═══════════════════════════════════════════════════════════════════════════════

/// One discovered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    /// `/`-prefixed key, e.g. `/post/[id]`.
    pub route_key: String,
    pub file: PathBuf,
}

fn is_page(path: &Path) -> bool {
    let name = path.to_string_lossy();
    if name.ends_with(".d.ts") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PAGE_EXTENSIONS.contains(&ext))
}

fn route_key(pages_dir: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(pages_dir).unwrap_or(file).with_extension("");
    let mut key = format!("/{}", to_slash(&rel));

    if key == "/index" {
        key = "/".to_string();
    } else if let Some(parent) = key.strip_suffix("/index") {
        key = parent.to_string();
    }
    key
}

/// Lists pages in scan order: at each level directories first, then files,
/// each sorted by name. A missing pages directory yields no pages.
pub fn scan_pages(pages_dir: &Path) -> Vec<PageFile> {
    if !pages_dir.exists() {
        tracing::warn!("pages directory {} does not exist", pages_dir.display());
        return Vec::new();
    }

    let walker = WalkDir::new(pages_dir).follow_links(true).sort_by(|a, b| {
        b.file_type()
            .is_dir()
            .cmp(&a.file_type().is_dir())
            .then_with(|| a.file_name().cmp(b.file_name()))
    });

    let mut seen = HashSet::new();
    let mut pages = Vec::new();
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_page(path) {
            continue;
        }

        let key = route_key(pages_dir, path);
        if !seen.insert(key.clone()) {
            tracing::warn!("duplicate route {} from {}, keeping the first", key, path.display());
            continue;
        }
        pages.push(PageFile {
            route_key: key,
            file: path.to_path_buf(),
        });
    }
    pages
}

/// `/post/[id]` → `post/:id`. Catch-all segments become `**`.
pub fn url_pattern(route_key: &str) -> String {
    let key = CATCH_ALL_RE.replace_all(route_key, "**");
    let key = PARAM_RE.replace_all(&key, ":$1");
    key.strip_prefix('/').unwrap_or(&key).to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// DESCRIPTORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub url_pattern: String,
    /// Specifier for the lazy component import, without extension.
    pub component_import: String,
    /// Specifier for the metadata import, with extension.
    pub meta_import: String,
    /// Local alias of the metadata import (`r0`, `r1`, ...).
    pub meta_binding: String,
    pub order: usize,
}

fn specifier(module_dir: &Path, file: &Path) -> String {
    let rel = to_slash(&relative(module_dir, file));
    if rel == ".." || rel.starts_with("../") {
        rel
    } else {
        format!("./{}", rel)
    }
}

pub fn build_descriptors(pages: &[PageFile], module_dir: &Path) -> Vec<RouteDescriptor> {
    pages
        .iter()
        .enumerate()
        .map(|(order, page)| RouteDescriptor {
            url_pattern: url_pattern(&page.route_key),
            component_import: specifier(module_dir, &page.file.with_extension("")),
            meta_import: specifier(module_dir, &page.file),
            meta_binding: format!("r{}", order),
            order,
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER
// ═══════════════════════════════════════════════════════════════════════════════

pub fn render_routes(descriptors: &[RouteDescriptor], redirect_to: Option<&str>) -> String {
    let mut out = String::new();

    for d in descriptors {
        let _ = writeln!(
            out,
            "import {{{} as {}}} from '{}';",
            META_EXPORT,
            d.meta_binding,
            escape_js_string(&d.meta_import)
        );
    }
    if !descriptors.is_empty() {
        out.push('\n');
    }

    out.push_str("export const routes = [\n");
    if let Some(target) = redirect_to {
        let _ = writeln!(
            out,
            "  {{ path: '', redirectTo: '{}', pathMatch: 'full' }},",
            escape_js_string(target)
        );
    }
    for d in descriptors {
        let _ = writeln!(
            out,
            "  {{ path: '{}', loadComponent: () => import('{}'), ...{} }},",
            escape_js_string(&d.url_pattern),
            escape_js_string(&d.component_import),
            d.meta_binding
        );
    }
    out.push_str("];\n");
    out
}

/// Scans `options.pages_path` and renders the module that replaces
/// `options.file_path`. Relative paths resolve against the working directory.
pub fn generate_routes(options: &RoutingOptions) -> Result<String> {
    let file_path = absolutize_cwd(&options.file_path);
    let pages_dir = absolutize_cwd(&options.pages_path);
    let module_dir = file_path.parent().ok_or_else(|| {
        BuildError::Setup(format!("routes file has no parent: {}", file_path.display()))
    })?;

    let pages = scan_pages(&pages_dir);
    let descriptors = build_descriptors(&pages, module_dir);
    tracing::debug!(
        "generated {} route(s) for {}",
        descriptors.len(),
        file_path.display()
    );

    let redirect = options.redirect_to.as_deref().filter(|r| !r.is_empty());
    Ok(render_routes(&descriptors, redirect))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTES MODULE INTERCEPTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Matches loads of the configured routes module and answers them with the
/// generated table.
#[derive(Debug, Clone)]
pub struct RoutesModule {
    filter: Regex,
    options: RoutingOptions,
}

impl RoutesModule {
    pub fn new(options: &RoutingOptions, cwd: &Path) -> Result<Self> {
        let options = options.resolve(cwd);
        let pattern = format!("(?i){}$", regex::escape(&to_slash(&options.file_path)));
        let filter = Regex::new(&pattern)
            .map_err(|e| BuildError::Setup(format!("Invalid routes filter: {}", e)))?;
        Ok(Self { filter, options })
    }

    pub fn filter(&self) -> &Regex {
        &self.filter
    }

    pub fn options(&self) -> &RoutingOptions {
        &self.options
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.filter.is_match(&to_slash(path))
    }

    pub fn generate(&self) -> Result<String> {
        generate_routes(&self.options)
    }
}

#[cfg(feature = "napi")]
#[napi]
pub fn generate_routes_native(options_json: String) -> napi::Result<String> {
    let options: RoutingOptions = serde_json::from_str(&options_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid routing options: {}", e)))?;
    generate_routes(&options).map_err(|e| napi::Error::from_reason(e.to_string()))
}

//! Configuration surface recognized by the loader plugins.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};
use crate::paths::absolutize;

pub const DEFAULT_ROUTES_FILE: &str = "src/routes.ng.ts";
pub const DEFAULT_PAGES_DIR: &str = "src/pages";

// ═══════════════════════════════════════════════════════════════════════════════
// LOADER OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderOptions {
    /// Suffix used to build synthetic identifiers for inline styles.
    /// `None` disables inline style transforms.
    #[serde(default)]
    pub inline_styles_extension: Option<String>,
    #[serde(default)]
    pub routing: RoutingOptions,
}

impl LoaderOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BuildError::Setup(format!("Invalid options: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingOptions {
    #[serde(default)]
    pub redirect_to: Option<String>,
    /// Module whose load is replaced by the generated route table.
    #[serde(default = "default_routes_file")]
    pub file_path: PathBuf,
    /// Directory scanned for pages.
    #[serde(default = "default_pages_dir")]
    pub pages_path: PathBuf,
}

fn default_routes_file() -> PathBuf {
    PathBuf::from(DEFAULT_ROUTES_FILE)
}

fn default_pages_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PAGES_DIR)
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            redirect_to: None,
            file_path: default_routes_file(),
            pages_path: default_pages_dir(),
        }
    }
}

impl RoutingOptions {
    /// Returns a copy with `file_path` and `pages_path` made absolute.
    pub fn resolve(&self, cwd: &Path) -> RoutingOptions {
        RoutingOptions {
            redirect_to: self.redirect_to.clone(),
            file_path: absolutize(&self.file_path, cwd),
            pages_path: absolutize(&self.pages_path, cwd),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptTarget {
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    EsNext,
}

/// Options handed to the framework compiler. Fixed for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    pub strict: bool,
    pub strict_templates: bool,
    pub target: ScriptTarget,
    pub module: ModuleKind,
    pub annotate_for_closure_compiler: bool,
    pub compilation_mode: String,
    pub inline_source_map: bool,
    pub incremental: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            strict: true,
            strict_templates: true,
            target: ScriptTarget::Latest,
            module: ModuleKind::EsNext,
            annotate_for_closure_compiler: true,
            compilation_mode: "experimental-local".to_string(),
            inline_source_map: true,
            incremental: true,
        }
    }
}

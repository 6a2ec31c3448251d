//! Reference compiler backed by oxc.
//!
//! Does no template compilation: analysis reads and syntax-checks every root
//! file and resolves component resources through the [`ResourceHost`], emit
//! inlines them and strips TypeScript. Enough to drive the loader end to end
//! when the framework compiler runs elsewhere (JIT builds, tests).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use super::resources::{resolve, scan_file, splice, ResolvedResources};
use super::{CompilationProgram, EmitTransformers, EmittedArtifact, FrameworkCompiler};
use crate::classify::source_type_for;
use crate::config::CompilerOptions;
use crate::error::{BuildError, Result};
use crate::resource::ResourceHost;
use crate::transpile::{is_empty_module, transpile_with};
use crate::unit::content_hash;

#[derive(Debug, Default, Clone, Copy)]
pub struct TranspileCompiler;

impl FrameworkCompiler for TranspileCompiler {
    type Program = TranspileProgram;

    fn create_program(
        &self,
        root_files: &[PathBuf],
        options: &CompilerOptions,
        resources: Arc<ResourceHost>,
    ) -> Result<TranspileProgram> {
        Ok(TranspileProgram {
            root_files: root_files.to_vec(),
            options: options.clone(),
            resources,
            sources: HashMap::new(),
            components: HashMap::new(),
            missing: HashMap::new(),
            diagnostics: 0,
        })
    }
}

#[derive(Debug)]
pub struct TranspileProgram {
    root_files: Vec<PathBuf>,
    options: CompilerOptions,
    resources: Arc<ResourceHost>,
    sources: HashMap<PathBuf, String>,
    components: HashMap<PathBuf, ResolvedResources>,
    /// Roots whose component resources could not be read, with the first
    /// missing file.
    missing: HashMap<PathBuf, PathBuf>,
    diagnostics: usize,
}

impl TranspileProgram {
    pub fn root_files(&self) -> &[PathBuf] {
        &self.root_files
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn resources(&self) -> &Arc<ResourceHost> {
        &self.resources
    }

    /// Syntax errors found by the last analysis.
    pub fn diagnostics(&self) -> usize {
        self.diagnostics
    }
}

fn is_declaration_file(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts")
}

fn output_file_name(path: &Path) -> String {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some("mts") | Some("mjs") => "mjs",
        Some("cts") | Some("cjs") => "cjs",
        _ => "js",
    };
    path.with_extension(ext).to_string_lossy().to_string()
}

impl CompilationProgram for TranspileProgram {
    async fn analyze(&mut self) -> Result<()> {
        let mut loaded = Vec::with_capacity(self.root_files.len());
        for path in &self.root_files {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => loaded.push((path.clone(), text)),
                Err(e) => tracing::warn!("Failed to read root file {}: {}", path.display(), e),
            }
        }

        let checked = tokio::task::spawn_blocking(move || {
            loaded
                .into_par_iter()
                .map(|(path, text)| {
                    let scan = scan_file(&path, &text);
                    (path, text, scan)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| BuildError::Setup(format!("analysis task failed: {}", e)))?;

        self.sources.clear();
        self.components.clear();
        self.missing.clear();
        self.diagnostics = 0;
        for (path, text, scan) in checked {
            if scan.syntax_errors > 0 {
                tracing::warn!("{} syntax error(s) in {}", scan.syntax_errors, path.display());
            }
            self.diagnostics += scan.syntax_errors;

            if !scan.properties.is_empty() {
                match resolve(&self.resources, &path, &scan.properties).await {
                    Ok(resolved) => {
                        self.components.insert(path.clone(), resolved);
                    }
                    Err(BuildError::ResourceNotFound { path: resource }) => {
                        tracing::warn!(
                            "{} references missing resource {}",
                            path.display(),
                            resource.display()
                        );
                        self.missing.insert(path.clone(), resource);
                    }
                    Err(e) => return Err(e),
                }
            }
            self.sources.insert(path, text);
        }

        tracing::debug!(
            "analyzed {} file(s) ({} mode)",
            self.sources.len(),
            self.options.compilation_mode
        );
        Ok(())
    }

    fn contains_source(&self, path: &Path) -> bool {
        self.sources.contains_key(path)
    }

    fn prepare_emit(&self) -> EmitTransformers {
        EmitTransformers::default()
    }

    fn emit(&self, path: &Path, transformers: &EmitTransformers) -> Result<Vec<EmittedArtifact>> {
        let source = self
            .sources
            .get(path)
            .ok_or_else(|| BuildError::UnknownSource {
                path: path.to_path_buf(),
            })?;

        if is_declaration_file(path) {
            return Ok(Vec::new());
        }
        if let Some(resource) = self.missing.get(path) {
            return Err(BuildError::ResourceNotFound {
                path: resource.clone(),
            });
        }

        let source = match self.components.get(path) {
            Some(resolved) => splice(source, &resolved.replacements),
            None => source.clone(),
        };
        let source = transformers.apply_before(path, &source)?;
        let js = transpile_with(path, &source, source_type_for(path))?;
        if is_empty_module(&js) {
            return Ok(Vec::new());
        }
        let js = transformers.apply_after(path, &js)?;

        Ok(vec![EmittedArtifact {
            file_name: output_file_name(path),
            data: js,
        }])
    }

    fn dependencies(&self, path: &Path) -> Vec<PathBuf> {
        self.components
            .get(path)
            .map(|resolved| resolved.files.iter().map(|(file, _)| file.clone()).collect())
            .unwrap_or_default()
    }

    async fn inputs_changed(&self) -> bool {
        for resource in self.missing.values() {
            if tokio::fs::try_exists(resource).await.unwrap_or(false) {
                return true;
            }
        }
        for resolved in self.components.values() {
            for (file, hash) in &resolved.files {
                match tokio::fs::read_to_string(file).await {
                    Ok(text) if content_hash(&text) == *hash => {}
                    _ => return true,
                }
            }
        }
        false
    }
}

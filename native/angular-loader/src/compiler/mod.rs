//! Contract with the framework's ahead-of-time compiler.
//!
//! The compiler itself is opaque. The loader only needs three things from it:
//! build a program for a set of root files, run its asynchronous analysis, and
//! emit one file at a time with extra source transformers merged in.

mod bootstrap;
mod resources;
mod transpile;

pub use bootstrap::BootstrapRewriter;
pub use transpile::{TranspileCompiler, TranspileProgram};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::CompilerOptions;
use crate::error::Result;
use crate::resource::ResourceHost;

/// One file written by the program's emit (JavaScript, source map, `.d.ts`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedArtifact {
    pub file_name: String,
    pub data: String,
}

/// A source-to-source pass the compiler runs around its own emit.
pub trait SourceTransformer: Send + Sync {
    fn name(&self) -> &'static str;
    fn transform(&self, path: &Path, source: &str) -> Result<String>;
}

/// Transformers applied `before` the framework emit (on source text) and
/// `after` it (on emitted JavaScript).
#[derive(Clone, Default)]
pub struct EmitTransformers {
    pub before: Vec<Arc<dyn SourceTransformer>>,
    pub after: Vec<Arc<dyn SourceTransformer>>,
}

impl std::fmt::Debug for EmitTransformers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |list: &[Arc<dyn SourceTransformer>]| {
            list.iter().map(|t| t.name()).collect::<Vec<_>>()
        };
        f.debug_struct("EmitTransformers")
            .field("before", &names(&self.before))
            .field("after", &names(&self.after))
            .finish()
    }
}

impl EmitTransformers {
    pub fn before(transformers: Vec<Arc<dyn SourceTransformer>>) -> Self {
        Self {
            before: transformers,
            after: Vec::new(),
        }
    }

    /// Appends `other`'s transformers after this set's, phase by phase.
    pub fn merge(mut self, other: EmitTransformers) -> Self {
        self.before.extend(other.before);
        self.after.extend(other.after);
        self
    }

    pub fn apply_before(&self, path: &Path, source: &str) -> Result<String> {
        apply(&self.before, path, source)
    }

    pub fn apply_after(&self, path: &Path, code: &str) -> Result<String> {
        apply(&self.after, path, code)
    }
}

fn apply(list: &[Arc<dyn SourceTransformer>], path: &Path, source: &str) -> Result<String> {
    let mut current = source.to_string();
    for transformer in list {
        current = transformer.transform(path, &current)?;
    }
    Ok(current)
}

/// A program built for a fixed set of root files.
pub trait CompilationProgram: Send + Sync + 'static {
    /// Runs the compiler's analysis pass to completion.
    fn analyze(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether the reusable program holds a source file for `path`.
    fn contains_source(&self, path: &Path) -> bool;

    /// The framework's own emit transformers.
    fn prepare_emit(&self) -> EmitTransformers;

    /// Emits exactly one file. Every artifact produced is returned.
    fn emit(&self, path: &Path, transformers: &EmitTransformers) -> Result<Vec<EmittedArtifact>>;

    /// Files `path` depends on, if the compiler tracks them.
    fn dependencies(&self, _path: &Path) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Whether files read during analysis, other than the roots, changed or
    /// appeared since. A `true` makes the next `ensure` rebuild.
    fn inputs_changed(&self) -> impl Future<Output = bool> + Send {
        async { false }
    }
}

pub trait FrameworkCompiler: Send + Sync + 'static {
    type Program: CompilationProgram;

    fn create_program(
        &self,
        root_files: &[PathBuf],
        options: &CompilerOptions,
        resources: Arc<ResourceHost>,
    ) -> Result<Self::Program>;
}

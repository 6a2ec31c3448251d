//! Compilation unit manager.
//!
//! Owns the set of root files the compiler knows about and the current
//! program built from them. The root set only grows: when the bundler asks for
//! a file the program has never seen, the file is added and the whole program
//! is rebuilt and re-analyzed before anything is emitted from it.
//!
//! [`CompilationSession`] is the shareable handle. It serializes every
//! `ensure` → `emit` pair behind one FIFO lock, so a rebuild for one file can
//! never replace the program while another file's emit is pending.
//!
//! Loads that pass the file's current text also record its content hash. An
//! edited root marks the session stale, so the next emit comes from a program
//! rebuilt over the new bytes. Inputs the program read on its own (component
//! templates and stylesheets) are checked through
//! [`CompilationProgram::inputs_changed`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::compiler::{
    BootstrapRewriter, CompilationProgram, EmitTransformers, FrameworkCompiler,
};
use crate::config::CompilerOptions;
use crate::error::{BuildError, Result};
use crate::resource::ResourceHost;

lazy_static! {
    static ref JS_ARTIFACT_RE: Regex = Regex::new(r"\.[cm]?js$").unwrap();
}

/// Monotonic version of the current program. Bumped on every successful rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProgramVersion(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitResult {
    pub code: String,
    pub dependencies: Vec<PathBuf>,
    /// SHA-256 of `code`, hex encoded.
    pub hash: String,
}

pub fn content_hash(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ═══════════════════════════════════════════════════════════════════════════════
// UNIT MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct UnitManager<C: FrameworkCompiler> {
    compiler: C,
    options: CompilerOptions,
    resources: Arc<ResourceHost>,
    /// Insertion order is the order handed to the compiler.
    root_files: Vec<PathBuf>,
    known: HashSet<PathBuf>,
    /// Content hash of each root as last seen by a load.
    hashes: HashMap<PathBuf, String>,
    program: C::Program,
    version: ProgramVersion,
    rebuilds: usize,
    /// Set when the last rebuild failed or a root's text changed; the next
    /// `ensure` rebuilds regardless.
    stale: bool,
}

impl<C: FrameworkCompiler> UnitManager<C> {
    /// Creates the initial, empty program and analyzes it.
    pub async fn new(
        compiler: C,
        options: CompilerOptions,
        resources: Arc<ResourceHost>,
    ) -> Result<Self> {
        let mut program = compiler
            .create_program(&[], &options, resources.clone())
            .map_err(|e| BuildError::Setup(e.to_string()))?;
        program
            .analyze()
            .await
            .map_err(|e| BuildError::Setup(e.to_string()))?;

        Ok(Self {
            compiler,
            options,
            resources,
            root_files: Vec::new(),
            known: HashSet::new(),
            hashes: HashMap::new(),
            program,
            version: ProgramVersion::default(),
            rebuilds: 0,
            stale: false,
        })
    }

    pub fn root_files(&self) -> &[PathBuf] {
        &self.root_files
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.known.contains(path)
    }

    pub fn version(&self) -> ProgramVersion {
        self.version
    }

    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Makes sure `path` is a root of the current program. Returns whether a
    /// rebuild happened.
    pub async fn ensure(&mut self, path: &Path) -> Result<bool> {
        if self.known.contains(path) && !self.stale {
            if !self.program.inputs_changed().await {
                return Ok(false);
            }
            tracing::debug!("program inputs changed, rebuilding for {}", path.display());
        }

        if self.known.insert(path.to_path_buf()) {
            self.root_files.push(path.to_path_buf());
        }
        self.rebuild().await?;
        Ok(true)
    }

    /// Like [`ensure`](Self::ensure), but also rebuilds when `source` differs
    /// from the text this root was last loaded with.
    pub async fn ensure_current(&mut self, path: &Path, source: &str) -> Result<bool> {
        let hash = content_hash(source);
        let previous = self.hashes.insert(path.to_path_buf(), hash.clone());
        if self.known.contains(path) && previous.as_deref() != Some(hash.as_str()) {
            tracing::debug!("{} changed on disk", path.display());
            self.stale = true;
        }
        self.ensure(path).await
    }

    async fn rebuild(&mut self) -> Result<()> {
        let built = self
            .compiler
            .create_program(&self.root_files, &self.options, self.resources.clone());
        let mut program = match built {
            Ok(program) => program,
            Err(e) => {
                self.stale = true;
                return Err(e);
            }
        };
        if let Err(e) = program.analyze().await {
            self.stale = true;
            return Err(e);
        }

        self.program = program;
        self.version = ProgramVersion(self.version.0 + 1);
        self.rebuilds += 1;
        self.stale = false;
        tracing::info!(
            "rebuilt program v{} with {} root file(s)",
            self.version.0,
            self.root_files.len()
        );
        Ok(())
    }

    /// Emits the JavaScript for one file of the current program.
    pub fn emit(&self, path: &Path) -> Result<EmitResult> {
        if !self.program.contains_source(path) {
            return Err(BuildError::UnknownSource {
                path: path.to_path_buf(),
            });
        }

        let transformers = self
            .program
            .prepare_emit()
            .merge(EmitTransformers::before(vec![Arc::new(BootstrapRewriter)]));

        let artifacts = self.program.emit(path, &transformers)?;
        let code = artifacts
            .into_iter()
            .filter(|a| JS_ARTIFACT_RE.is_match(&a.file_name) && !a.data.is_empty())
            .last()
            .map(|a| a.data)
            .ok_or_else(|| BuildError::EmitFailure {
                path: path.to_path_buf(),
            })?;

        Ok(EmitResult {
            hash: content_hash(&code),
            dependencies: self.program.dependencies(path),
            code,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// One build or watch session. Cheap to share behind an `Arc`.
pub struct CompilationSession<C: FrameworkCompiler> {
    units: Mutex<UnitManager<C>>,
}

impl<C: FrameworkCompiler> CompilationSession<C> {
    pub async fn start(
        compiler: C,
        options: CompilerOptions,
        resources: Arc<ResourceHost>,
    ) -> Result<Self> {
        let units = UnitManager::new(compiler, options, resources).await?;
        Ok(Self {
            units: Mutex::new(units),
        })
    }

    /// `ensure` then `emit` for `path`, holding the session lock throughout.
    pub async fn compile(&self, path: &Path) -> Result<EmitResult> {
        let mut units = self.units.lock().await;
        units.ensure(path).await?;
        units.emit(path)
    }

    /// Same as [`compile`](Self::compile), rebuilding first when `source`
    /// is not the text `path` was last compiled from.
    pub async fn compile_source(&self, path: &Path, source: &str) -> Result<EmitResult> {
        let mut units = self.units.lock().await;
        units.ensure_current(path, source).await?;
        units.emit(path)
    }

    pub async fn ensure(&self, path: &Path) -> Result<bool> {
        self.units.lock().await.ensure(path).await
    }

    pub async fn emit(&self, path: &Path) -> Result<EmitResult> {
        self.units.lock().await.emit(path)
    }

    pub async fn root_files(&self) -> Vec<PathBuf> {
        self.units.lock().await.root_files().to_vec()
    }

    pub async fn rebuild_count(&self) -> usize {
        self.units.lock().await.rebuild_count()
    }

    pub async fn version(&self) -> ProgramVersion {
        self.units.lock().await.version()
    }
}

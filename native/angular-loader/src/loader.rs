//! Bundler-facing load pipeline.
//!
//! Three interceptors, tried in a fixed order:
//!
//! 1. the routes module, answered with a freshly generated route table
//! 2. framework sources (`.ts`, `.mts`, `.cts`), compiled through the session
//! 3. any other script, transformed and transpiled per file
//!
//! Anything under `node_modules` is left to the bundler's default loader.
//! Whatever pipeline produced the code, reload instrumentation is appended
//! before it is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use lazy_static::lazy_static;
use oxc_span::SourceType;
use regex::Regex;

use crate::classify::{classify_source, source_type_for};
use crate::compiler::FrameworkCompiler;
use crate::config::{CompilerOptions, LoaderOptions};
use crate::error::{BuildError, LoadError, Result};
use crate::instrument::inject;
use crate::paths::{absolutize_cwd, is_vendored, to_slash};
use crate::resource::{PassthroughStylesheet, ResourceHost, StylesheetTransform};
use crate::routes::RoutesModule;
use crate::transpile::transpile;
use crate::unit::CompilationSession;

lazy_static! {
    static ref FRAMEWORK_FILTER: Regex = Regex::new(r"\.[cm]?ts$").unwrap();
    static ref SCRIPT_FILTER: Regex = Regex::new(r"\.[cm]?[jt]sx?$").unwrap();
}

/// How the bundler should parse returned contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderTag {
    Js,
    Ts,
}

impl LoaderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderTag::Js => "js",
            LoaderTag::Ts => "ts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnLoadResult {
    pub contents: String,
    pub loader: LoaderTag,
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BuildError::io(path, e))
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAMEWORK LOADER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct FrameworkLoader<C: FrameworkCompiler> {
    session: Arc<CompilationSession<C>>,
}

impl<C: FrameworkCompiler> FrameworkLoader<C> {
    pub fn new(session: Arc<CompilationSession<C>>) -> Self {
        Self { session }
    }

    pub fn filter() -> &'static Regex {
        &FRAMEWORK_FILTER
    }

    pub fn accepts(path: &Path) -> bool {
        !is_vendored(path) && FRAMEWORK_FILTER.is_match(&to_slash(path))
    }

    /// Returns `None` for paths this loader does not handle.
    pub async fn load(&self, path: &Path) -> Result<Option<OnLoadResult>> {
        if !Self::accepts(path) {
            return Ok(None);
        }

        let source = read_text(path).await?;
        let absolute = absolutize_cwd(path);

        let emitted = self.session.compile_source(&absolute, &source).await?;
        let classification = classify_source(&source, source_type_for(&absolute), &absolute);
        let contents = inject(&emitted.code, classification, &absolute);

        Ok(Some(OnLoadResult {
            contents,
            loader: LoaderTag::Js,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERIC LOADER
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-file source transform run ahead of the transpile (down-leveling,
/// optimization). Not framework aware.
pub trait SourceTransform: Send + Sync {
    fn transform<'a>(&'a self, path: &'a Path, source: &'a str) -> BoxFuture<'a, Result<String>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTransform;

impl SourceTransform for PassthroughTransform {
    fn transform<'a>(&'a self, _path: &'a Path, source: &'a str) -> BoxFuture<'a, Result<String>> {
        async move { Ok(source.to_string()) }.boxed()
    }
}

pub struct GenericLoader {
    transform: Arc<dyn SourceTransform>,
}

impl GenericLoader {
    pub fn new(transform: Arc<dyn SourceTransform>) -> Self {
        Self { transform }
    }

    pub fn filter() -> &'static Regex {
        &SCRIPT_FILTER
    }

    pub fn accepts(path: &Path) -> bool {
        !is_vendored(path) && SCRIPT_FILTER.is_match(&to_slash(path))
    }

    pub async fn load(&self, path: &Path) -> Result<Option<OnLoadResult>> {
        if !Self::accepts(path) {
            return Ok(None);
        }

        let source = read_text(path).await?;
        let transformed = self.transform.transform(path, &source).await?;
        let javascript = transpile(path, &transformed)?;

        let classification = classify_source(&javascript, SourceType::mjs(), path);
        let contents = inject(&javascript, classification, path);

        Ok(Some(OnLoadResult {
            contents,
            loader: LoaderTag::Ts,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    Routes,
    Framework,
    Generic,
}

/// One interceptor as the host bundler registers it.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: &'static str,
    pub filter: String,
    pub kind: LoaderKind,
}

pub struct LoaderPipeline<C: FrameworkCompiler> {
    routes: Option<RoutesModule>,
    framework: FrameworkLoader<C>,
    generic: GenericLoader,
}

impl<C: FrameworkCompiler> LoaderPipeline<C> {
    pub fn new(
        session: Arc<CompilationSession<C>>,
        routes: Option<RoutesModule>,
        transform: Arc<dyn SourceTransform>,
    ) -> Self {
        Self {
            routes,
            framework: FrameworkLoader::new(session),
            generic: GenericLoader::new(transform),
        }
    }

    /// Starts a session with fixed compiler options and wires every
    /// interceptor from `options`. `cwd` anchors relative routing paths.
    pub async fn setup(
        compiler: C,
        options: &LoaderOptions,
        cwd: &Path,
        stylesheets: Option<Arc<dyn StylesheetTransform>>,
        transform: Option<Arc<dyn SourceTransform>>,
    ) -> Result<Self> {
        let stylesheets = stylesheets.unwrap_or_else(|| Arc::new(PassthroughStylesheet));
        let resources = Arc::new(ResourceHost::new(
            options.inline_styles_extension.clone(),
            stylesheets,
        ));
        let session =
            CompilationSession::start(compiler, CompilerOptions::default(), resources).await?;
        let routes = RoutesModule::new(&options.routing, cwd)?;
        let transform = transform.unwrap_or_else(|| Arc::new(PassthroughTransform));

        tracing::debug!("loader pipeline ready (cwd {})", cwd.display());
        Ok(Self::new(Arc::new(session), Some(routes), transform))
    }

    pub fn session(&self) -> &Arc<CompilationSession<C>> {
        &self.framework.session
    }

    pub fn registrations(&self) -> Vec<Registration> {
        let mut out = Vec::with_capacity(3);
        if let Some(routes) = &self.routes {
            out.push(Registration {
                name: "angular-routes",
                filter: routes.filter().as_str().to_string(),
                kind: LoaderKind::Routes,
            });
        }
        out.push(Registration {
            name: "angular-framework",
            filter: FRAMEWORK_FILTER.as_str().to_string(),
            kind: LoaderKind::Framework,
        });
        out.push(Registration {
            name: "angular-generic",
            filter: SCRIPT_FILTER.as_str().to_string(),
            kind: LoaderKind::Generic,
        });
        out
    }

    /// Which interceptor answers `path`, if any.
    pub fn dispatch(&self, path: &Path) -> Option<LoaderKind> {
        if self.routes.as_ref().is_some_and(|r| r.matches(path)) {
            return Some(LoaderKind::Routes);
        }
        if FrameworkLoader::<C>::accepts(path) {
            return Some(LoaderKind::Framework);
        }
        if GenericLoader::accepts(path) {
            return Some(LoaderKind::Generic);
        }
        None
    }

    /// Loads one module. `Ok(None)` hands the path back to the bundler.
    pub async fn load(&self, path: &Path) -> std::result::Result<Option<OnLoadResult>, LoadError> {
        let result = match self.dispatch(path) {
            Some(LoaderKind::Routes) => self.load_routes(),
            Some(LoaderKind::Framework) => self.framework.load(path).await,
            Some(LoaderKind::Generic) => self.generic.load(path).await,
            None => Ok(None),
        };

        result.map_err(|source| {
            let err = LoadError::new(PathBuf::from(path), source);
            tracing::error!("{}", err);
            err
        })
    }

    fn load_routes(&self) -> Result<Option<OnLoadResult>> {
        let Some(routes) = &self.routes else {
            return Ok(None);
        };
        Ok(Some(OnLoadResult {
            contents: routes.generate()?,
            loader: LoaderTag::Ts,
        }))
    }
}

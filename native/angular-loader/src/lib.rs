//! # Angular Loader (native)
//!
//! Bundler plugin core for incremental component compilation with hot reload,
//! plus a filesystem route table generator.
//!
//! ## Load Pipeline
//!
//! 1. **Routes module**: loads of the configured routes file are answered with
//!    a route table generated from the pages directory ([`routes`]).
//! 2. **Framework sources**: `.ts` / `.mts` / `.cts` files go through a
//!    [`CompilationSession`]. The session grows its root file set as files are
//!    discovered and rebuilds the compiler program before emitting.
//! 3. **Other scripts**: transformed and transpiled one file at a time.
//!
//! Every result is classified from its syntax tree ([`classify`]) and gets the
//! matching reload snippet appended ([`instrument`]).
//!
//! ## Session Invariants
//!
//! 1. The root file set only grows. A rebuild always uses the full set.
//! 2. `ensure` and `emit` for one file run under a single FIFO lock, so no
//!    rebuild can replace the program between them.
//! 3. A failed rebuild keeps the previous program and forces the next
//!    `ensure` to rebuild.
//! 4. Vendored paths (`node_modules`) are never compiled here.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod classify;
pub mod compiler;
pub mod config;
pub mod error;
pub mod instrument;
pub mod loader;
pub mod logger;
pub mod paths;
pub mod resource;
pub mod routes;
pub mod transpile;
pub mod unit;

#[cfg(test)]
mod session_tests;

pub use classify::{classify_source, SourceClassification};
pub use compiler::{CompilationProgram, FrameworkCompiler, TranspileCompiler};
pub use config::{CompilerOptions, LoaderOptions, RoutingOptions};
pub use error::{BuildError, LoadError, Result};
pub use instrument::inject;
pub use loader::{LoaderKind, LoaderPipeline, LoaderTag, OnLoadResult};
pub use routes::{generate_routes, RoutesModule};
pub use unit::{CompilationSession, EmitResult, ProgramVersion};

#[cfg(feature = "napi")]
pub use classify::classify_source_native;
#[cfg(feature = "napi")]
pub use instrument::inject_reload_native;
#[cfg(feature = "napi")]
pub use routes::generate_routes_native;

/// One-shot load of `file_path` through a fresh pipeline backed by the
/// reference compiler. Returns the loaded contents, or `null` when no
/// interceptor handles the path.
#[cfg(feature = "napi")]
#[napi]
pub async fn compile_bridge(
    file_path: String,
    options_json: Option<String>,
) -> napi::Result<Option<String>> {
    logger::init();

    let options = match options_json {
        Some(json) => LoaderOptions::from_json(&json),
        None => Ok(LoaderOptions::default()),
    }
    .map_err(|e| napi::Error::from_reason(e.to_string()))?;

    let cwd = std::env::current_dir().map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let pipeline = LoaderPipeline::setup(TranspileCompiler, &options, &cwd, None, None)
        .await
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;

    let loaded = pipeline
        .load(std::path::Path::new(&file_path))
        .await
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    Ok(loaded.map(|r| r.contents))
}

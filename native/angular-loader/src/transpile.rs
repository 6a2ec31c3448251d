//! Fast per-file TypeScript to JavaScript transpile.
//!
//! Types are stripped, nothing else is lowered. Shared by the generic loader
//! and the reference compiler.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};

use crate::classify::source_type_for;
use crate::error::{BuildError, Result};

fn join_messages<E: ToString>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Transpiles `source` with the source type implied by `path`'s extension.
/// Unknown extensions are treated as TypeScript modules.
pub fn transpile(path: &Path, source: &str) -> Result<String> {
    transpile_with(path, source, source_type_for(path))
}

pub fn transpile_with(path: &Path, source: &str, source_type: SourceType) -> Result<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(BuildError::Parse {
            path: path.to_path_buf(),
            message: join_messages(&ret.errors),
        });
    }

    let mut program = ret.program;
    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();

    let options = TransformOptions::default();
    let transformed =
        Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if !transformed.errors.is_empty() {
        return Err(BuildError::transform(path, join_messages(&transformed.errors)));
    }

    Ok(Codegen::new().build(&program).code)
}

/// True when transpiled output has no runtime code left, e.g. a file that only
/// declared types.
pub fn is_empty_module(code: &str) -> bool {
    code.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line == "export {};")
}

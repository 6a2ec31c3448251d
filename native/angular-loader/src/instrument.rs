//! Live-reload instrumentation.
//!
//! Each loaded module gets exactly one `import.meta.hot` snippet appended,
//! chosen by its [`SourceClassification`]. Entry files additionally get the
//! compiler runtime import prepended when it is missing.

use std::path::Path;

use crate::classify::SourceClassification;

pub const COMPILER_RUNTIME_IMPORT: &str = "import '@angular/compiler';";
const COMPILER_RUNTIME_IMPORT_DOUBLE: &str = "import \"@angular/compiler\"";
const COMPILER_RUNTIME_IMPORT_SINGLE: &str = "import '@angular/compiler'";

/// Global the bootstrap rewriter stores the application reference in.
pub const APP_REF_GLOBAL: &str = "ngRef";

/// Hook a framework module may export to patch itself in place.
pub const UPDATE_HOOK: &str = "__hmrUpdate";

const ENTRY_SNIPPET: &str = r#"
if (import.meta.hot) {
  import.meta.hot.accept();
  import.meta.hot.dispose(() => {
    window.ngRef && window.ngRef.destroy();
  });
}
"#;

const DECORATED_SNIPPET: &str = r#"
if (import.meta.hot) {
  import.meta.hot.accept(({ module }) => {
    if (module && module.__hmrUpdate) {
      module.__hmrUpdate();
    }
  });
}
"#;

const PLAIN_SNIPPET: &str = r#"
if (import.meta.hot) {
  import.meta.hot.accept();
}
"#;

pub fn snippet_for(classification: SourceClassification) -> &'static str {
    match classification {
        SourceClassification::EntryBootstrap => ENTRY_SNIPPET,
        SourceClassification::FrameworkDecorated => DECORATED_SNIPPET,
        SourceClassification::PlainModule => PLAIN_SNIPPET,
    }
}

fn has_compiler_runtime_import(code: &str) -> bool {
    code.contains(COMPILER_RUNTIME_IMPORT_SINGLE) || code.contains(COMPILER_RUNTIME_IMPORT_DOUBLE)
}

/// Escapes a value for a single-quoted JS string literal.
pub(crate) fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Returns `code` with reload instrumentation for `classification`.
pub fn inject(code: &str, classification: SourceClassification, path: &Path) -> String {
    let snippet = snippet_for(classification);
    let prepend = classification == SourceClassification::EntryBootstrap
        && !has_compiler_runtime_import(code);

    tracing::trace!(
        "instrumenting {} as {}{}",
        path.display(),
        classification.as_str(),
        if prepend { " (runtime import added)" } else { "" }
    );

    let mut out = String::with_capacity(code.len() + snippet.len() + 32);
    if prepend {
        out.push_str(COMPILER_RUNTIME_IMPORT);
        out.push('\n');
    }
    out.push_str(code);
    out.push_str(snippet);
    out
}

#[cfg(feature = "napi")]
#[napi_derive::napi]
pub fn inject_reload_native(
    code: String,
    classification: String,
    file_path: String,
) -> napi::Result<String> {
    let classification = SourceClassification::parse(&classification).ok_or_else(|| {
        napi::Error::from_reason(format!("Unknown classification: {}", classification))
    })?;
    Ok(inject(&code, classification, Path::new(&file_path)))
}

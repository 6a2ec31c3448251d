//! Path helpers shared by the loaders and the route generator.
//!
//! All paths handed to generated code use forward slashes regardless of OS.

use std::path::{Component, Path, PathBuf};

/// Directory name whose contents are never compiled by this crate.
pub const VENDOR_DIR: &str = "node_modules";

/// Converts a path to a forward-slash string.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Lexically removes `.` and `..` components. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolves `path` against `cwd` when relative, then normalizes it.
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&cwd.join(path))
    }
}

/// Same as [`absolutize`] using the process working directory.
pub fn absolutize_cwd(path: &Path) -> PathBuf {
    match std::env::current_dir() {
        Ok(cwd) => absolutize(path, &cwd),
        Err(_) => normalize(path),
    }
}

/// Relative path from directory `from` to `to`. Both must be absolute;
/// otherwise `to` is returned normalized.
pub fn relative(from: &Path, to: &Path) -> PathBuf {
    let to = normalize(to);
    pathdiff::diff_paths(&to, normalize(from)).unwrap_or(to)
}

/// True when any component of the path is the vendored-dependency directory.
pub fn is_vendored(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == VENDOR_DIR))
}

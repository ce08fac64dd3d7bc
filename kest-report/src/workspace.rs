//! Workspace-root discovery for trace rendering.
//!
//! The only process-wide state in the engine: the root is looked up once
//! and cached. When no root can be found the trace renderer degrades to
//! frame-only output; nothing else depends on it.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// The workspace root for the current process, discovered once from the
/// working directory.
pub fn workspace_root() -> Option<&'static Path> {
    static ROOT: OnceLock<Option<PathBuf>> = OnceLock::new();
    ROOT.get_or_init(|| {
        std::env::current_dir()
            .ok()
            .and_then(|cwd| find_workspace_root(&cwd))
    })
    .as_deref()
}

/// Walk ancestor directories for a workspace manifest (a `Cargo.toml`
/// containing a `[workspace]` table), falling back to the nearest plain
/// `Cargo.toml`.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut package_root = None;
    for dir in start.ancestors() {
        let manifest = dir.join("Cargo.toml");
        if !manifest.is_file() {
            continue;
        }
        if package_root.is_none() {
            package_root = Some(dir.to_path_buf());
        }
        if let Ok(contents) = std::fs::read_to_string(&manifest) {
            if contents.contains("[workspace]") {
                return Some(dir.to_path_buf());
            }
        }
    }
    package_root
}

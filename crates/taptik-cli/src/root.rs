use anyhow::Context;
use std::path::{Path, PathBuf};
use taptik_core::io::expand_tilde;
use taptik_core::paths::{CLAUDE_DIR, CLAUDE_MD, CURSOR_DIR, CURSOR_RULES_FILE, KIRO_DIR, TAPTIK_DIR};

const PROJECT_MARKERS: &[&str] = &[TAPTIK_DIR, KIRO_DIR, CLAUDE_DIR, CLAUDE_MD, CURSOR_DIR, CURSOR_RULES_FILE];

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `TAPTIK_ROOT` env var (passed in as `explicit`, `~` expanded)
/// 2. Walk upward from `cwd` looking for `.taptik/` or any IDE marker
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return expand_tilde(p).context("failed to resolve --root");
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    Ok(find_root(&cwd))
}

fn find_root(start: &Path) -> PathBuf {
    let has_marker = |dir: &Path| PROJECT_MARKERS.iter().any(|m| dir.join(m).exists());
    start
        .ancestors()
        .find(|dir| has_marker(dir))
        .or_else(|| start.ancestors().find(|dir| dir.join(".git").is_dir()))
        .unwrap_or(start)
        .to_path_buf()
}

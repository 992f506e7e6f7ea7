use stagehand_core::paths::{CONFIG_FILE, STAGEHAND_DIR};
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `STAGEHAND_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.stagehand/` or `stagehand.yaml`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(&cwd)
}

fn resolve_from(cwd: &Path) -> PathBuf {
    let is_project =
        |dir: &Path| dir.join(STAGEHAND_DIR).is_dir() || dir.join(CONFIG_FILE).is_file();
    if let Some(dir) = find_upward(cwd, is_project) {
        return dir;
    }
    if let Some(dir) = find_upward(cwd, |dir| dir.join(".git").is_dir()) {
        return dir;
    }
    cwd.to_path_buf()
}

fn find_upward(start: &Path, found: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start.ancestors().find(|dir| found(dir)).map(Path::to_path_buf)
}

use crate::error::{Result, StagehandError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const STAGEHAND_DIR: &str = ".stagehand";
pub const INSTALLED_APPS_DIR: &str = ".stagehand/tmp/apps";

pub const CONFIG_FILE: &str = "stagehand.yaml";
pub const APPS_CONFIG_DIR: &str = "config/apps";
pub const GLOBAL_VALUES_FILE: &str = "config/global-values.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn global_values_path(root: &Path) -> PathBuf {
    root.join(GLOBAL_VALUES_FILE)
}

pub fn app_config_path(root: &Path, name: &str) -> PathBuf {
    root.join(APPS_CONFIG_DIR).join(format!("{name}.yaml"))
}

pub fn installed_apps_dir(root: &Path) -> PathBuf {
    root.join(INSTALLED_APPS_DIR)
}

pub fn installed_record_path(root: &Path, name: &str) -> PathBuf {
    installed_apps_dir(root).join(format!("{name}.yaml"))
}

// ---------------------------------------------------------------------------
// App name validation
// ---------------------------------------------------------------------------

static APP_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn app_name_re() -> &'static Regex {
    // Same shape as a Kubernetes DNS-1123 label.
    APP_NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// App names become file names and Helm release names, so they are held to
/// DNS-label rules.
pub fn validate_app_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 63 || !app_name_re().is_match(name) {
        return Err(StagehandError::Config(format!(
            "invalid app name '{name}': must be lowercase alphanumeric with hyphens"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

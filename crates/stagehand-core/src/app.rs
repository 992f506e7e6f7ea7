use crate::error::{Result, StagehandError};
use crate::paths;
use crate::store::ConfigStore;
use crate::template;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// One application to install: chart coordinates plus override values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub name: String,
    pub repo: String,
    pub chart: String,
    pub version: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    #[serde(default)]
    pub values: Mapping,
    #[serde(default)]
    pub create_namespace: bool,
    #[serde(default)]
    pub privileged_namespace: bool,
}

impl AppConfig {
    /// Release name used for the install, defaulting to the app name.
    pub fn release(&self) -> &str {
        self.release_name.as_deref().unwrap_or(&self.name)
    }

    /// Substitute global values into the override values and the templated
    /// string fields. Either every placeholder resolves or this fails.
    pub fn resolve(&self, globals: &GlobalValues) -> Result<AppConfig> {
        let ctx = globals.as_mapping();
        let resolve_field = |field: &str, value: &str| {
            template::resolve_string(value, ctx).map_err(|e| {
                StagehandError::Template(format!("app '{}' field '{field}': {e}", self.name))
            })
        };
        Ok(AppConfig {
            name: self.name.clone(),
            repo: resolve_field("repo", &self.repo)?,
            chart: self.chart.clone(),
            version: resolve_field("version", &self.version)?,
            namespace: resolve_field("namespace", &self.namespace)?,
            release_name: self
                .release_name
                .as_deref()
                .map(|r| resolve_field("releaseName", r))
                .transpose()?,
            values: template::resolve(&self.values, ctx).map_err(|e| {
                StagehandError::Template(format!("app '{}' values: {e}", self.name))
            })?,
            create_namespace: self.create_namespace,
            privileged_namespace: self.privileged_namespace,
        })
    }
}

// ---------------------------------------------------------------------------
// GlobalValues
// ---------------------------------------------------------------------------

/// Substitution context shared by every app in a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalValues(Mapping);

impl GlobalValues {
    pub fn new(values: Mapping) -> Self {
        Self(values)
    }

    /// Load through `store`; a missing or empty file yields an empty context.
    pub fn load(store: &dyn ConfigStore, path: &Path) -> Result<Self> {
        let bytes = match store.read_yaml(path) {
            Ok(bytes) => bytes,
            Err(StagehandError::ConfigNotFound(_)) => return Ok(Self::default()),
            Err(e) => return Err(e),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let values: Mapping = serde_yaml::from_slice(&bytes).map_err(|e| {
            StagehandError::Config(format!("malformed global values {}: {e}", path.display()))
        })?;
        Ok(Self(values))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(Value::String(key.into()), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// AppGroup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPhase {
    Core,
    Default,
}

impl GroupPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupPhase::Core => "core",
            GroupPhase::Default => "default",
        }
    }
}

impl fmt::Display for GroupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk shape: either a bare list of app names or a map with metadata.
#[derive(Deserialize)]
#[serde(untagged)]
enum AppGroupFile {
    List(Vec<String>),
    Full {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        phase: Option<GroupPhase>,
        apps: Vec<String>,
    },
}

/// An ordered set of apps installed together as one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct AppGroup {
    pub name: String,
    pub phase: GroupPhase,
    pub apps: Vec<String>,
}

impl AppGroup {
    /// Load a group file. The group name defaults to the file stem and the
    /// phase to `core` for a group named "core", `default` otherwise.
    pub fn load(store: &dyn ConfigStore, path: &Path) -> Result<Self> {
        let bytes = store.read_yaml(path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("default")
            .to_string();
        Self::parse(&bytes, &stem)
            .map_err(|e| StagehandError::Config(format!("{}: {e}", path.display())))
    }

    fn parse(bytes: &[u8], stem: &str) -> Result<Self> {
        let file: AppGroupFile = serde_yaml::from_slice(bytes)
            .map_err(|e| StagehandError::Config(format!("malformed app group: {e}")))?;
        let (name, phase, apps) = match file {
            AppGroupFile::List(apps) => (None, None, apps),
            AppGroupFile::Full { name, phase, apps } => (name, phase, apps),
        };
        let name = name.unwrap_or_else(|| stem.to_string());
        let phase = phase.unwrap_or(if name == "core" {
            GroupPhase::Core
        } else {
            GroupPhase::Default
        });

        let mut seen = HashSet::new();
        for app in &apps {
            paths::validate_app_name(app)?;
            if !seen.insert(app.as_str()) {
                return Err(StagehandError::Config(format!(
                    "app '{app}' listed more than once in group '{name}'"
                )));
            }
        }
        Ok(Self { name, phase, apps })
    }

    /// Load each listed app's config, preserving group order.
    pub fn load_apps(&self, store: &dyn ConfigStore) -> Result<Vec<AppConfig>> {
        self.apps
            .iter()
            .map(|name| {
                let path = paths::app_config_path(store.root(), name);
                let bytes = store.read_yaml(&path)?;
                let app: AppConfig = serde_yaml::from_slice(&bytes).map_err(|e| {
                    StagehandError::Config(format!("malformed app config {}: {e}", path.display()))
                })?;
                if app.name != *name {
                    return Err(StagehandError::Config(format!(
                        "{} declares name '{}' but is listed as '{name}'",
                        path.display(),
                        app.name
                    )));
                }
                Ok(app)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// InstalledRecord
// ---------------------------------------------------------------------------

/// Snapshot of an app's resolved config, written after a successful install.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledRecord {
    #[serde(flatten)]
    pub app: AppConfig,
    pub installed_at: DateTime<Utc>,
}

impl InstalledRecord {
    pub fn new(app: AppConfig) -> Self {
        Self {
            app,
            installed_at: Utc::now(),
        }
    }
}

/// Read back every installed record, sorted by app name.
pub fn list_installed(store: &dyn ConfigStore) -> Result<Vec<InstalledRecord>> {
    let mut records = store
        .list_installed_records()?
        .into_iter()
        .map(|(name, bytes)| {
            serde_yaml::from_slice::<InstalledRecord>(&bytes).map_err(|e| {
                StagehandError::Config(format!("malformed installed record '{name}': {e}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    records.sort_by(|a, b| a.app.name.cmp(&b.app.name));
    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

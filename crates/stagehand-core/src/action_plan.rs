//! Action plan: the per-stage enable/disable switches for a deployment run.
//!
//! The plan is a YAML document keyed by stage name:
//!
//! ```yaml
//! generateAgentToken:
//!   enabled: true
//!   valueKey: agentToken
//! installCoreApps:
//!   enabled: true
//! installDefaultApps:
//!   enabled: false
//! trackDeployment:
//!   enabled: true
//!   pollIntervalSeconds: 10
//!   timeoutSeconds: 900
//! ```
//!
//! Unknown stage names are ignored. A stage whose `enabled` is missing or not
//! a boolean is disabled, and so is a stage whose value is not a mapping
//! (`installCoreApps: true`); the gate fails closed.

use crate::error::{Result, StagehandError};
use crate::store::ConfigStore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    GenerateAgentToken,
    InstallCoreApps,
    InstallDefaultApps,
    TrackDeployment,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::GenerateAgentToken,
            Stage::InstallCoreApps,
            Stage::InstallDefaultApps,
            Stage::TrackDeployment,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::GenerateAgentToken => "generateAgentToken",
            Stage::InstallCoreApps => "installCoreApps",
            Stage::InstallDefaultApps => "installDefaultApps",
            Stage::TrackDeployment => "trackDeployment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub enabled: bool,
    /// Stage-specific parameters, everything except `enabled`.
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_yaml::Value>,
}

impl StageConfig {
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.as_u64())
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    pub fn param_secs(&self, key: &str) -> Option<Duration> {
        self.param_u64(key).map(Duration::from_secs)
    }
}

/// Anything other than a YAML boolean reads as `false`.
fn lenient_bool<'de, D>(d: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_yaml::Value> = Option::deserialize(d)?;
    Ok(matches!(value, Some(serde_yaml::Value::Bool(true))))
}

/// A stage entry that is not a mapping has no `enabled` key, so it reads as
/// absent rather than failing the whole plan.
fn lenient_stage<'de, D>(d: D) -> std::result::Result<Option<StageConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml::Value>::deserialize(d)? {
        Some(value @ serde_yaml::Value::Mapping(_)) => serde_yaml::from_value(value)
            .map(Some)
            .map_err(D::Error::custom),
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// ActionPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    #[serde(
        default,
        deserialize_with = "lenient_stage",
        skip_serializing_if = "Option::is_none"
    )]
    pub generate_agent_token: Option<StageConfig>,
    #[serde(
        default,
        deserialize_with = "lenient_stage",
        skip_serializing_if = "Option::is_none"
    )]
    pub install_core_apps: Option<StageConfig>,
    #[serde(
        default,
        deserialize_with = "lenient_stage",
        skip_serializing_if = "Option::is_none"
    )]
    pub install_default_apps: Option<StageConfig>,
    #[serde(
        default,
        deserialize_with = "lenient_stage",
        skip_serializing_if = "Option::is_none"
    )]
    pub track_deployment: Option<StageConfig>,
}

impl ActionPlan {
    /// Load a plan through `store`. A missing file or malformed YAML is a
    /// config error; an empty file is a plan with every stage disabled.
    pub fn load(store: &dyn ConfigStore, path: &Path) -> Result<Self> {
        let bytes = store.read_yaml(path)?;
        let content = String::from_utf8(bytes).map_err(|e| {
            StagehandError::Config(format!("{}: not valid UTF-8: {e}", path.display()))
        })?;
        Self::parse(&content).map_err(|e| match e {
            StagehandError::Config(msg) => {
                StagehandError::Config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| StagehandError::Config(format!("malformed action plan: {e}")))
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageConfig> {
        match stage {
            Stage::GenerateAgentToken => self.generate_agent_token.as_ref(),
            Stage::InstallCoreApps => self.install_core_apps.as_ref(),
            Stage::InstallDefaultApps => self.install_default_apps.as_ref(),
            Stage::TrackDeployment => self.track_deployment.as_ref(),
        }
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        self.stage(stage).is_some_and(|s| s.enabled)
    }

    /// Run `f` only when `stage` is enabled. The closure's error comes back
    /// unchanged; a disabled stage returns `Ok(None)` without calling it.
    pub fn exec_if_enabled<T, E, F>(&self, stage: Stage, f: F) -> std::result::Result<Option<T>, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        if !self.is_enabled(stage) {
            debug!(%stage, "stage disabled, skipping");
            return Ok(None);
        }
        info!(%stage, "running stage");
        f().map(Some)
    }

    /// Async counterpart of [`ActionPlan::exec_if_enabled`].
    pub async fn exec_if_enabled_async<T, E, F, Fut>(
        &self,
        stage: Stage,
        f: F,
    ) -> std::result::Result<Option<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if !self.is_enabled(stage) {
            debug!(%stage, "stage disabled, skipping");
            return Ok(None);
        }
        info!(%stage, "running stage");
        f().await.map(Some)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsConfigStore;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[test]
    fn enabled_only_for_literal_true() {
        let plan = ActionPlan::parse(
            r#"
installCoreApps:
  enabled: true
installDefaultApps:
  enabled: "yes"
generateAgentToken:
  enabled: 1
trackDeployment:
  pollIntervalSeconds: 5
"#,
        )
        .unwrap();
        assert!(plan.is_enabled(Stage::InstallCoreApps));
        assert!(!plan.is_enabled(Stage::InstallDefaultApps));
        assert!(!plan.is_enabled(Stage::GenerateAgentToken));
        assert!(!plan.is_enabled(Stage::TrackDeployment));
    }

    #[test]
    fn non_mapping_stage_is_disabled_without_failing_the_plan() {
        let plan = ActionPlan::parse(
            "installCoreApps: true\ngenerateAgentToken: [a]\ntrackDeployment: ~\n\
             installDefaultApps:\n  enabled: true\n",
        )
        .unwrap();
        assert!(!plan.is_enabled(Stage::InstallCoreApps));
        assert!(!plan.is_enabled(Stage::GenerateAgentToken));
        assert!(!plan.is_enabled(Stage::TrackDeployment));
        assert!(plan.is_enabled(Stage::InstallDefaultApps));
        assert!(plan.stage(Stage::InstallCoreApps).is_none());
    }

    #[test]
    fn null_and_false_are_disabled() {
        let plan = ActionPlan::parse(
            "installCoreApps:\n  enabled: ~\ninstallDefaultApps:\n  enabled: false\n",
        )
        .unwrap();
        assert!(!plan.is_enabled(Stage::InstallCoreApps));
        assert!(!plan.is_enabled(Stage::InstallDefaultApps));
    }

    #[test]
    fn unknown_stages_are_ignored() {
        let plan = ActionPlan::parse(
            "provisionCluster:\n  enabled: true\ninstallCoreApps:\n  enabled: true\n",
        )
        .unwrap();
        assert!(plan.is_enabled(Stage::InstallCoreApps));
        assert!(!plan.is_enabled(Stage::InstallDefaultApps));
    }

    #[test]
    fn empty_plan_disables_everything() {
        let plan = ActionPlan::parse("").unwrap();
        for stage in Stage::all() {
            assert!(!plan.is_enabled(*stage), "{stage} should be disabled");
        }
    }

    #[test]
    fn stage_params_are_kept() {
        let plan = ActionPlan::parse(
            "trackDeployment:\n  enabled: true\n  pollIntervalSeconds: 7\n  label: nightly\n",
        )
        .unwrap();
        let stage = plan.stage(Stage::TrackDeployment).unwrap();
        assert_eq!(stage.param_secs("pollIntervalSeconds"), Some(Duration::from_secs(7)));
        assert_eq!(stage.param_str("label"), Some("nightly"));
        assert!(!stage.params.contains_key("enabled"));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let store = FsConfigStore::new(dir.path());
        let err = ActionPlan::load(&store, Path::new("plan.yaml")).unwrap_err();
        assert!(matches!(err, StagehandError::ConfigNotFound(_)));
    }

    #[test]
    fn load_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, "installCoreApps: [unclosed").unwrap();
        let store = FsConfigStore::new(dir.path());
        let err = ActionPlan::load(&store, &path).unwrap_err();
        assert!(matches!(err, StagehandError::Config(ref m) if m.contains("plan.yaml")));
    }

    #[test]
    fn disabled_stage_never_runs_callback() {
        let plan = ActionPlan::parse("installCoreApps:\n  enabled: false\n").unwrap();
        let called = Cell::new(false);
        for stage in [Stage::InstallCoreApps, Stage::TrackDeployment] {
            let out: std::result::Result<Option<()>, String> = plan.exec_if_enabled(stage, || {
                called.set(true);
                Ok(())
            });
            assert_eq!(out, Ok(None));
        }
        assert!(!called.get());
    }

    #[test]
    fn enabled_stage_returns_callback_error_unchanged() {
        let plan = ActionPlan::parse("installCoreApps:\n  enabled: true\n").unwrap();
        let out: std::result::Result<Option<()>, String> =
            plan.exec_if_enabled(Stage::InstallCoreApps, || Err("boom".to_string()));
        assert_eq!(out, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn async_gate_respects_toggle() {
        let plan = ActionPlan::parse("trackDeployment:\n  enabled: true\n").unwrap();
        let ran: std::result::Result<Option<u32>, String> = plan
            .exec_if_enabled_async(Stage::TrackDeployment, || async { Ok(42) })
            .await;
        assert_eq!(ran, Ok(Some(42)));

        let skipped: std::result::Result<Option<u32>, String> = plan
            .exec_if_enabled_async(Stage::InstallCoreApps, || async { Ok(42) })
            .await;
        assert_eq!(skipped, Ok(None));
    }
}

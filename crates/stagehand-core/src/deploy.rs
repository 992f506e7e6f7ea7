//! Deployment pipeline: the staged run behind `stagehand deploy`.
//!
//! ```text
//! action plan ──▶ generateAgentToken ──▶ installCoreApps ──▶ installDefaultApps ──▶ trackDeployment
//!                 (extends globals)      (core groups)       (other groups)        (retry + poll)
//! ```
//!
//! Setup problems (missing files, bad YAML, unresolved placeholders) abort
//! before anything is installed. Install failures inside a group never stop
//! the group, but a group that finishes with failures stops later groups.

use crate::action_plan::{ActionPlan, Stage, StageConfig};
use crate::app::{AppConfig, AppGroup, GlobalValues, GroupPhase};
use crate::config::AgentConfig;
use crate::error::{Result, StagehandError};
use crate::install::{install_group_report, ClusterClient, GroupReport, PackageInstaller};
use crate::paths;
use crate::retry::Retry;
use crate::status::{track_until_done, AgentStatusSource, StatusUpdate};
use crate::store::ConfigStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

pub const DEFAULT_TOKEN_KEY: &str = "agentToken";
const TOKEN_LEN: usize = 32;

// ---------------------------------------------------------------------------
// TrackingOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Extra readiness probes after the first, before polling starts.
    pub readiness_attempts: u32,
    pub readiness_interval: Duration,
}

impl From<&AgentConfig> for TrackingOptions {
    fn from(agent: &AgentConfig) -> Self {
        Self {
            poll_interval: agent.poll_interval(),
            timeout: agent.timeout(),
            readiness_attempts: agent.readiness_attempts,
            readiness_interval: agent.readiness_interval(),
        }
    }
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl TrackingOptions {
    /// Stage params override the configured defaults.
    pub fn with_stage_params(&self, stage: &StageConfig) -> Self {
        Self {
            poll_interval: stage
                .param_secs("pollIntervalSeconds")
                .unwrap_or(self.poll_interval),
            timeout: stage.param_secs("timeoutSeconds").unwrap_or(self.timeout),
            readiness_attempts: stage
                .param_u64("readinessAttempts")
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
                .unwrap_or(self.readiness_attempts),
            readiness_interval: stage
                .param_secs("readinessIntervalSeconds")
                .unwrap_or(self.readiness_interval),
        }
    }
}

// ---------------------------------------------------------------------------
// DeployContext / DeploySummary
// ---------------------------------------------------------------------------

/// Collaborators for one run.
pub struct DeployContext<'a> {
    pub store: &'a dyn ConfigStore,
    pub installer: &'a dyn PackageInstaller,
    pub cluster: &'a dyn ClusterClient,
    pub status: &'a dyn AgentStatusSource,
    pub tracking: TrackingOptions,
    /// Cuts the agent readiness wait short when `true` is sent.
    pub cancel: Option<watch::Receiver<bool>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub phase: GroupPhase,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<GroupReport>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploySummary {
    pub token_generated: bool,
    pub groups: Vec<GroupSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusUpdate>,
}

// ---------------------------------------------------------------------------
// deploy_apps
// ---------------------------------------------------------------------------

pub async fn deploy_apps(
    ctx: &DeployContext<'_>,
    plan_path: &Path,
    group_paths: &[PathBuf],
) -> Result<DeploySummary> {
    let plan = ActionPlan::load(ctx.store, plan_path)?;
    let mut globals =
        GlobalValues::load(ctx.store, &paths::global_values_path(ctx.store.root()))?;
    let groups = group_paths
        .iter()
        .map(|p| AppGroup::load(ctx.store, p))
        .collect::<Result<Vec<_>>>()?;

    let mut summary = DeploySummary::default();

    let generated = plan.exec_if_enabled(Stage::GenerateAgentToken, || {
        let key = plan
            .stage(Stage::GenerateAgentToken)
            .and_then(|s| s.param_str("valueKey"))
            .unwrap_or(DEFAULT_TOKEN_KEY)
            .to_string();
        globals.insert(key.clone(), generate_token());
        info!(%key, "generated agent token");
        Ok::<_, StagehandError>(())
    })?;
    summary.token_generated = generated.is_some();

    for group in &groups {
        let stage = stage_for(group.phase);
        let report = plan
            .exec_if_enabled_async(stage, || install_app_group(ctx, group, &globals))
            .await?;
        let skipped = report.is_none();
        if skipped {
            info!(group = %group.name, %stage, "group skipped");
        }
        let failed = report
            .as_ref()
            .map(|r| r.failed().join(", "))
            .unwrap_or_default();
        summary.groups.push(GroupSummary {
            name: group.name.clone(),
            phase: group.phase,
            skipped,
            report,
        });
        if !failed.is_empty() {
            return Err(StagehandError::GroupFailed {
                group: group.name.clone(),
                failed,
                summary: Box::new(summary),
            });
        }
    }

    if let Some(stage) = plan.stage(Stage::TrackDeployment) {
        let options = ctx.tracking.with_stage_params(stage);
        summary.status = plan
            .exec_if_enabled_async(Stage::TrackDeployment, || {
                track_deployment_status(ctx.status, &options, ctx.cancel.clone())
            })
            .await?;
    }

    Ok(summary)
}

fn stage_for(phase: GroupPhase) -> Stage {
    match phase {
        GroupPhase::Core => Stage::InstallCoreApps,
        GroupPhase::Default => Stage::InstallDefaultApps,
    }
}

async fn install_app_group(
    ctx: &DeployContext<'_>,
    group: &AppGroup,
    globals: &GlobalValues,
) -> Result<GroupReport> {
    // Resolve every app before installing any, so a template error leaves
    // the cluster untouched.
    let apps = group
        .load_apps(ctx.store)?
        .iter()
        .map(|app| app.resolve(globals))
        .collect::<Result<Vec<AppConfig>>>()?;

    info!(group = %group.name, apps = apps.len(), "installing app group");
    let report = install_group_report(&apps, ctx.installer, ctx.cluster, ctx.store).await;
    if report.all_succeeded() {
        info!(group = %group.name, "app group installed");
    } else {
        warn!(group = %group.name, failed = ?report.failed(), "app group finished with failures");
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// track_deployment_status
// ---------------------------------------------------------------------------

/// Wait for the agent to answer, then poll it until the rollout reaches a
/// terminal phase or `options.timeout` passes.
pub async fn track_deployment_status(
    source: &dyn AgentStatusSource,
    options: &TrackingOptions,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<StatusUpdate> {
    if options.poll_interval.is_zero() {
        return Err(StagehandError::Config(
            "poll interval must be greater than zero".to_string(),
        ));
    }

    let mut readiness = Retry::new(options.readiness_attempts, options.readiness_interval);
    if let Some(cancel) = cancel {
        readiness = readiness.with_cancel(cancel);
    }
    readiness
        .run("agent-readiness", || source.deployment_status())
        .await?;
    info!("agent is reachable, tracking deployment");

    track_until_done(source, options.poll_interval, options.timeout).await
}

/// Random alphanumeric token for the in-cluster agent.
pub fn generate_token() -> String {
    use rand::{distributions::Alphanumeric, Rng};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{AppInstallStatus, DeploymentPhase, DeploymentStatusReport};
    use crate::store::FsConfigStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingInstaller {
        fail: Vec<String>,
        installed: Mutex<Vec<AppConfig>>,
    }

    #[async_trait]
    impl PackageInstaller for RecordingInstaller {
        async fn install(&self, app: &AppConfig) -> Result<()> {
            self.installed.lock().unwrap().push(app.clone());
            if self.fail.contains(&app.name) {
                return Err(StagehandError::Install {
                    app: app.name.clone(),
                    reason: "timed out waiting for condition".into(),
                });
            }
            Ok(())
        }
    }

    struct NoopCluster;

    #[async_trait]
    impl ClusterClient for NoopCluster {
        async fn set_namespace_privileged(&self, _namespace: &str) -> Result<()> {
            Ok(())
        }
    }

    struct DoneAgent;

    #[async_trait]
    impl AgentStatusSource for DoneAgent {
        async fn deployment_status(&self) -> Result<DeploymentStatusReport> {
            Ok(DeploymentStatusReport {
                phase: DeploymentPhase::Success,
                apps: vec![AppInstallStatus {
                    name: "ingress".into(),
                    install_status: "Installed".into(),
                }],
            })
        }
    }

    struct DownAgent {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl AgentStatusSource for DownAgent {
        async fn deployment_status(&self) -> Result<DeploymentStatusReport> {
            *self.calls.lock().unwrap() += 1;
            Err(StagehandError::Poll("connection refused".into()))
        }
    }

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn write_app(dir: &TempDir, name: &str, values: &str) {
        write(
            dir,
            &format!("config/apps/{name}.yaml"),
            &format!(
                "name: {name}\nrepo: https://charts.example.com\nchart: {name}\nversion: 1.0.0\nnamespace: {name}\nvalues:\n{values}"
            ),
        );
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(&dir, "config/global-values.yaml", "domain: example.com\n");
        write_app(&dir, "cert-manager", "  installCRDs: true\n");
        write_app(&dir, "ingress", "  host: 'ingress.{{ .domain }}'\n");
        write_app(&dir, "agent", "  token: '{{ .agentToken }}'\n");
        write(&dir, "groups/core.yaml", "[cert-manager, ingress]\n");
        write(&dir, "groups/default.yaml", "[agent]\n");
        dir
    }

    fn ctx<'a>(
        store: &'a FsConfigStore,
        installer: &'a RecordingInstaller,
        status: &'a dyn AgentStatusSource,
    ) -> DeployContext<'a> {
        DeployContext {
            store,
            installer,
            cluster: &NoopCluster,
            status,
            tracking: TrackingOptions {
                poll_interval: Duration::from_millis(5),
                timeout: Duration::from_secs(5),
                readiness_attempts: 2,
                readiness_interval: Duration::from_millis(1),
            },
            cancel: None,
        }
    }

    fn groups() -> Vec<PathBuf> {
        vec![
            PathBuf::from("groups/core.yaml"),
            PathBuf::from("groups/default.yaml"),
        ]
    }

    #[tokio::test]
    async fn full_run_installs_resolved_apps_in_order() {
        let dir = project();
        write(
            &dir,
            "plan.yaml",
            "generateAgentToken: {enabled: true}\ninstallCoreApps: {enabled: true}\n\
             installDefaultApps: {enabled: true}\ntrackDeployment: {enabled: true}\n",
        );
        let store = FsConfigStore::new(dir.path());
        let installer = RecordingInstaller::default();
        let summary = deploy_apps(&ctx(&store, &installer, &DoneAgent), Path::new("plan.yaml"), &groups())
            .await
            .unwrap();

        let installed = installer.installed.lock().unwrap();
        let names: Vec<_> = installed.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["cert-manager", "ingress", "agent"]);
        assert_eq!(
            installed[1].values["host"],
            serde_yaml::Value::from("ingress.example.com")
        );
        let token = installed[2].values["token"].as_str().unwrap();
        assert_eq!(token.len(), TOKEN_LEN);

        assert!(summary.token_generated);
        assert_eq!(summary.groups.len(), 2);
        assert!(summary.status.unwrap().completed);
        assert!(dir.path().join(".stagehand/tmp/apps/agent.yaml").exists());
    }

    #[tokio::test]
    async fn disabled_stages_install_nothing() {
        let dir = project();
        write(&dir, "plan.yaml", "installCoreApps: {enabled: false}\n");
        let store = FsConfigStore::new(dir.path());
        let installer = RecordingInstaller::default();
        let summary = deploy_apps(&ctx(&store, &installer, &DoneAgent), Path::new("plan.yaml"), &groups())
            .await
            .unwrap();
        assert!(installer.installed.lock().unwrap().is_empty());
        assert!(summary.groups.iter().all(|g| g.skipped));
        assert!(summary.status.is_none());
    }

    #[tokio::test]
    async fn missing_token_aborts_before_installing_the_group() {
        let dir = project();
        write(
            &dir,
            "plan.yaml",
            "installCoreApps: {enabled: false}\ninstallDefaultApps: {enabled: true}\n",
        );
        let store = FsConfigStore::new(dir.path());
        let installer = RecordingInstaller::default();
        let err = deploy_apps(&ctx(&store, &installer, &DoneAgent), Path::new("plan.yaml"), &groups())
            .await
            .unwrap_err();
        assert!(matches!(err, StagehandError::Template(ref m) if m.contains("agentToken")));
        assert!(installer.installed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_group_stops_later_groups() {
        let dir = project();
        write(
            &dir,
            "plan.yaml",
            "generateAgentToken: {enabled: true}\ninstallCoreApps: {enabled: true}\ninstallDefaultApps: {enabled: true}\n",
        );
        let store = FsConfigStore::new(dir.path());
        let installer = RecordingInstaller {
            fail: vec!["cert-manager".into()],
            ..Default::default()
        };
        let err = deploy_apps(&ctx(&store, &installer, &DoneAgent), Path::new("plan.yaml"), &groups())
            .await
            .unwrap_err();
        match err {
            StagehandError::GroupFailed {
                group,
                failed,
                summary,
            } => {
                assert_eq!(group, "core");
                assert_eq!(failed, "cert-manager");
                assert!(summary.token_generated);
                assert_eq!(summary.groups.len(), 1);
                let report = summary.groups[0].report.as_ref().unwrap();
                assert_eq!(report.failed(), vec!["cert-manager"]);
                assert_eq!(report.apps.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let installed = installer.installed.lock().unwrap();
        let names: Vec<_> = installed.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["cert-manager", "ingress"]);
    }

    #[tokio::test]
    async fn missing_plan_is_config_error() {
        let dir = project();
        let store = FsConfigStore::new(dir.path());
        let installer = RecordingInstaller::default();
        let err = deploy_apps(&ctx(&store, &installer, &DoneAgent), Path::new("absent.yaml"), &groups())
            .await
            .unwrap_err();
        assert!(matches!(err, StagehandError::ConfigNotFound(_)));
    }

    #[tokio::test]
    async fn readiness_wait_gives_up_after_attempts() {
        let agent = DownAgent {
            calls: Mutex::new(0),
        };
        let options = TrackingOptions {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
            readiness_attempts: 3,
            readiness_interval: Duration::from_millis(1),
        };
        let err = track_deployment_status(&agent, &options, None).await.unwrap_err();
        assert!(matches!(err, StagehandError::Poll(_)));
        assert_eq!(*agent.calls.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn zero_poll_interval_is_rejected() {
        let options = TrackingOptions {
            poll_interval: Duration::ZERO,
            ..TrackingOptions::default()
        };
        assert!(track_deployment_status(&DoneAgent, &options, None).await.is_err());
    }

    #[test]
    fn stage_params_override_tracking_defaults() {
        let plan = ActionPlan::parse(
            "trackDeployment:\n  enabled: true\n  pollIntervalSeconds: 3\n  readinessAttempts: 1\n",
        )
        .unwrap();
        let options = TrackingOptions::default()
            .with_stage_params(plan.stage(Stage::TrackDeployment).unwrap());
        assert_eq!(options.poll_interval, Duration::from_secs(3));
        assert_eq!(options.readiness_attempts, 1);
        assert_eq!(options.timeout, TrackingOptions::default().timeout);
    }

    #[test]
    fn tokens_are_random_alphanumeric() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}

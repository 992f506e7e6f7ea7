//! Sequential, best-effort installation of an app group.
//!
//! Apps inside a group are independent, so a failure never stops the loop:
//! every app gets its install attempt, in order, and the group reports
//! success only when every install and every post-install step succeeded.
//! A post-install failure does not roll the chart back.

use crate::app::{AppConfig, InstalledRecord};
use crate::error::{Result, StagehandError};
use crate::store::ConfigStore;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install (or upgrade) one app from fully-resolved values.
    async fn install(&self, app: &AppConfig) -> Result<()>;
}

#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn set_namespace_privileged(&self, namespace: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AppOutcome {
    Installed,
    InstallFailed { reason: String },
    /// Chart is installed but the record could not be written.
    PersistFailed { reason: String },
    /// Chart is installed but the namespace was not marked privileged.
    PrivilegeFailed { reason: String },
}

impl AppOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AppOutcome::Installed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppResult {
    pub name: String,
    #[serde(flatten)]
    pub outcome: AppOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub apps: Vec<AppResult>,
}

impl GroupReport {
    /// True iff every app and post-step succeeded; vacuously true when empty.
    pub fn all_succeeded(&self) -> bool {
        self.apps.iter().all(|a| a.outcome.is_success())
    }

    pub fn failed(&self) -> Vec<&str> {
        self.apps
            .iter()
            .filter(|a| !a.outcome.is_success())
            .map(|a| a.name.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// install_group
// ---------------------------------------------------------------------------

pub async fn install_group(
    apps: &[AppConfig],
    installer: &dyn PackageInstaller,
    cluster: &dyn ClusterClient,
    store: &dyn ConfigStore,
) -> bool {
    install_group_report(apps, installer, cluster, store)
        .await
        .all_succeeded()
}

/// Like [`install_group`], keeping the per-app outcome.
pub async fn install_group_report(
    apps: &[AppConfig],
    installer: &dyn PackageInstaller,
    cluster: &dyn ClusterClient,
    store: &dyn ConfigStore,
) -> GroupReport {
    let mut report = GroupReport::default();
    for app in apps {
        let outcome = install_one(app, installer, cluster, store).await;
        report.apps.push(AppResult {
            name: app.name.clone(),
            outcome,
        });
    }
    report
}

async fn install_one(
    app: &AppConfig,
    installer: &dyn PackageInstaller,
    cluster: &dyn ClusterClient,
    store: &dyn ConfigStore,
) -> AppOutcome {
    info!(app = %app.name, chart = %app.chart, version = %app.version, namespace = %app.namespace, "installing");
    if let Err(e) = installer.install(app).await {
        error!(app = %app.name, error = %e, "install failed");
        return AppOutcome::InstallFailed {
            reason: e.to_string(),
        };
    }

    let mut outcome = AppOutcome::Installed;

    if let Err(e) = persist_record(app, store) {
        warn!(app = %app.name, error = %e, "installed but record not persisted");
        outcome = AppOutcome::PersistFailed {
            reason: e.to_string(),
        };
    }

    if app.privileged_namespace {
        if let Err(e) = cluster.set_namespace_privileged(&app.namespace).await {
            warn!(app = %app.name, namespace = %app.namespace, error = %e, "could not mark namespace privileged");
            if outcome.is_success() {
                outcome = AppOutcome::PrivilegeFailed {
                    reason: e.to_string(),
                };
            }
        }
    }

    if outcome.is_success() {
        info!(app = %app.name, "installed");
    }
    outcome
}

fn persist_record(app: &AppConfig, store: &dyn ConfigStore) -> Result<()> {
    let record = InstalledRecord::new(app.clone());
    let data = serde_yaml::to_string(&record).map_err(|e| StagehandError::Persist {
        app: app.name.clone(),
        reason: e.to_string(),
    })?;
    store
        .write_installed_record(&app.name, data.as_bytes())
        .map_err(|e| StagehandError::Persist {
            app: app.name.clone(),
            reason: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

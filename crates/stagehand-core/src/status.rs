//! Deployment status aggregation.
//!
//! The remote agent reports an overall phase plus a per-app install status.
//! `classify` turns one report into a human-readable line and decides whether
//! the rollout has reached a terminal phase; `track_until_done` polls until it
//! has, or until the deadline passes.
//!
//! ```text
//! first poll ──▶ ONGOING ──(next poll)──▶ ONGOING | SUCCESS | FAILED
//!                                          terminal: SUCCESS, FAILED
//! ```

use crate::error::{Result, StagehandError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

pub const STATUS_INSTALLED: &str = "Installed";
pub const STATUS_INSTALLATION_FAILED: &str = "Installation Failed";

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentPhase {
    Ongoing,
    Success,
    Failed,
    /// Any phase string this client does not recognise.
    #[serde(other)]
    Unknown,
}

impl DeploymentPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentPhase::Success | DeploymentPhase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstallStatus {
    pub name: String,
    pub install_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatusReport {
    pub phase: DeploymentPhase,
    #[serde(default)]
    pub apps: Vec<AppInstallStatus>,
}

#[async_trait]
pub trait AgentStatusSource: Send + Sync {
    async fn deployment_status(&self) -> Result<DeploymentStatusReport>;
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub completed: bool,
    pub message: String,
}

pub fn classify(report: &DeploymentStatusReport) -> StatusUpdate {
    let mut deployed = Vec::new();
    let mut failed = Vec::new();
    let mut ongoing = Vec::new();
    for app in &report.apps {
        match app.install_status.as_str() {
            STATUS_INSTALLED => deployed.push(app.name.as_str()),
            STATUS_INSTALLATION_FAILED => failed.push(app.name.as_str()),
            _ => ongoing.push(app.name.as_str()),
        }
    }

    let total = report.apps.len();
    let counts = |verb: &str| {
        let mut line = format!("{verb} applications, {}/{total} deployed", deployed.len());
        if !failed.is_empty() {
            line.push_str(&format!(", {} failed", failed.len()));
        }
        line
    };

    if !report.phase.is_terminal() {
        return StatusUpdate {
            completed: false,
            message: counts("Deploying"),
        };
    }

    let mut message = counts("Deployed");
    for (heading, names) in [
        ("Deployed Apps:", &deployed),
        ("Failed Apps:", &failed),
        ("Ongoing Apps:", &ongoing),
    ] {
        if names.is_empty() {
            continue;
        }
        message.push('\n');
        message.push_str(heading);
        for name in names.iter() {
            message.push('\n');
            message.push_str(name);
        }
    }
    StatusUpdate {
        completed: true,
        message,
    }
}

// ---------------------------------------------------------------------------
// track_until_done
// ---------------------------------------------------------------------------

/// Poll `source` every `poll_interval` until it reports a terminal phase.
///
/// A failed poll is logged and the loop waits for the next tick. Returns
/// [`StagehandError::Timeout`], carrying the last message seen, when no
/// terminal phase arrives before `timeout`.
pub async fn track_until_done(
    source: &dyn AgentStatusSource,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<StatusUpdate> {
    let started = Instant::now();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_message = String::from("no status received");

    loop {
        tokio::select! {
            _ = &mut deadline => {
                warn!(
                    elapsed_secs = started.elapsed().as_secs(),
                    last = %last_message,
                    "timed out waiting for deployment to finish"
                );
                return Err(StagehandError::Timeout {
                    elapsed: started.elapsed(),
                    last_message,
                });
            }
            _ = ticker.tick() => {
                let report = match source.deployment_status().await {
                    Ok(report) => report,
                    Err(e) => {
                        warn!(error = %e, "deployment status poll failed");
                        continue;
                    }
                };
                let update = classify(&report);
                info!("{}", update.message);
                if update.completed {
                    return Ok(update);
                }
                last_message = update.message;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

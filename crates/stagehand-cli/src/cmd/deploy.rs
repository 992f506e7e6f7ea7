use crate::output::{print_json, print_table};
use anyhow::Context;
use stagehand_cli::{HelmInstaller, HttpStatusSource, KubectlClient};
use stagehand_core::config::Config;
use stagehand_core::deploy::{deploy_apps, DeployContext, DeploySummary, TrackingOptions};
use stagehand_core::install::AppOutcome;
use stagehand_core::store::FsConfigStore;
use stagehand_core::StagehandError;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

pub fn run(
    root: &Path,
    plan: &Path,
    groups: &[PathBuf],
    token: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load stagehand.yaml")?;
    let store = FsConfigStore::new(root);
    let installer = HelmInstaller::new(&config.helm, config.kubectl.context.clone());
    let cluster = KubectlClient::new(&config.kubectl);
    let status = HttpStatusSource::new(&config.agent.url, token)?;

    // Paths on the command line are relative to the shell, not the project root.
    let plan = std::path::absolute(plan)?;
    let groups = groups
        .iter()
        .map(std::path::absolute)
        .collect::<std::io::Result<Vec<_>>>()?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = cancel_tx.send(true);
            }
        });

        let ctx = DeployContext {
            store: &store,
            installer: &installer,
            cluster: &cluster,
            status: &status,
            tracking: TrackingOptions::from(&config.agent),
            cancel: Some(cancel_rx),
        };
        deploy_apps(&ctx, &plan, &groups).await
    });

    match result {
        Ok(summary) => report(&summary, json),
        // Show the per-app outcomes up to the failing group before exiting.
        Err(StagehandError::GroupFailed {
            group,
            failed,
            summary,
        }) => {
            report(&summary, json)?;
            anyhow::bail!("app group '{group}' finished with failures: {failed}")
        }
        Err(e) => Err(e.into()),
    }
}

fn report(summary: &DeploySummary, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(summary);
    }
    print_summary(summary);
    Ok(())
}

fn print_summary(summary: &DeploySummary) {
    if summary.token_generated {
        println!("Generated agent token.");
    }

    let mut rows = Vec::new();
    for group in &summary.groups {
        let Some(report) = &group.report else {
            rows.push(vec![
                group.name.clone(),
                "-".to_string(),
                "skipped".to_string(),
                String::new(),
            ]);
            continue;
        };
        for app in &report.apps {
            let (status, detail) = match &app.outcome {
                AppOutcome::Installed => ("installed", String::new()),
                AppOutcome::InstallFailed { reason } => ("install failed", reason.clone()),
                AppOutcome::PersistFailed { reason } => ("record not saved", reason.clone()),
                AppOutcome::PrivilegeFailed { reason } => ("privilege failed", reason.clone()),
            };
            rows.push(vec![
                group.name.clone(),
                app.name.clone(),
                status.to_string(),
                detail,
            ]);
        }
    }
    if rows.is_empty() {
        println!("No app groups given.");
    } else {
        print_table(&["GROUP", "APP", "STATUS", "DETAIL"], rows);
    }

    if let Some(status) = &summary.status {
        println!();
        println!("{}", status.message);
    }
}

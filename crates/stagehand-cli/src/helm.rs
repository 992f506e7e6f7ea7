//! `helm upgrade --install` driver.

use async_trait::async_trait;
use stagehand_core::app::AppConfig;
use stagehand_core::config::HelmConfig;
use stagehand_core::install::PackageInstaller;
use stagehand_core::{Result, StagehandError};
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HelmInstaller {
    binary: String,
    timeout_seconds: u64,
    wait: bool,
    kube_context: Option<String>,
}

impl HelmInstaller {
    pub fn new(config: &HelmConfig, kube_context: Option<String>) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout_seconds: config.timeout_seconds,
            wait: config.wait,
            kube_context,
        }
    }

    pub fn args(&self, app: &AppConfig, values_file: &Path) -> Vec<String> {
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            app.release().to_string(),
            app.chart.clone(),
            "--repo".to_string(),
            app.repo.clone(),
            "--version".to_string(),
            app.version.clone(),
            "--namespace".to_string(),
            app.namespace.clone(),
            "--values".to_string(),
            values_file.display().to_string(),
            "--timeout".to_string(),
            format!("{}s", self.timeout_seconds),
        ];
        if app.create_namespace {
            args.push("--create-namespace".to_string());
        }
        if self.wait {
            args.push("--wait".to_string());
        }
        if let Some(ctx) = &self.kube_context {
            args.push("--kube-context".to_string());
            args.push(ctx.clone());
        }
        args
    }
}

#[async_trait]
impl PackageInstaller for HelmInstaller {
    async fn install(&self, app: &AppConfig) -> Result<()> {
        let install_err = |reason: String| StagehandError::Install {
            app: app.name.clone(),
            reason,
        };

        let values = serde_yaml::to_string(&app.values)?;
        let mut values_file =
            tempfile::NamedTempFile::new().map_err(|e| install_err(e.to_string()))?;
        values_file
            .write_all(values.as_bytes())
            .map_err(|e| install_err(e.to_string()))?;

        let args = self.args(app, values_file.path());
        debug!(app = %app.name, binary = %self.binary, ?args, "running helm");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| install_err(format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(install_err(stderr.trim().to_string()));
        }
        Ok(())
    }
}

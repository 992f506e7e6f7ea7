//! Namespace labelling through `kubectl`.

use async_trait::async_trait;
use stagehand_core::config::KubectlConfig;
use stagehand_core::install::ClusterClient;
use stagehand_core::{Result, StagehandError};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Pod Security Admission modes set to `privileged`.
const PSA_MODES: [&str; 3] = ["enforce", "audit", "warn"];

#[derive(Debug, Clone)]
pub struct KubectlClient {
    binary: String,
    context: Option<String>,
}

impl KubectlClient {
    pub fn new(config: &KubectlConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            context: config.context.clone(),
        }
    }

    pub fn privileged_args(&self, namespace: &str) -> Vec<String> {
        let mut args = vec![
            "label".to_string(),
            "--overwrite".to_string(),
            "namespace".to_string(),
            namespace.to_string(),
        ];
        args.extend(
            PSA_MODES
                .iter()
                .map(|mode| format!("pod-security.kubernetes.io/{mode}=privileged")),
        );
        if let Some(ctx) = &self.context {
            args.push("--context".to_string());
            args.push(ctx.clone());
        }
        args
    }
}

#[async_trait]
impl ClusterClient for KubectlClient {
    async fn set_namespace_privileged(&self, namespace: &str) -> Result<()> {
        let privilege_err = |reason: String| StagehandError::Privilege {
            namespace: namespace.to_string(),
            reason,
        };
        let args = self.privileged_args(namespace);
        debug!(%namespace, ?args, "labelling namespace");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| privilege_err(format!("failed to run {}: {e}", self.binary)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(privilege_err(stderr.trim().to_string()));
        }
        Ok(())
    }
}

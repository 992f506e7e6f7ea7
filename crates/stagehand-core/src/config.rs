use crate::error::{Result, StagehandError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// HelmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmConfig {
    #[serde(default = "default_helm_binary")]
    pub binary: String,
    /// Passed to `helm --timeout`; also bounds `--wait`.
    #[serde(default = "default_helm_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub wait: bool,
}

fn default_helm_binary() -> String {
    "helm".to_string()
}

fn default_helm_timeout() -> u64 {
    600
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            binary: default_helm_binary(),
            timeout_seconds: default_helm_timeout(),
            wait: false,
        }
    }
}

// ---------------------------------------------------------------------------
// KubectlConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubectlConfig {
    #[serde(default = "default_kubectl_binary")]
    pub binary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn default_kubectl_binary() -> String {
    "kubectl".to_string()
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            binary: default_kubectl_binary(),
            context: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

/// Where the in-cluster agent reports rollout status, and how to wait on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default = "default_agent_url")]
    pub url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_track_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_readiness_attempts")]
    pub readiness_attempts: u32,
    #[serde(default = "default_readiness_interval")]
    pub readiness_interval_seconds: u64,
}

fn default_agent_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_track_timeout() -> u64 {
    1800
}

fn default_readiness_attempts() -> u32 {
    30
}

fn default_readiness_interval() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: default_agent_url(),
            poll_interval_seconds: default_poll_interval(),
            timeout_seconds: default_track_timeout(),
            readiness_attempts: default_readiness_attempts(),
            readiness_interval_seconds: default_readiness_interval(),
        }
    }
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_interval_seconds)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub helm: HelmConfig,
    #[serde(default)]
    pub kubectl: KubectlConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Config {
    /// Load `stagehand.yaml` from `root`, falling back to defaults when the
    /// file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&data)
            .map_err(|e| StagehandError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.agent.poll_interval_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "agent.pollIntervalSeconds must be greater than zero".to_string(),
            });
        }

        if self.agent.timeout_seconds < self.agent.poll_interval_seconds {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "agent.timeoutSeconds ({}) is shorter than agent.pollIntervalSeconds ({}) \
                     so tracking times out before the second poll",
                    self.agent.timeout_seconds, self.agent.poll_interval_seconds
                ),
            });
        }

        if !self.agent.url.starts_with("http://") && !self.agent.url.starts_with("https://") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("agent.url '{}' is not an http(s) URL", self.agent.url),
            });
        }

        for (key, binary) in [
            ("helm.binary", &self.helm.binary),
            ("kubectl.binary", &self.kubectl.binary),
        ] {
            if which::which(binary).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{key} '{binary}' not found on PATH"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.helm.binary, "helm");
        assert_eq!(cfg.agent.poll_interval_seconds, 10);
        assert_eq!(cfg.agent.readiness_attempts, 30);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("stagehand.yaml"),
            "agent:\n  url: https://agent.internal\n  timeoutSeconds: 60\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.agent.url, "https://agent.internal");
        assert_eq!(cfg.agent.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.agent.poll_interval(), Duration::from_secs(10));
        assert_eq!(cfg.kubectl.binary, "kubectl");
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("stagehand.yaml"), "agent: [oops").unwrap();
        assert!(matches!(
            Config::load(dir.path()).unwrap_err(),
            StagehandError::Config(_)
        ));
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.helm.wait = true;
        cfg.kubectl.context = Some("staging".into());
        cfg.save(dir.path()).unwrap();
        let back = Config::load(dir.path()).unwrap();
        assert!(back.helm.wait);
        assert_eq!(back.kubectl.context.as_deref(), Some("staging"));
    }

    #[test]
    fn validate_flags_bad_agent_settings() {
        let mut cfg = Config::default();
        cfg.agent.poll_interval_seconds = 0;
        cfg.agent.url = "agent:8080".into();
        let warnings = cfg.validate();
        let errors: Vec<_> = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .collect();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn validate_warns_on_short_timeout() {
        let mut cfg = Config::default();
        cfg.agent.timeout_seconds = 5;
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("shorter than")));
    }

    #[test]
    fn validate_warns_on_missing_binary() {
        let mut cfg = Config::default();
        cfg.helm.binary = "definitely-not-a-real-helm-binary".into();
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("helm.binary")));
    }
}

use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use stagehand_core::config::{Config, WarnLevel};
use stagehand_core::paths;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a stagehand.yaml with every default spelled out
    Init {
        /// Overwrite an existing stagehand.yaml
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration (file merged over defaults)
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init { force } => init(root, force),
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(root: &Path, force: bool) -> anyhow::Result<()> {
    let path = paths::config_path(root);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default()
        .save(root)
        .context("failed to write stagehand.yaml")?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    if json {
        return print_json(&config);
    }

    println!("helm:");
    println!("  binary:          {}", config.helm.binary);
    println!("  timeout:         {}s", config.helm.timeout_seconds);
    println!("  wait:            {}", config.helm.wait);
    println!("kubectl:");
    println!("  binary:          {}", config.kubectl.binary);
    println!(
        "  context:         {}",
        config.kubectl.context.as_deref().unwrap_or("(current)")
    );
    println!("agent:");
    println!("  url:             {}", config.agent.url);
    println!("  poll interval:   {}s", config.agent.poll_interval_seconds);
    println!("  timeout:         {}s", config.agent.timeout_seconds);
    println!(
        "  readiness:       {} attempts, {}s apart",
        config.agent.readiness_attempts, config.agent.readiness_interval_seconds
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}

use crate::output::print_json;
use anyhow::Context;
use stagehand_cli::HttpStatusSource;
use stagehand_core::config::Config;
use stagehand_core::deploy::TrackingOptions;
use stagehand_core::status::{classify, AgentStatusSource};
use stagehand_core::track_deployment_status;
use std::path::Path;
use std::time::Duration;

pub struct StatusArgs {
    pub once: bool,
    pub poll_interval: Option<u64>,
    pub timeout: Option<u64>,
    pub token: Option<String>,
}

pub fn run(root: &Path, args: StatusArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load stagehand.yaml")?;
    let source = HttpStatusSource::new(&config.agent.url, args.token)?;

    let mut options = TrackingOptions::from(&config.agent);
    if let Some(secs) = args.poll_interval {
        options.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.timeout {
        options.timeout = Duration::from_secs(secs);
    }

    let rt = tokio::runtime::Runtime::new()?;
    let update = rt.block_on(async {
        if args.once {
            let report = source.deployment_status().await?;
            Ok(classify(&report))
        } else {
            track_deployment_status(&source, &options, None).await
        }
    })?;

    if json {
        return print_json(&update);
    }
    println!("{}", update.message);
    Ok(())
}

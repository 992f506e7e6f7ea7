use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use stagehand_core::app::list_installed;
use stagehand_core::store::FsConfigStore;
use std::path::Path;

#[derive(Subcommand)]
pub enum AppsSubcommand {
    /// List apps recorded as installed by previous deploys
    List,
}

pub fn run(root: &Path, subcmd: AppsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        AppsSubcommand::List => list(root, json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = FsConfigStore::new(root);
    let records = list_installed(&store).context("failed to read installed records")?;

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No installed apps.");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.app.name.clone(),
                r.app.chart.clone(),
                r.app.version.clone(),
                r.app.namespace.clone(),
                r.installed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "CHART", "VERSION", "NAMESPACE", "INSTALLED"], rows);
    Ok(())
}

use crate::output::print_json;
use anyhow::Context;
use serde_yaml::{Mapping, Value};
use stagehand_core::app::GlobalValues;
use stagehand_core::paths;
use stagehand_core::store::FsConfigStore;
use std::path::{Path, PathBuf};

/// Resolve `{{ .key }}` placeholders in a YAML file and print the result.
///
/// Values come from `--values` (default: the project's global values file),
/// with `--set key=value` pairs layered on top.
pub fn run(
    root: &Path,
    template: &Path,
    values: Option<PathBuf>,
    set: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(template)
        .with_context(|| format!("failed to read {}", template.display()))?;
    let template_map: Mapping = match serde_yaml::from_str::<Value>(&data)
        .with_context(|| format!("{} is not valid YAML", template.display()))?
    {
        Value::Mapping(m) => m,
        Value::Null => Mapping::new(),
        _ => anyhow::bail!("{} must contain a YAML mapping", template.display()),
    };

    // An explicit --values path is relative to the shell, not the project root.
    let values_path = match values {
        Some(path) => std::path::absolute(path)?,
        None => paths::global_values_path(root),
    };
    let store = FsConfigStore::new(root);
    let mut globals = GlobalValues::load(&store, &values_path)
        .with_context(|| format!("failed to load values from {}", values_path.display()))?;
    for pair in set {
        let (key, raw) = parse_set(pair)?;
        globals.insert(key, raw);
    }

    let rendered = stagehand_core::resolve_template(&template_map, globals.as_mapping())
        .with_context(|| format!("failed to render {}", template.display()))?;

    if json {
        return print_json(&rendered);
    }
    print!("{}", serde_yaml::to_string(&rendered)?);
    Ok(())
}

/// Split `key=value`, reading the value as a YAML scalar so `--set replicas=3`
/// stays a number.
fn parse_set(pair: &str) -> anyhow::Result<(&str, Value)> {
    let Some((key, raw)) = pair.split_once('=') else {
        anyhow::bail!("--set expects key=value, got '{pair}'");
    };
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("--set key must not be empty in '{pair}'");
    }
    let value =
        serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key, value))
}

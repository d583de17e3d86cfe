use crate::output::{preview, print_json, print_table};
use anyhow::Context;
use cmdpack_core::config::Config;
use cmdpack_core::registry::{CommandPackRegistry, FsRegistry};
use cmdpack_core::value::to_text;
use std::path::Path;

pub fn run(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let registry = FsRegistry::from_config(root, &config);
    let pack = registry
        .load(slug)
        .with_context(|| format!("failed to load command pack '{slug}'"))?
        .ok_or_else(|| anyhow::anyhow!("command not found: {slug}"))?;

    if json {
        return print_json(&*pack);
    }

    let manifest = &pack.manifest;
    println!("{}", manifest.name.as_deref().unwrap_or(&pack.slug));
    if let Some(desc) = &manifest.description {
        println!("{desc}");
    }
    if let Some(version) = &manifest.version {
        println!("version: {version}");
    }
    if !pack.prompts.is_empty() {
        let keys: Vec<&str> = pack.prompts.keys().map(String::as_str).collect();
        println!("prompts: {}", keys.join(", "));
    }
    println!();

    let rows: Vec<Vec<String>> = manifest
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let config: Vec<String> = step
                .config
                .iter()
                .map(|(k, v)| format!("{k}={}", to_text(v)))
                .collect();
            vec![
                (i + 1).to_string(),
                step.id.clone().unwrap_or_else(|| "-".to_string()),
                step.step_type.clone(),
                preview(&config.join(" "), 60),
            ]
        })
        .collect();
    print_table(&["#", "ID", "TYPE", "CONFIG"], &rows);
    Ok(())
}

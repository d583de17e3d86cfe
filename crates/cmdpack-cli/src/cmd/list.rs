use crate::output::{print_json, print_table};
use anyhow::Context;
use cmdpack_core::config::Config;
use cmdpack_core::registry::{CommandPackRegistry, FsRegistry};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct PackSummary {
    slug: String,
    name: Option<String>,
    description: Option<String>,
    steps: usize,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let registry = FsRegistry::from_config(root, &config);

    let mut packs = Vec::new();
    for slug in registry.list().context("failed to list command packs")? {
        let pack = registry
            .load(&slug)
            .with_context(|| format!("failed to load command pack '{slug}'"))?;
        if let Some(pack) = pack {
            packs.push(PackSummary {
                slug,
                name: pack.manifest.name.clone(),
                description: pack.manifest.description.clone(),
                steps: pack.manifest.steps.len(),
            });
        }
    }

    if json {
        return print_json(&packs);
    }
    if packs.is_empty() {
        println!(
            "No command packs in {}. Run `cmdpack init` to create one.",
            registry.commands_dir().display()
        );
        return Ok(());
    }
    let rows: Vec<Vec<String>> = packs
        .into_iter()
        .map(|p| {
            vec![
                p.slug,
                p.name.unwrap_or_default(),
                p.steps.to_string(),
                p.description.unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["SLUG", "NAME", "STEPS", "DESCRIPTION"], &rows);
    Ok(())
}

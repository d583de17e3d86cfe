use anyhow::Context;
use cmdpack_core::{config::Config, io, paths};
use std::path::Path;

pub const HELLO_SLUG: &str = "hello";

const HELLO_MANIFEST: &str = r#"name: Hello
description: Greet the caller and announce the greeting
version: "1"
steps:
  - id: greet
    type: transform
    template: "Hello, {{ ctx.name | default:'world' | capitalize }}!"
  - id: announce
    type: notify
    channel: log
    message: "{{ steps.greet.output }} ({{ prompts.tone | trim }})"
"#;

const HELLO_TONE_PROMPT: &str = "friendly\n";

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing cmdpack in: {}", root.display());

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    let config = Config::load(root).context("failed to load config")?;
    let commands = config.commands_path(root);
    io::ensure_dir(&commands)
        .with_context(|| format!("failed to create {}", commands.display()))?;

    let files = [
        (paths::pack_manifest(&commands, HELLO_SLUG), HELLO_MANIFEST),
        (
            paths::pack_prompts_dir(&commands, HELLO_SLUG).join("tone.md"),
            HELLO_TONE_PROMPT,
        ),
    ];
    for (path, body) in files {
        let rel = path.strip_prefix(root).unwrap_or(&path).display().to_string();
        if io::write_if_missing(&path, body.as_bytes())
            .with_context(|| format!("failed to write {rel}"))?
        {
            println!("  created: {rel}");
        } else {
            println!("  exists:  {rel}");
        }
    }

    println!("\nTry: cmdpack run {HELLO_SLUG} --input '{{\"name\": \"ada\"}}'");
    Ok(())
}

use crate::output::{preview, print_json};
use anyhow::Context;
use cmdpack_core::config::Config;
use cmdpack_core::value::to_text;
use cmdpack_core::{ExecutionTrace, Runner};
use std::path::Path;

pub fn run(
    root: &Path,
    slug: &str,
    input: Option<&str>,
    input_file: Option<&Path>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let input = super::read_input(input, input_file)?;
    let runner = Runner::from_config(root, &config);

    let trace = runner.execute(slug, input, dry_run);

    if json {
        print_json(&trace)?;
    } else {
        print_trace(&trace);
    }

    match &trace.error {
        Some(error) if !trace.success => anyhow::bail!("command '{slug}' failed: {error}"),
        _ => Ok(()),
    }
}

fn print_trace(trace: &ExecutionTrace) {
    let mode = if trace.dry_run { " (dry run)" } else { "" };
    println!("{}{mode}", trace.command);
    for step in &trace.steps {
        let mark = if step.success { "ok  " } else { "FAIL" };
        println!(
            "  [{mark}] {} ({}) {:.1}ms",
            step.id, step.step_type, step.duration_ms
        );
        match &step.error {
            Some(error) => println!("         error: {error}"),
            None => println!("         {}", preview(&to_text(&step.output), 100)),
        }
    }
    if trace.success {
        println!("done: {} step(s)", trace.steps.len());
    }
}

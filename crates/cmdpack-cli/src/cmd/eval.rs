use crate::output::print_json;
use anyhow::Context;
use cmdpack_core::config::Config;
use cmdpack_core::context::ExecutionContext;
use cmdpack_core::template::TemplateEngine;
use std::path::Path;

/// Prints the truthiness of `condition` as `true` or `false`.
pub fn run(
    root: &Path,
    condition: &str,
    input: Option<&str>,
    input_file: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let input = super::read_input(input, input_file)?;
    let engine = TemplateEngine::new(config.templates.clone());
    let cx = ExecutionContext::new(input).with_env(&config.env.allow);

    let result = engine.evaluate_condition(condition, &cx);
    if json {
        print_json(&serde_json::json!({ "condition": condition, "result": result }))
    } else {
        println!("{result}");
        Ok(())
    }
}

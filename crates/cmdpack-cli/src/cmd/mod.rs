pub mod config;
pub mod eval;
pub mod init;
pub mod list;
pub mod render;
pub mod run;
pub mod show;

use anyhow::Context;
use serde_json::Value;
use std::path::Path;

/// Caller input from `--input` (JSON or YAML text) or `--input-file`.
/// Defaults to an empty object.
pub fn read_input(input: Option<&str>, input_file: Option<&Path>) -> anyhow::Result<Value> {
    let text = match (input, input_file) {
        (Some(_), Some(_)) => anyhow::bail!("--input and --input-file are mutually exclusive"),
        (Some(text), None) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => return Ok(Value::Object(Default::default())),
    };
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_yaml::from_str(&text).context("input is not valid JSON or YAML")
}

//! Command packs: YAML manifests of typed steps plus optional prompt files.
//!
//! On disk a pack lives at `<commands_dir>/<slug>/command.yaml`, with prompt
//! text under `<slug>/prompts/*.md` or `*.txt` keyed by file stem.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::Config;
use crate::error::{CmdpackError, Result};
use crate::paths;

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepDeclaration>,
}

/// One step: `id`, `type`, and every other key as handler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl StepDeclaration {
    pub fn new(id: Option<&str>, step_type: &str, config: Value) -> Self {
        Self {
            id: id.map(str::to_string),
            step_type: step_type.to_string(),
            config: match config {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

impl Manifest {
    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Structural checks: every step has a type and declared ids are unique.
    /// `slug` names the pack in errors.
    pub fn validate(&self, slug: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.step_type.trim().is_empty() {
                return Err(CmdpackError::InvalidManifest {
                    slug: slug.to_string(),
                    reason: format!("step {index} has an empty type"),
                });
            }
            if let Some(id) = &step.id {
                if !seen.insert(id.as_str()) {
                    return Err(CmdpackError::DuplicateStepId(id.clone()));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CommandPack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandPack {
    pub slug: String,
    pub manifest: Manifest,
    /// File stem → prompt text.
    pub prompts: BTreeMap<String, String>,
}

impl CommandPack {
    pub fn new(slug: &str, manifest: Manifest) -> Self {
        Self {
            slug: slug.to_string(),
            manifest,
            prompts: BTreeMap::new(),
        }
    }

    pub fn with_prompt(mut self, key: &str, text: &str) -> Self {
        self.prompts.insert(key.to_string(), text.to_string());
        self
    }
}

// ---------------------------------------------------------------------------
// Registry trait
// ---------------------------------------------------------------------------

pub trait CommandPackRegistry: Send + Sync {
    /// `Ok(None)` when no pack with this slug exists.
    fn load(&self, slug: &str) -> Result<Option<Arc<CommandPack>>>;

    /// Slugs of every available pack, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// FsRegistry
// ---------------------------------------------------------------------------

/// Packs loaded from a commands directory. Parsed packs are cached by slug
/// for the lifetime of the registry.
#[derive(Debug)]
pub struct FsRegistry {
    commands_dir: PathBuf,
    cache: Mutex<BTreeMap<String, Arc<CommandPack>>>,
}

impl FsRegistry {
    pub fn new(commands_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands_dir: commands_dir.into(),
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self::new(config.commands_path(root))
    }

    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    /// Drop cached packs so the next `load` re-reads the disk.
    pub fn invalidate(&self) {
        lock(&self.cache).clear();
    }

    /// Write `manifest` as `<slug>/command.yaml`, replacing any existing one.
    pub fn install(&self, slug: &str, manifest: &Manifest) -> Result<PathBuf> {
        paths::validate_slug(slug)?;
        let path = paths::pack_manifest(&self.commands_dir, slug);
        let data = serde_yaml::to_string(manifest)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        lock(&self.cache).remove(slug);
        Ok(path)
    }

    fn read_pack(&self, slug: &str) -> Result<Option<CommandPack>> {
        let manifest_path = paths::pack_manifest(&self.commands_dir, slug);
        if !manifest_path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&manifest_path)?;
        let manifest: Manifest =
            serde_yaml::from_str(&data).map_err(|e| CmdpackError::InvalidManifest {
                slug: slug.to_string(),
                reason: e.to_string(),
            })?;
        let prompts = read_prompts(&paths::pack_prompts_dir(&self.commands_dir, slug))?;
        Ok(Some(CommandPack {
            slug: slug.to_string(),
            manifest,
            prompts,
        }))
    }
}

fn read_prompts(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut prompts = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(prompts);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_prompt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "md" || e == "txt");
        if !is_prompt || !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        prompts.insert(stem.to_string(), std::fs::read_to_string(&path)?);
    }
    Ok(prompts)
}

impl CommandPackRegistry for FsRegistry {
    fn load(&self, slug: &str) -> Result<Option<Arc<CommandPack>>> {
        paths::validate_slug(slug)?;
        if let Some(hit) = lock(&self.cache).get(slug) {
            return Ok(Some(Arc::clone(hit)));
        }
        let Some(pack) = self.read_pack(slug)? else {
            return Ok(None);
        };
        let pack = Arc::new(pack);
        lock(&self.cache).insert(slug.to_string(), Arc::clone(&pack));
        tracing::debug!(slug, steps = pack.manifest.steps.len(), "command pack loaded");
        Ok(Some(pack))
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.commands_dir.exists() {
            return Ok(Vec::new());
        }
        let mut slugs = Vec::new();
        for entry in std::fs::read_dir(&self.commands_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let slug = entry.file_name().to_string_lossy().into_owned();
            if paths::validate_slug(&slug).is_ok()
                && paths::pack_manifest(&self.commands_dir, &slug).exists()
            {
                slugs.push(slug);
            }
        }
        slugs.sort();
        Ok(slugs)
    }
}

// ---------------------------------------------------------------------------
// MemoryRegistry
// ---------------------------------------------------------------------------

/// Packs registered in code.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    packs: Mutex<BTreeMap<String, Arc<CommandPack>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pack: CommandPack) {
        lock(&self.packs).insert(pack.slug.clone(), Arc::new(pack));
    }

    pub fn with_pack(self, pack: CommandPack) -> Self {
        self.insert(pack);
        self
    }
}

impl CommandPackRegistry for MemoryRegistry {
    fn load(&self, slug: &str) -> Result<Option<Arc<CommandPack>>> {
        Ok(lock(&self.packs).get(slug).cloned())
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(lock(&self.packs).keys().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const DIGEST: &str = r#"
name: Daily digest
description: Summarize the day
steps:
  - id: x
    type: transform
    template: "{{ ctx.body | upper }}"
  - type: notify
    message: "{{ steps.x.output }}"
    channel: ops
"#;

    fn write(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn manifest_parses_flattened_config() {
        let m = Manifest::from_yaml(DIGEST).unwrap();
        assert_eq!(m.name.as_deref(), Some("Daily digest"));
        assert_eq!(m.steps.len(), 2);
        assert_eq!(m.steps[0].id.as_deref(), Some("x"));
        assert_eq!(m.steps[0].step_type, "transform");
        assert_eq!(m.steps[0].config.get("template"), Some(&json!("{{ ctx.body | upper }}")));
        assert_eq!(m.steps[1].id, None);
        let keys: Vec<&String> = m.steps[1].config.keys().collect();
        assert_eq!(keys, vec!["message", "channel"]);
        m.validate("digest").unwrap();
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let m = Manifest {
            steps: vec![
                StepDeclaration::new(Some("a"), "transform", json!({"template": "1"})),
                StepDeclaration::new(Some("a"), "transform", json!({"template": "2"})),
            ],
            ..Manifest::default()
        };
        assert!(matches!(m.validate("dupes"), Err(CmdpackError::DuplicateStepId(id)) if id == "a"));
    }

    #[test]
    fn fs_registry_loads_manifest_and_prompts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "digest/command.yaml", DIGEST);
        write(dir.path(), "digest/prompts/system.md", "Be brief.");
        write(dir.path(), "digest/prompts/notes.json", "{}");

        let reg = FsRegistry::new(dir.path());
        let pack = reg.load("digest").unwrap().unwrap();
        assert_eq!(pack.slug, "digest");
        assert_eq!(pack.manifest.steps.len(), 2);
        assert_eq!(pack.prompts.len(), 1);
        assert_eq!(pack.prompts["system"], "Be brief.");

        let again = reg.load("digest").unwrap().unwrap();
        assert!(Arc::ptr_eq(&pack, &again));
    }

    #[test]
    fn fs_registry_missing_and_invalid() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "broken/command.yaml", "steps: [ {id: a ");
        let reg = FsRegistry::new(dir.path());

        assert!(reg.load("absent").unwrap().is_none());
        assert!(matches!(reg.load("Bad Slug"), Err(CmdpackError::InvalidSlug(_))));
        assert!(matches!(
            reg.load("broken"),
            Err(CmdpackError::InvalidManifest { slug, .. }) if slug == "broken"
        ));
    }

    #[test]
    fn fs_registry_lists_only_packs() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b-pack/command.yaml", "steps: []");
        write(dir.path(), "a-pack/command.yaml", "steps: []");
        write(dir.path(), "no-manifest/readme.md", "x");
        write(dir.path(), "stray.yaml", "steps: []");

        let reg = FsRegistry::new(dir.path());
        assert_eq!(reg.list().unwrap(), vec!["a-pack", "b-pack"]);
        assert!(FsRegistry::new(dir.path().join("nope")).list().unwrap().is_empty());
    }

    #[test]
    fn install_writes_and_invalidates() {
        let dir = TempDir::new().unwrap();
        let reg = FsRegistry::new(dir.path());
        let first = Manifest::from_yaml("steps: [{type: notify, message: one}]").unwrap();
        reg.install("hello", &first).unwrap();
        assert_eq!(reg.load("hello").unwrap().unwrap().manifest, first);

        let second = Manifest::from_yaml("steps: [{type: notify, message: two}]").unwrap();
        reg.install("hello", &second).unwrap();
        assert_eq!(reg.load("hello").unwrap().unwrap().manifest, second);
    }

    #[test]
    fn memory_registry() {
        let reg = MemoryRegistry::new()
            .with_pack(CommandPack::new("z", Manifest::default()))
            .with_pack(CommandPack::new("a", Manifest::default()).with_prompt("sys", "hi"));
        assert_eq!(reg.list().unwrap(), vec!["a", "z"]);
        assert_eq!(reg.load("a").unwrap().unwrap().prompts["sys"], "hi");
        assert!(reg.load("missing").unwrap().is_none());
    }
}

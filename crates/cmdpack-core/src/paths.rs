use crate::error::{CmdpackError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CMDPACK_DIR: &str = ".cmdpack";
pub const COMMANDS_DIR: &str = ".cmdpack/commands";
pub const CONFIG_FILE: &str = ".cmdpack/config.yaml";

pub const MANIFEST_FILE: &str = "command.yaml";
pub const PROMPTS_DIR: &str = "prompts";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn commands_dir(root: &Path) -> PathBuf {
    root.join(COMMANDS_DIR)
}

pub fn pack_dir(commands_dir: &Path, slug: &str) -> PathBuf {
    commands_dir.join(slug)
}

pub fn pack_manifest(commands_dir: &Path, slug: &str) -> PathBuf {
    pack_dir(commands_dir, slug).join(MANIFEST_FILE)
}

pub fn pack_prompts_dir(commands_dir: &Path, slug: &str) -> PathBuf {
    pack_dir(commands_dir, slug).join(PROMPTS_DIR)
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// A slug is a pack's directory name: lowercase ASCII letters, digits and
/// inner hyphens, at most 64 bytes. A valid slug never leaves the commands
/// directory.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(CmdpackError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        for slug in ["daily-digest", "a", "import-notes-2", "x1"] {
            validate_slug(slug).unwrap_or_else(|_| panic!("expected valid: {slug}"));
        }
    }

    #[test]
    fn invalid_slugs() {
        for slug in [
            "",
            "-starts-with-dash",
            "ends-with-dash-",
            "has spaces",
            "UPPER",
            "a_b",
            "../escape",
        ] {
            assert!(validate_slug(slug).is_err(), "expected invalid: {slug}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.cmdpack/config.yaml")
        );
        assert_eq!(
            pack_manifest(&commands_dir(root), "digest"),
            PathBuf::from("/tmp/proj/.cmdpack/commands/digest/command.yaml")
        );
        assert_eq!(
            pack_prompts_dir(&commands_dir(root), "digest"),
            PathBuf::from("/tmp/proj/.cmdpack/commands/digest/prompts")
        );
    }
}

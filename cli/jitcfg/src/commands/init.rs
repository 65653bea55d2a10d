//! `jitcfg init`: write a template configuration.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use jitcfg_target::config;

/// Write a template to `path`, optionally pinned to `family`.
pub fn run(path: &Path, family: Option<&str>) -> Result<()> {
    if path.exists() {
        bail!("'{}' already exists", path.display());
    }
    let family = family.map(super::parse_family).transpose()?;
    let template = config::generate_template(family)?;
    fs::write(path, template).with_context(|| format!("writing {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use jitcfg_target::ArchFamily;

    use super::*;

    #[test]
    fn template_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jitcfg.toml");
        run(&path, Some("arm-v7")).unwrap();
        let loaded = config::load_config(&path).unwrap();
        assert_eq!(loaded.target.family, Some(ArchFamily::ArmV7));
        assert_eq!(loaded.toolchain.fastcall_available, None);
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jitcfg.toml");
        fs::write(&path, "# mine\n").unwrap();
        assert!(run(&path, None).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "# mine\n");
    }

    #[test]
    fn unpinned_template_detects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jitcfg.toml");
        run(&path, None).unwrap();
        assert_eq!(config::load_config(&path).unwrap().target.family, None);
    }
}

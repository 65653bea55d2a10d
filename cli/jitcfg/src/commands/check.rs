//! `jitcfg check`: validate a configuration file.

use std::path::Path;

use anyhow::{bail, Context, Result};
use jitcfg_target::config;
use jitcfg_target::TargetSignals;

pub fn run(path: &Path) -> Result<()> {
    let config =
        config::load_config(path).with_context(|| format!("loading {}", path.display()))?;
    let host = TargetSignals::host_identity();

    match config::validate_config(&config, &host) {
        Ok(()) => {
            println!("{}: ok", path.display());
            Ok(())
        }
        Err(issues) => {
            let mut errors = 0;
            for issue in &issues {
                println!("  {}: {}", issue.severity, issue.message);
                if issue.severity == "error" {
                    errors += 1;
                }
            }
            if errors > 0 {
                bail!("{}: {errors} error(s)", path.display());
            }
            println!("{}: ok with {} warning(s)", path.display(), issues.len());
            Ok(())
        }
    }
}

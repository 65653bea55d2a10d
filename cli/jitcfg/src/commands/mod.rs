pub mod check;
pub mod doctor;
pub mod families;
pub mod init;
pub mod show;

use anyhow::{Context, Result};
use jitcfg_target::ArchFamily;

/// Parse a `--family` argument.
pub(crate) fn parse_family(name: &str) -> Result<ArchFamily> {
    name.parse::<ArchFamily>()
        .context("invalid --family (see 'jitcfg families')")
}

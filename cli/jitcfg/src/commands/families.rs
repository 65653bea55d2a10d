//! `jitcfg families`: list the supported architecture families.

use anyhow::Result;
use jitcfg_target::{ArchFamily, TargetProfile};

pub fn run() -> Result<()> {
    let host = TargetProfile::host().family();
    println!("Supported families:");
    println!();
    for family in ArchFamily::SUPPORTED {
        let marker = if family == host { " (host)" } else { "" };
        println!("  {:<12} {}{marker}", family.name(), family.description());
    }
    println!();
    if !host.is_supported() {
        println!("This host ({}) is not supported.", std::env::consts::ARCH);
    }
    println!("Use 'jitcfg show --family <name>' for details.");
    Ok(())
}

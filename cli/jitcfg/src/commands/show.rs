//! `jitcfg show`: resolve a profile and describe it.

use std::path::Path;

use anyhow::{bail, Context, Result};
use jitcfg_target::config::{self, TargetConfig};
use jitcfg_target::{TargetProfile, TargetSignals};

/// Resolve the profile selected by the flags and print it.
///
/// `family` beats the configuration file, which beats host detection.
pub fn run(
    cwd: &Path,
    family: Option<&str>,
    config_path: Option<&Path>,
    format: Option<&str>,
) -> Result<()> {
    let profile = resolve(cwd, family, config_path)?;
    match format.unwrap_or("human") {
        "human" => describe(&profile),
        "toml" => print!("{}", config::profile_to_toml(&profile)?),
        "json" => println!("{}", config::profile_to_json(&profile)?),
        other => bail!("unknown format '{other}' (expected human, toml or json)"),
    }
    Ok(())
}

pub(crate) fn resolve(
    cwd: &Path,
    family: Option<&str>,
    config_path: Option<&Path>,
) -> Result<TargetProfile> {
    let mut config = match config_path {
        Some(path) => config::load_config(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => match config::find_config(cwd)? {
            Some((config, dir)) => {
                log::info!("using {}", dir.join(config::CONFIG_FILE).display());
                config
            }
            None => TargetConfig::default(),
        },
    };
    if let Some(name) = family {
        config.target.family = Some(super::parse_family(name)?);
    }
    Ok(config.resolve(&TargetSignals::host()))
}

fn describe(profile: &TargetProfile) {
    let family = profile.family();
    println!("=== Target: {family} ===");
    println!("{}", family.description());
    println!();

    let facts = match profile.facts() {
        Ok(facts) => facts,
        Err(e) => {
            println!("  {e}");
            println!("  No machine facts are available; the JIT backend is disabled.");
            return;
        }
    };

    println!("--- Word ---");
    println!("  Width:       {} bits", facts.word_width().bits());
    println!("  Word shift:  {}", facts.word_shift);
    println!("  Float shift: {}", facts.float_shift);
    println!();

    println!("--- ABI ---");
    println!("  Calling convention: {}", facts.calling_convention);
    println!(
        "  Indirect calls:     {}",
        if facts.indirect_call_required {
            "function descriptors"
        } else {
            "direct"
        }
    );
    println!();

    println!("--- Memory ---");
    println!("  Byte order:        {}", facts.endianness);
    println!(
        "  Unaligned access:  {}",
        if facts.unaligned_access_allowed {
            "allowed"
        } else {
            "split into aligned pieces"
        }
    );
    println!("  Instruction cache: {:?}", facts.instruction_cache);
    println!();

    println!("--- Vector FP ---");
    println!("  Unit:   {:?}", facts.vector_fp);
    if facts.vector_fp_autodetect() {
        println!("  Probed once at process start");
    }
}

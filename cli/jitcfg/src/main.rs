//! jitcfg CLI: inspect and configure the target profile a JIT backend runs on.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jitcfg", version, about = "JIT target configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the supported architecture families
    Families,
    /// Resolve and print a target profile
    Show {
        /// Force a family instead of detecting the host (e.g. x86-64, ppc-64)
        #[arg(long)]
        family: Option<String>,
        /// Configuration file (default: nearest jitcfg.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output format (human, toml, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Validate a configuration file against this host
    Check {
        /// Path to the configuration file
        path: PathBuf,
    },
    /// Write a template configuration file
    Init {
        /// Destination (default: ./jitcfg.toml)
        path: Option<PathBuf>,
        /// Pin the template to a family
        #[arg(long)]
        family: Option<String>,
    },
    /// Check that code generation works on this host
    Doctor,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Families => commands::families::run(),

        Commands::Show {
            family,
            config,
            format,
        } => commands::show::run(
            &cwd,
            family.as_deref(),
            config.as_deref(),
            format.as_deref(),
        ),

        Commands::Check { path } => commands::check::run(&path),

        Commands::Init { path, family } => {
            let path = path.unwrap_or_else(|| cwd.join(jitcfg_target::config::CONFIG_FILE));
            commands::init::run(&path, family.as_deref())
        }

        Commands::Doctor => commands::doctor::run(&cwd),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// init -> check -> show against the written file.
    #[test]
    fn init_check_show_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jitcfg.toml");

        commands::init::run(&path, Some("mips-32")).unwrap();
        assert!(path.is_file());

        // A cross-target configuration is only a warning
        commands::check::run(&path).unwrap();

        for format in ["human", "toml", "json"] {
            commands::show::run(dir.path(), None, Some(&path), Some(format)).unwrap();
        }
    }

    #[test]
    fn cli_parses_show_flags() {
        let cli = Cli::try_parse_from([
            "jitcfg", "show", "--family", "arm-v7", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Show { family, format, config } => {
                assert_eq!(family.as_deref(), Some("arm-v7"));
                assert_eq!(format.as_deref(), Some("json"));
                assert!(config.is_none());
            }
            _ => panic!("expected show"),
        }
    }
}

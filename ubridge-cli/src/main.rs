// ubridge-cli: generate native types from a types manifest and print their
// reflection records.

mod declare;
mod manifest;
mod reflect;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};

use ubridge_host::{Host, TypeHandle};
use ubridge_runtime::{Bridge, BridgeConfig, LOG_ERROR, LOG_WARNING};

use crate::manifest::TypesManifest;

const DEFAULT_CONFIG: &str = "ubridge.config.toml";

#[derive(Parser)]
#[command(name = "ubridge", about = "ubridge CLI: native type generation from script type manifests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every declared type and print the reflection records as JSON.
    Generate {
        /// Path to ubridge.types.toml.
        #[arg(long, default_value = "ubridge.types.toml")]
        manifest: PathBuf,
        /// Path to ubridge.config.toml (defaults apply when absent).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the JSON here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate every declared type and report warnings and errors only.
    Check {
        /// Path to ubridge.types.toml.
        #[arg(long, default_value = "ubridge.types.toml")]
        manifest: PathBuf,
        /// Path to ubridge.config.toml (defaults apply when absent).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate { manifest, config, out } => run_generate(&manifest, config.as_deref(), out.as_deref()),
        Commands::Check { manifest, config } => run_check(&manifest, config.as_deref()),
    };
    if let Err(msg) = result {
        eprintln!("Error: {msg}");
        std::process::exit(1);
    }
}

/// Explicit --config, then ./ubridge.config.toml when present, then defaults.
fn load_config(flag: Option<&Path>) -> Result<BridgeConfig, String> {
    let path = match flag {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).exists() => Path::new(DEFAULT_CONFIG),
        None => return Ok(BridgeConfig::default()),
    };
    BridgeConfig::load(path).map_err(|e| e.message())
}

/// Bridge over a fresh host with everything in `manifest` generated.
fn generate(manifest_path: &Path, config: Option<&Path>) -> Result<(Rc<Bridge>, Vec<TypeHandle>), String> {
    let config = load_config(config)?;
    let manifest = TypesManifest::load(manifest_path)?;
    let bridge = Bridge::new(Rc::new(Host::new()), config).map_err(|e| e.message())?;
    let handles = declare::generate_manifest(&bridge, &manifest);
    bridge.host().log_sink().flush();
    match handles {
        Ok(handles) => Ok((bridge, handles)),
        Err(err) => {
            bridge.shutdown();
            Err(err.message())
        }
    }
}

fn run_generate(manifest: &Path, config: Option<&Path>, out: Option<&Path>) -> Result<(), String> {
    let (bridge, handles) = generate(manifest, config)?;
    let records = reflect::types_json(bridge.host(), &handles).map_err(|e| e.message());
    bridge.shutdown();
    let text = serde_json::to_string_pretty(&records?).map_err(|e| e.to_string())?;
    match out {
        Some(path) => {
            std::fs::write(path, text).map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            eprintln!("Wrote {} type(s) to {}", handles.len(), path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn run_check(manifest: &Path, config: Option<&Path>) -> Result<(), String> {
    let (bridge, handles) = generate(manifest, config)?;
    let mut problems = 0;
    for record in bridge.host().log_sink().records() {
        let label = match record.verbosity {
            LOG_ERROR => "error",
            LOG_WARNING => "warning",
            _ => continue,
        };
        problems += 1;
        eprintln!("{label}: [{}] {}", record.category, record.message);
    }
    bridge.shutdown();
    println!("{} type(s) generated, {problems} warning(s) or error(s)", handles.len());
    Ok(())
}

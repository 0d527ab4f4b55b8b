//! Tandem CLI — assemble, inspect, and describe the tandem platform.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use manifest::TandemManifest;

#[derive(Parser)]
#[command(name = "tandem", version, about = "Dual-core RISC-V platform bring-up tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a bootable machine and print the boot report
    Boot {
        /// Board name (default: tandem-duo)
        #[arg(long)]
        board: Option<String>,
        /// Firmware image (default: machine.firmware in tandem.toml)
        #[arg(long)]
        firmware: Option<String>,
        /// Kernel image, loaded past the firmware
        #[arg(long)]
        kernel: Option<String>,
        /// Pre-built descriptor blob; skips synthesis
        #[arg(long)]
        dtb: Option<String>,
        /// Number of cores to bring up (1 or 2)
        #[arg(long)]
        cores: Option<u32>,
        /// Guest DRAM size in bytes
        #[arg(long)]
        ram_size: Option<u64>,
        /// Kernel command line
        #[arg(long)]
        bootargs: Option<String>,
        /// Write the placed descriptor blob to a file
        #[arg(long)]
        emit_dtb: Option<String>,
    },
    /// Print a descriptor blob as text or JSON
    Inspect {
        /// Path to a flattened descriptor (.dtb)
        input: String,
        /// Output format (text, json)
        #[arg(long)]
        export: Option<String>,
    },
    /// Show a board's physical address map
    Regions {
        /// Board name (default: tandem-duo)
        #[arg(long)]
        board: Option<String>,
        /// Output format (text, json)
        #[arg(long)]
        export: Option<String>,
    },
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
        Commands::Boot {
            board,
            firmware,
            kernel,
            dtb,
            cores,
            ram_size,
            bootargs,
            emit_dtb,
        } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let project_dir = project_dir.unwrap_or(cwd);
            commands::boot::run(
                &project_dir,
                manifest.as_ref(),
                board.as_deref(),
                firmware.as_deref(),
                kernel.as_deref(),
                dtb.as_deref(),
                cores,
                ram_size,
                bootargs.as_deref(),
                emit_dtb.as_deref(),
            )
        }

        Commands::Inspect { input, export } => {
            commands::inspect::run(Path::new(&input), export.as_deref())
        }

        Commands::Regions { board, export } => {
            let (manifest, _) = load_manifest_optional(&cwd)?;
            commands::regions::run(board.as_deref(), manifest.as_ref(), export.as_deref())
        }
    }
}

/// Try to load a manifest from the current directory upward. Returns
/// (None, None) if not found.
fn load_manifest_optional(cwd: &Path) -> anyhow::Result<(Option<TandemManifest>, Option<PathBuf>)> {
    match TandemManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}

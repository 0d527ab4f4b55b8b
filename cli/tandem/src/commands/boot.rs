//! `tandem boot` — assemble a machine and print the boot report.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;
use tandem_machine::{BootConfig, Machine};
use tandem_soc::BoardSpec;

use crate::manifest::{resolve_board, TandemManifest, DEFAULT_BOARD};

/// Assemble the configured machine, print its boot report, and optionally
/// write the placed descriptor blob out as a file.
#[allow(clippy::too_many_arguments)]
pub fn run(
    project_dir: &Path,
    manifest: Option<&TandemManifest>,
    board: Option<&str>,
    firmware: Option<&str>,
    kernel: Option<&str>,
    dtb: Option<&str>,
    cores: Option<u32>,
    ram_size: Option<u64>,
    bootargs: Option<&str>,
    emit_dtb: Option<&str>,
) -> Result<()> {
    let (board, config) = resolve_config(
        project_dir, manifest, board, firmware, kernel, dtb, cores, ram_size, bootargs,
    )?;
    debug!("resolved configuration: {config:?}");

    let machine = Machine::assemble(board, &config)?;
    print!("{}", machine.report);

    if let Some(path) = emit_dtb {
        let out = PathBuf::from(path);
        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        fs::write(&out, &machine.descriptor)
            .with_context(|| format!("writing {}", out.display()))?;
        println!();
        println!("Descriptor written to {}", out.display());
    }

    Ok(())
}

/// Merge CLI flags over manifest values over board defaults.
///
/// Flag paths are taken as given; manifest paths are relative to the
/// directory holding `tandem.toml`.
#[allow(clippy::too_many_arguments)]
fn resolve_config(
    project_dir: &Path,
    manifest: Option<&TandemManifest>,
    board: Option<&str>,
    firmware: Option<&str>,
    kernel: Option<&str>,
    dtb: Option<&str>,
    cores: Option<u32>,
    ram_size: Option<u64>,
    bootargs: Option<&str>,
) -> Result<(BoardSpec, BootConfig)> {
    let section = manifest.map(|m| &m.machine);

    let board_name = board
        .or_else(|| section.and_then(|m| m.board.as_deref()))
        .unwrap_or(DEFAULT_BOARD);
    let board = match resolve_board(board_name) {
        Some(board) => board,
        None => {
            bail!("unknown board: '{board_name}'. Use 'tandem regions' to see the built-in boards.")
        }
    };

    let firmware = match (firmware, section.and_then(|m| m.firmware.as_deref())) {
        (Some(path), _) => PathBuf::from(path),
        (None, Some(path)) => project_dir.join(path),
        (None, None) => {
            bail!("no firmware image: pass --firmware or set machine.firmware in tandem.toml")
        }
    };

    let mut config = BootConfig::for_board(&board, firmware);
    if let Some(count) = cores.or_else(|| section.and_then(|m| m.cores)) {
        config.core_count = count;
    }
    if let Some(size) = ram_size.or_else(|| section.and_then(|m| m.ram_size)) {
        config.ram_size = size;
    }
    config.kernel = merge_path(project_dir, kernel, section.and_then(|m| m.kernel.as_deref()));
    config.descriptor = merge_path(project_dir, dtb, section.and_then(|m| m.dtb.as_deref()));
    config.bootargs = bootargs
        .map(str::to_string)
        .or_else(|| section.and_then(|m| m.bootargs.clone()));

    Ok((board, config))
}

fn merge_path(
    project_dir: &Path,
    flag: Option<&str>,
    manifest: Option<&str>,
) -> Option<PathBuf> {
    match (flag, manifest) {
        (Some(path), _) => Some(PathBuf::from(path)),
        (None, Some(path)) => Some(project_dir.join(path)),
        (None, None) => None,
    }
}

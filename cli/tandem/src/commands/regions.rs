//! `tandem regions` — print a board's physical address map.

use anyhow::{bail, Result};
use serde_json::json;
use tandem_soc::{BoardSpec, Region, UNIMPLEMENTED_DEVICES};

use crate::manifest::{builtin_boards, resolve_board, TandemManifest, DEFAULT_BOARD};

/// Print the address map of the selected board.
pub fn run(
    board: Option<&str>,
    manifest: Option<&TandemManifest>,
    export: Option<&str>,
) -> Result<()> {
    let name = board
        .or_else(|| manifest.and_then(|m| m.machine.board.as_deref()))
        .unwrap_or(DEFAULT_BOARD);
    let board = match resolve_board(name) {
        Some(board) => board,
        None => {
            eprintln!("Built-in boards:");
            for (name, description) in builtin_boards() {
                eprintln!("  {name:<12} {description}");
            }
            bail!("unknown board: '{name}'")
        }
    };

    match export.unwrap_or("text") {
        "text" => print_table(&board),
        "json" => {
            let doc = json!({
                "board": board.name,
                "regions": board.memmap.iter().collect::<Vec<_>>(),
                "stubs": UNIMPLEMENTED_DEVICES
                    .iter()
                    .map(|d| d.name)
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        other => bail!("unknown export format: '{other}'. Choose: text, json"),
    }
}

fn print_table(board: &BoardSpec) -> Result<()> {
    println!("=== Address Map: {} ===", board.name);
    println!();
    for region in board.memmap.iter() {
        println!(
            "  {:<18} 0x{:08X} - 0x{:08X} ({} bytes){}",
            region.id.name(),
            region.base,
            region.end(),
            region.size,
            if is_stub(region) { "  [stub]" } else { "" },
        );
    }
    println!();
    println!(
        "{} regions, {} backed by placeholder devices.",
        board.memmap.len(),
        board.memmap.iter().filter(|r| is_stub(r)).count()
    );
    Ok(())
}

fn is_stub(region: &Region) -> bool {
    UNIMPLEMENTED_DEVICES.iter().any(|d| d.region == region.id)
}

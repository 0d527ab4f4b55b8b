//! `tandem.toml` manifest parsing and board selection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tandem_soc::BoardSpec;

/// Board used when neither a flag nor the manifest names one.
pub const DEFAULT_BOARD: &str = "tandem-duo";

/// The top-level manifest for a tandem project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TandemManifest {
    /// Machine configuration (required).
    pub machine: MachineSection,
}

/// `[machine]` section: which board to assemble and what to load into it.
///
/// Image paths are relative to the directory holding `tandem.toml`.
/// Every key can be overridden by the matching CLI flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MachineSection {
    /// Board name (default: tandem-duo).
    #[serde(default)]
    pub board: Option<String>,
    /// Number of cores to bring up.
    #[serde(default)]
    pub cores: Option<u32>,
    /// Guest DRAM size in bytes.
    #[serde(default)]
    pub ram_size: Option<u64>,
    /// Firmware image.
    #[serde(default)]
    pub firmware: Option<String>,
    /// Kernel image, loaded past the firmware.
    #[serde(default)]
    pub kernel: Option<String>,
    /// Pre-built descriptor blob; skips synthesis.
    #[serde(default)]
    pub dtb: Option<String>,
    /// Kernel command line.
    #[serde(default)]
    pub bootargs: Option<String>,
}

impl TandemManifest {
    /// Search upward from `start_dir` for a `tandem.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join("tandem.toml");
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: TandemManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing tandem.toml")
    }
}

/// Resolve a board name to its specification.
pub fn resolve_board(name: &str) -> Option<BoardSpec> {
    match name {
        "tandem-duo" => Some(BoardSpec::duo()),
        _ => None,
    }
}

/// List all built-in board names.
pub fn builtin_boards() -> Vec<(&'static str, &'static str)> {
    vec![(
        "tandem-duo",
        "Dual-core RISC-V devkit (rv64 + rv64 vector, 2 GiB DRAM)",
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let toml_str = r#"
[machine]
board = "tandem-duo"
cores = 2
ram-size = 0x8000_0000
firmware = "fw/u-boot-spl.bin"
kernel = "images/vmlinux.bin"
dtb = "prebuilt/duo.dtb"
bootargs = "console=ttyS0,115200n8 debug loglevel=7"
"#;
        let manifest = TandemManifest::from_str(toml_str).unwrap();
        let machine = &manifest.machine;
        assert_eq!(machine.board.as_deref(), Some("tandem-duo"));
        assert_eq!(machine.cores, Some(2));
        assert_eq!(machine.ram_size, Some(0x8000_0000));
        assert_eq!(machine.firmware.as_deref(), Some("fw/u-boot-spl.bin"));
        assert_eq!(machine.kernel.as_deref(), Some("images/vmlinux.bin"));
        assert_eq!(machine.dtb.as_deref(), Some("prebuilt/duo.dtb"));
        assert!(machine.bootargs.as_deref().unwrap().starts_with("console="));
    }

    #[test]
    fn parse_minimal_manifest() {
        let toml_str = r#"
[machine]
firmware = "fw.bin"
"#;
        let manifest = TandemManifest::from_str(toml_str).unwrap();
        assert_eq!(manifest.machine.firmware.as_deref(), Some("fw.bin"));
        assert!(manifest.machine.board.is_none());
        assert!(manifest.machine.cores.is_none());
        assert!(manifest.machine.kernel.is_none());
    }

    #[test]
    fn keys_are_kebab_case() {
        // The snake-case spelling is not recognized.
        let toml_str = r#"
[machine]
ram_size = 1024
"#;
        let manifest = TandemManifest::from_str(toml_str).unwrap();
        assert_eq!(manifest.machine.ram_size, None);
    }

    #[test]
    fn reject_invalid_toml() {
        let bad = "this is not valid toml [[[";
        assert!(TandemManifest::from_str(bad).is_err());
    }

    #[test]
    fn resolve_builtin_boards() {
        assert!(resolve_board("tandem-duo").is_some());
        assert!(resolve_board("nonexistent").is_none());
        assert!(builtin_boards().iter().any(|(name, _)| *name == DEFAULT_BOARD));
    }

    #[test]
    fn find_and_load_in_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("tandem.toml");
        std::fs::write(&manifest_path, "[machine]\nfirmware = \"fw.bin\"\n").unwrap();

        let result = TandemManifest::find_and_load(dir.path()).unwrap();
        let (manifest, found_dir) = result.unwrap();
        assert_eq!(manifest.machine.firmware.as_deref(), Some("fw.bin"));
        assert_eq!(found_dir, dir.path());
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("tandem.toml");
        std::fs::write(&manifest_path, "[machine]\ncores = 1\n").unwrap();

        let nested = dir.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&nested).unwrap();

        let result = TandemManifest::find_and_load(&nested).unwrap();
        let (manifest, found_dir) = result.unwrap();
        assert_eq!(manifest.machine.cores, Some(1));
        assert_eq!(found_dir, dir.path());
    }

    #[test]
    fn find_and_load_never_invents_a_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("empty");
        std::fs::create_dir_all(&nested).unwrap();

        // Nothing under the temp dir carries a manifest, so a hit can only
        // come from a stray tandem.toml above it on the test machine.
        if let Some((_, found_dir)) = TandemManifest::find_and_load(&nested).unwrap() {
            assert!(!found_dir.starts_with(dir.path()));
        }
    }
}

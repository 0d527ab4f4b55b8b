//! Boot sequencing and platform assembly.
//!
//! The sequencer runs a fixed list of stages, each fatal on failure:
//! check the configuration, compose the SoC model, obtain a descriptor
//! (synthesized or externally supplied), load the firmware and optional
//! kernel into DRAM, place the descriptor near the top of usable memory,
//! and patch the boot ROM with the dispatch stub and hand-off record.
//! Nothing is retried and nothing mutates after hand-off.

use std::cmp;
use std::fmt;
use std::path::PathBuf;

use log::{debug, info};

use tandem_fdt::Fdt;
use tandem_soc::{BoardSpec, SocModel};

use crate::dtb;
use crate::error::{MachineError, Result};
use crate::images::{load_image, sha256_hex, LoadedImage};
use crate::ram::GuestRam;
use crate::stub::BootRom;

/// Kernels are placed on the next such boundary past the firmware.
const KERNEL_ALIGN: u64 = 2 << 20;
/// The descriptor is aligned down to this boundary.
const DESCRIPTOR_ALIGN: u64 = 2 << 20;
/// The descriptor stays below 3 GiB so 32-bit firmware can address it.
const DESCRIPTOR_CEILING: u64 = 3 << 30;

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

fn align_down(value: u64, align: u64) -> u64 {
    value & !(align - 1)
}

/// Configuration for one boot, resolved by the caller before assembly.
#[derive(Debug, Clone)]
pub struct BootConfig {
    /// Number of cores to bring up (1 or 2).
    pub core_count: u32,
    /// Guest DRAM size in bytes; must equal the board's shipped size.
    pub ram_size: u64,
    /// Firmware image, loaded at the board's firmware entry.
    pub firmware: PathBuf,
    /// Optional kernel image, loaded past the firmware.
    pub kernel: Option<PathBuf>,
    /// Optional pre-built descriptor blob; when set, synthesis is skipped
    /// and the blob is validated instead.
    pub descriptor: Option<PathBuf>,
    /// Kernel command line, overriding the board default.
    pub bootargs: Option<String>,
}

impl BootConfig {
    /// A configuration with the board's defaults: every core the board
    /// has, the shipped RAM size, no kernel, synthesized descriptor.
    pub fn for_board(board: &BoardSpec, firmware: impl Into<PathBuf>) -> Self {
        Self {
            core_count: board.core_isas.len() as u32,
            ram_size: board.default_ram_size,
            firmware: firmware.into(),
            kernel: None,
            descriptor: None,
            bootargs: None,
        }
    }
}

/// Where the descriptor blob came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorSource {
    /// Synthesized from the board and SoC model.
    Synthesized,
    /// Loaded from a pre-built file and validated against the board.
    External(PathBuf),
}

impl fmt::Display for DescriptorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorSource::Synthesized => f.write_str("synthesized"),
            DescriptorSource::External(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Load addresses computed by the sequencer, recorded for hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootInfo {
    /// Where the firmware image was placed.
    pub firmware_load: u64,
    /// First address past the firmware image.
    pub firmware_end: u64,
    /// Where the kernel was placed, when one was configured.
    pub kernel_load: Option<u64>,
    /// Address the firmware hands off to next; 0 when no kernel was
    /// loaded and the firmware decides the next stage on its own.
    pub kernel_entry: u64,
    /// Where the descriptor blob was placed.
    pub descriptor_load: u64,
}

/// One loaded image as recorded in the boot report.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub load_addr: u64,
    pub len: u64,
    /// Lower-case hex SHA-256 of the file contents.
    pub digest: String,
}

impl ImageRecord {
    fn new(image: &LoadedImage, load_addr: u64) -> Self {
        Self {
            path: image.path.clone(),
            load_addr,
            len: image.len(),
            digest: image.digest.clone(),
        }
    }
}

/// Summary of one completed assembly, printed by `tandem boot`.
#[derive(Debug, Clone)]
pub struct BootReport {
    pub board: String,
    pub core_count: u32,
    pub ram_size: u64,
    pub descriptor_source: DescriptorSource,
    pub descriptor_len: u64,
    pub descriptor_digest: String,
    pub firmware: ImageRecord,
    pub kernel: Option<ImageRecord>,
    pub boot_rom_base: u64,
    pub info: BootInfo,
}

impl fmt::Display for BootReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Boot Report: {} ===", self.board)?;
        writeln!(f, "Cores: {}", self.core_count)?;
        writeln!(f, "RAM:   {:#x} bytes", self.ram_size)?;
        writeln!(f)?;

        writeln!(f, "--- Images ---")?;
        writeln!(
            f,
            "  firmware  {:#010x}..{:#010x}  {} (sha256 {})",
            self.firmware.load_addr,
            self.firmware.load_addr + self.firmware.len,
            self.firmware.path.display(),
            self.firmware.digest,
        )?;
        if let Some(ref kernel) = self.kernel {
            writeln!(
                f,
                "  kernel    {:#010x}..{:#010x}  {} (sha256 {})",
                kernel.load_addr,
                kernel.load_addr + kernel.len,
                kernel.path.display(),
                kernel.digest,
            )?;
        }
        writeln!(f)?;

        writeln!(f, "--- Descriptor ---")?;
        writeln!(f, "  source: {}", self.descriptor_source)?;
        writeln!(
            f,
            "  placed: {:#010x} ({} bytes, sha256 {})",
            self.info.descriptor_load, self.descriptor_len, self.descriptor_digest,
        )?;
        writeln!(f)?;

        writeln!(f, "--- Hand-off ---")?;
        writeln!(f, "  boot rom:     {:#010x}", self.boot_rom_base)?;
        if self.info.kernel_entry == 0 {
            writeln!(f, "  kernel entry: 0x0 (firmware decides)")?;
        } else {
            writeln!(f, "  kernel entry: {:#010x}", self.info.kernel_entry)?;
        }
        Ok(())
    }
}

/// A fully assembled platform instance, ready for its cores to start.
///
/// Everything here is read-only from the guest's point of view: the
/// sequencer never re-enters after [`Machine::assemble`] returns.
#[derive(Debug)]
pub struct Machine {
    pub board: BoardSpec,
    pub soc: SocModel,
    /// Guest DRAM with firmware, kernel, and descriptor placed.
    pub ram: GuestRam,
    /// Patched boot ROM contents.
    pub rom: BootRom,
    /// The descriptor tree, synthesized or parsed.
    pub fdt: Fdt,
    /// The serialized descriptor exactly as placed in DRAM.
    pub descriptor: Vec<u8>,
    pub info: BootInfo,
    pub report: BootReport,
}

impl Machine {
    /// Run the boot sequence end to end.
    ///
    /// The configuration is checked before anything is created, so a
    /// rejected assembly leaves no partial state behind.
    pub fn assemble(board: BoardSpec, config: &BootConfig) -> Result<Machine> {
        if config.ram_size != board.default_ram_size {
            return Err(MachineError::RamSizeMismatch {
                requested: config.ram_size,
                required: board.default_ram_size,
            });
        }

        info!(
            "assembling {}: {} core(s), {:#x} bytes of DRAM",
            board.name, config.core_count, config.ram_size
        );
        let soc = SocModel::compose(&board, config.core_count)?;

        let dram = board.dram();
        let bootargs = config
            .bootargs
            .as_deref()
            .unwrap_or(&board.default_bootargs);
        let (fdt, descriptor_source) = match &config.descriptor {
            Some(path) => {
                let image = load_image("descriptor", path)?;
                let fdt = Fdt::from_bytes(&image.data)?;
                dtb::validate_memory_layout(&fdt, dram.base, config.ram_size)?;
                info!(
                    "descriptor: loaded {} ({} bytes)",
                    path.display(),
                    image.len()
                );
                (fdt, DescriptorSource::External(path.clone()))
            }
            None => {
                let fdt = dtb::synthesize(&board, &soc, config.ram_size, bootargs)?;
                info!("descriptor: synthesized {} nodes", fdt.node_count());
                (fdt, DescriptorSource::Synthesized)
            }
        };
        let blob = fdt.to_bytes()?;

        let mut ram = GuestRam::new(dram.base, config.ram_size);

        // The firmware goes at the fixed entry the dispatch stub jumps to.
        let firmware = load_image("firmware", &config.firmware)?;
        let firmware_load = board.firmware_entry;
        place("firmware", &mut ram, firmware_load, &firmware.data)?;
        let firmware_end = firmware_load + firmware.len();
        info!(
            "firmware: {} ({} bytes) at {:#x}",
            config.firmware.display(),
            firmware.len(),
            firmware_load
        );
        debug!("firmware sha256: {}", firmware.digest);

        let kernel = match &config.kernel {
            Some(path) => Some(load_image("kernel", path)?),
            None => None,
        };
        let (kernel_load, kernel_entry) = match &kernel {
            Some(image) => {
                let addr = align_up(firmware_end, KERNEL_ALIGN);
                place("kernel", &mut ram, addr, &image.data)?;
                info!(
                    "kernel: {} ({} bytes) at {:#x}",
                    image.path.display(),
                    image.len(),
                    addr
                );
                debug!("kernel sha256: {}", image.digest);
                (Some(addr), addr)
            }
            None => (None, 0),
        };

        let descriptor_load = descriptor_addr(&ram, blob.len() as u64)?;
        place("descriptor", &mut ram, descriptor_load, &blob)?;
        info!("descriptor: {} bytes at {:#x}", blob.len(), descriptor_load);

        let rom = BootRom::patch(&board, kernel_entry)?;
        info!(
            "boot rom: dispatch stub and hand-off record at {:#x}",
            rom.base
        );

        let info = BootInfo {
            firmware_load,
            firmware_end,
            kernel_load,
            kernel_entry,
            descriptor_load,
        };
        let report = BootReport {
            board: board.name.clone(),
            core_count: soc.core_count(),
            ram_size: config.ram_size,
            descriptor_source,
            descriptor_len: blob.len() as u64,
            descriptor_digest: sha256_hex(&blob),
            firmware: ImageRecord::new(&firmware, firmware_load),
            kernel: kernel
                .as_ref()
                .zip(kernel_load)
                .map(|(image, addr)| ImageRecord::new(image, addr)),
            boot_rom_base: rom.base,
            info,
        };

        Ok(Machine {
            board,
            soc,
            ram,
            rom,
            fdt,
            descriptor: blob,
            info,
            report,
        })
    }
}

/// Bounds-check an image against DRAM before writing it, so the error
/// names the boot stage rather than a raw access.
fn place(stage: &'static str, ram: &mut GuestRam, addr: u64, bytes: &[u8]) -> Result<()> {
    let len = bytes.len() as u64;
    let fits = addr >= ram.base()
        && addr
            .checked_add(len)
            .is_some_and(|end| end <= ram.end());
    if !fits {
        return Err(MachineError::ImageOverflow {
            stage,
            addr,
            len,
            dram_end: ram.end(),
        });
    }
    ram.write(addr, bytes)
}

/// Descriptor placement: just below the top of usable DRAM, kept 32-bit
/// addressable, aligned down.
fn descriptor_addr(ram: &GuestRam, len: u64) -> Result<u64> {
    let ceiling = cmp::min(ram.end(), DESCRIPTOR_CEILING);
    let addr = ceiling
        .checked_sub(len)
        .map(|a| align_down(a, DESCRIPTOR_ALIGN));
    match addr {
        Some(a) if a >= ram.base() => Ok(a),
        _ => Err(MachineError::DescriptorPlacement { len, ceiling }),
    }
}

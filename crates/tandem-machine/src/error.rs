//! Error types for platform assembly.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while assembling a machine or sequencing its boot flow.
///
/// Every failure is fatal to the assembly; the variant names the boot
/// stage that rejected it.
#[derive(Debug, Error)]
pub enum MachineError {
    /// The configured RAM size is not the one the board ships with.
    #[error(
        "unsupported RAM size {requested:#x}: this board takes exactly {required:#x} bytes"
    )]
    RamSizeMismatch { requested: u64, required: u64 },

    /// SoC composition rejected the configuration.
    #[error(transparent)]
    Soc(#[from] tandem_soc::SocError),

    /// Descriptor synthesis failed, or an external blob was malformed.
    #[error("descriptor: {0}")]
    Descriptor(#[from] tandem_fdt::FdtError),

    /// An image file named by the configuration does not exist.
    #[error("{stage}: image not found: {}", path.display())]
    ImageNotFound { stage: &'static str, path: PathBuf },

    /// An image file could not be read.
    #[error("{stage}: reading {}: {source}", path.display())]
    ImageRead {
        stage: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// An image does not fit at its computed load address.
    #[error("{stage}: {len} bytes at {addr:#x} exceed guest DRAM (ends at {dram_end:#x})")]
    ImageOverflow {
        stage: &'static str,
        addr: u64,
        len: u64,
        dram_end: u64,
    },

    /// The descriptor blob cannot be placed below its address ceiling.
    #[error("descriptor: {len} bytes do not fit below {ceiling:#x}")]
    DescriptorPlacement { len: u64, ceiling: u64 },

    /// A guest memory access fell outside the DRAM region.
    #[error("guest access of {len} bytes at {addr:#x} is outside DRAM [{base:#x}, {end:#x})")]
    DramAccess {
        addr: u64,
        len: u64,
        base: u64,
        end: u64,
    },

    /// An external descriptor carries no usable memory node.
    #[error("external descriptor has no memory node with a 'reg' property")]
    MemoryNodeMissing,

    /// An external descriptor's memory node disagrees with the configured
    /// layout.
    #[error(
        "external descriptor memory does not match the configured layout \
         (base {base:#x}, size {size:#x})"
    )]
    MemoryLayoutMismatch { base: u64, size: u64 },

    /// The dispatch stub and hand-off record exceed the boot ROM region.
    #[error("boot ROM contents ({need} bytes) exceed the ROM region ({avail} bytes)")]
    BootRomOverflow { need: u64, avail: u64 },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, MachineError>;

//! Platform assembly and boot flow for the tandem machine.
//!
//! Everything that happens between "a configuration exists" and "cores may
//! start" lives here, in a fixed stage order:
//!
//! 1. check the configuration (RAM size, core count)
//! 2. compose the SoC model
//! 3. obtain a descriptor: synthesize one, or validate an external blob
//! 4. load the firmware at the fixed entry the dispatch stub jumps to
//! 5. load the optional kernel past the firmware
//! 6. place the descriptor near the top of usable DRAM
//! 7. patch the boot ROM with the dispatch stub and hand-off record
//!
//! [`Machine::assemble`] runs the sequence once; the first failure is
//! final and nothing mutates afterwards.

mod boot;
mod dtb;
mod error;
mod images;
mod ram;
mod stub;

pub use boot::{BootConfig, BootInfo, BootReport, DescriptorSource, ImageRecord, Machine};
pub use dtb::{synthesize, validate_memory_layout};
pub use error::{MachineError, Result};
pub use images::{load_image, sha256_hex, LoadedImage};
pub use ram::GuestRam;
pub use stub::{
    dispatch_stub, firmware_info, BootRom, FW_INFO_LEN, FW_INFO_MAGIC, FW_INFO_VERSION, STUB_LEN,
};

//! SoC model for the tandem platform.
//!
//! Pure data and pure derivations: the physical address map, the board
//! specification, per-core descriptors, interrupt numbering and wiring,
//! and the placeholder-device list. Nothing here performs I/O or owns
//! runtime state; the machine crate consumes this model to assemble a
//! bootable instance.

mod board;
mod cores;
mod error;
mod irq;
mod memmap;
mod model;
mod stub_devices;

pub use board::BoardSpec;
pub use cores::{cores_for, CoreDescriptor};
pub use error::{Result, SocError};
pub use irq::{
    compute_topology, ClintLayout, ControllerConfig, CoreWire, InterruptTopology, IrqMap,
    SourceWire, IRQ_M_EXT, IRQ_M_SOFT, IRQ_M_TIMER,
};
pub use memmap::{AddressMap, Region, RegionId};
pub use model::SocModel;
pub use stub_devices::{StubDevice, UNIMPLEMENTED_DEVICES};

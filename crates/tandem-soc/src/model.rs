//! The composed SoC model.

use crate::board::BoardSpec;
use crate::cores::{cores_for, CoreDescriptor};
use crate::error::Result;
use crate::irq::{compute_topology, ClintLayout, ControllerConfig, InterruptTopology, IrqMap};
use crate::stub_devices::{StubDevice, UNIMPLEMENTED_DEVICES};

/// Everything downstream consumers need to agree on about one platform
/// instance: the core set, both controllers' geometry, and the complete
/// interrupt wiring. Built once from a board and the requested core count,
/// then passed around immutably.
#[derive(Debug, Clone, PartialEq)]
pub struct SocModel {
    pub cores: Vec<CoreDescriptor>,
    pub irqs: IrqMap,
    pub plic: ControllerConfig,
    pub clint: ClintLayout,
    pub topology: InterruptTopology,
    pub stubs: &'static [StubDevice],
}

impl SocModel {
    /// Compose the model for `core_count` cores of `board`.
    ///
    /// Fails only on an unsupported core count; everything else is fixed
    /// table data.
    pub fn compose(board: &BoardSpec, core_count: u32) -> Result<SocModel> {
        let cores = cores_for(board, core_count)?;
        let topology = compute_topology(core_count, &board.irq_map)?;
        Ok(SocModel {
            cores,
            irqs: board.irq_map,
            plic: ControllerConfig::new(&board.memmap, core_count),
            clint: ClintLayout::new(&board.memmap),
            topology,
            stubs: UNIMPLEMENTED_DEVICES,
        })
    }

    /// Number of cores in this instance.
    pub fn core_count(&self) -> u32 {
        self.cores.len() as u32
    }
}

//! Per-core descriptors.

use serde::{Deserialize, Serialize};

use crate::board::BoardSpec;
use crate::error::{Result, SocError};

/// One physical execution context. Immutable once built; anything that
/// varies at runtime belongs to the emulator, not the platform model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CoreDescriptor {
    /// Zero-based core index, also the hardware-descriptor `reg` value.
    pub index: u32,
    /// Hart id the core reads from `mhartid`.
    pub hart_id: u32,
    /// ISA capability string.
    pub isa: String,
    /// MMU translation mode name.
    pub mmu_type: String,
    /// Address the core starts executing from at reset.
    pub reset_vector: u64,
}

/// Build the ordered core set for a board.
///
/// Core 0 is always the general-purpose core; core 1, when requested, is
/// the vector-capable one. All cores share the board's reset vector and
/// use their index as hart id.
pub fn cores_for(board: &BoardSpec, core_count: u32) -> Result<Vec<CoreDescriptor>> {
    if !(1..=2).contains(&core_count) || core_count as usize > board.core_isas.len() {
        return Err(SocError::UnsupportedCoreCount {
            requested: core_count,
        });
    }

    let reset_vector = board.reset_vector();
    Ok((0..core_count)
        .map(|index| CoreDescriptor {
            index,
            hart_id: index,
            isa: board.core_isas[index as usize].clone(),
            mmu_type: board.mmu_type.clone(),
            reset_vector,
        })
        .collect())
}

//! Interrupt numbering and wiring.
//!
//! Two layers of interrupt hardware exist on the platform: a shared
//! prioritized controller that fans peripheral lines out to the cores, and
//! a per-core local facility carrying the software and timer lines. This
//! module owns the global interrupt-number assignment, the register
//! geometry of both controllers, and the derivation of the complete wiring
//! table from a core count.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SocError};
use crate::memmap::{AddressMap, RegionId};

/// Machine-mode software interrupt: the local facility's cross-core line.
pub const IRQ_M_SOFT: u32 = 3;
/// Machine-mode timer interrupt: the local facility's timer line.
pub const IRQ_M_TIMER: u32 = 7;
/// Machine-mode external interrupt: the shared controller's per-core output.
pub const IRQ_M_EXT: u32 = 11;

/// Global interrupt-number assignment for the shared controller's inputs.
///
/// Numbers are fixed by table: the serial ports first, then GPIO bank 0
/// line by line, then GPIO bank 1 starting immediately after bank 0 with
/// no gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IrqMap {
    /// Global number of serial port 0's interrupt line.
    pub uart0_irq: u32,
    /// Number of serial ports.
    pub uart_count: u32,
    /// Global number of GPIO bank 0, line 0.
    pub gpio0_irq: u32,
    /// Interrupt lines per GPIO bank (one per pin).
    pub gpio_lines_per_bank: u32,
    /// Number of GPIO banks.
    pub gpio_banks: u32,
}

impl IrqMap {
    /// The duo assignment: serial 16..=20, GPIO 21..=84.
    pub fn duo() -> Self {
        Self {
            uart0_irq: 16,
            uart_count: 5,
            gpio0_irq: 21,
            gpio_lines_per_bank: 32,
            gpio_banks: 2,
        }
    }

    /// Global interrupt number of one serial port.
    ///
    /// Panics when the index names a port the platform does not have; the
    /// caller iterates `0..uart_count`.
    pub fn uart(&self, index: u32) -> u32 {
        assert!(index < self.uart_count, "no uart{index} on this platform");
        self.uart0_irq + index
    }

    /// Global interrupt number of one GPIO line.
    ///
    /// Panics on an out-of-range bank or line.
    pub fn gpio(&self, bank: u32, line: u32) -> u32 {
        assert!(bank < self.gpio_banks, "no gpio bank {bank} on this platform");
        assert!(
            line < self.gpio_lines_per_bank,
            "no line {line} in gpio bank {bank}"
        );
        self.gpio0_irq + bank * self.gpio_lines_per_bank + line
    }

    /// Highest assigned global interrupt number.
    pub fn max_irq(&self) -> u32 {
        self.gpio0_irq + self.gpio_banks * self.gpio_lines_per_bank - 1
    }
}

/// Register geometry of the shared prioritized controller.
///
/// Per-source priority words sit at the base, pending bits above them,
/// then per-context enable bits and per-context threshold/claim blocks at
/// fixed strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ControllerConfig {
    pub base: u64,
    pub size: u64,
    /// Source inputs including the reserved source 0.
    pub num_sources: u32,
    /// Distinct priority levels a source can be programmed to.
    pub num_priorities: u32,
    /// One machine and one supervisor context per core.
    pub num_contexts: u32,
    pub priority_base: u64,
    pub pending_base: u64,
    pub enable_base: u64,
    pub enable_stride: u64,
    pub context_base: u64,
    pub context_stride: u64,
}

impl ControllerConfig {
    /// Geometry for `core_count` cores, placed per the address map.
    pub fn new(map: &AddressMap, core_count: u32) -> Self {
        let plic = map.region(RegionId::Plic);
        Self {
            base: plic.base,
            size: plic.size,
            num_sources: 208,
            num_priorities: 7,
            num_contexts: core_count * 2,
            priority_base: 0x0,
            pending_base: 0x1000,
            enable_base: 0x2000,
            enable_stride: 0x80,
            context_base: 0x20_0000,
            context_stride: 0x1000,
        }
    }

    /// Highest usable source number, as advertised to the booted software
    /// (`riscv,ndev`). Source 0 is reserved and never wired.
    pub fn ndev(&self) -> u32 {
        self.num_sources - 1
    }

    /// Offset of one context's enable-bit block.
    pub fn enable_offset(&self, context: u32) -> u64 {
        self.enable_base + u64::from(context) * self.enable_stride
    }

    /// Offset of one context's threshold/claim block.
    pub fn context_offset(&self, context: u32) -> u64 {
        self.context_base + u64::from(context) * self.context_stride
    }
}

/// Split layout of the per-core local facility: a software-interrupt block
/// at the base with the machine timer directly above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClintLayout {
    pub base: u64,
    pub size: u64,
    /// Bytes occupied by the software-interrupt block.
    pub swi_size: u64,
    /// Bytes occupied by the timer block.
    pub mtimer_size: u64,
    /// Offset of the per-core compare registers within the timer block.
    pub mtimecmp_offset: u64,
    /// Offset of the time register within the timer block.
    pub mtime_offset: u64,
}

impl ClintLayout {
    pub fn new(map: &AddressMap) -> Self {
        let clint = map.region(RegionId::Clint);
        Self {
            base: clint.base,
            size: clint.size,
            swi_size: 0x4000,
            mtimer_size: 0x8000,
            mtimecmp_offset: 0x0,
            mtime_offset: 0x7ff8,
        }
    }

    /// Base of the software-interrupt block.
    pub fn swi_base(&self) -> u64 {
        self.base
    }

    /// Base of the timer block.
    pub fn mtimer_base(&self) -> u64 {
        self.base + self.swi_size
    }

    /// Physical address of the time register.
    pub fn mtime_addr(&self) -> u64 {
        self.mtimer_base() + self.mtime_offset
    }

    /// Physical address of one core's compare register.
    pub fn mtimecmp_addr(&self, core: u32) -> u64 {
        self.mtimer_base() + self.mtimecmp_offset + u64::from(core) * 8
    }
}

/// One peripheral output line wired to a numbered input of the shared
/// controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceWire {
    /// Region of the peripheral driving the line.
    pub source: RegionId,
    /// Global interrupt number of the controller input.
    pub irq: u32,
}

/// One line into a core's local interrupt facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CoreWire {
    pub core: u32,
    /// Local line id on that core.
    pub line: u32,
}

/// Complete interrupt wiring for one platform instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterruptTopology {
    pub core_count: u32,
    /// Peripheral lines into the shared controller, in global-number order.
    pub sources: Vec<SourceWire>,
    /// The shared controller's output to each core's external line. One
    /// entry per core.
    pub external: Vec<CoreWire>,
    /// Local facility lines, (software, timer) per core in core order.
    pub local: Vec<CoreWire>,
}

/// Derive the full wiring table for `core_count` cores.
///
/// Pure: the same inputs always yield the same table. Fails unless the
/// count is 1 or 2 — the general-purpose core boots alone or together with
/// the vector core, never more.
pub fn compute_topology(core_count: u32, irqs: &IrqMap) -> Result<InterruptTopology> {
    if !(1..=2).contains(&core_count) {
        return Err(SocError::UnsupportedCoreCount {
            requested: core_count,
        });
    }

    let mut sources = Vec::new();
    for index in 0..irqs.uart_count {
        sources.push(SourceWire {
            source: RegionId::uart(index),
            irq: irqs.uart(index),
        });
    }
    for bank in 0..irqs.gpio_banks {
        for line in 0..irqs.gpio_lines_per_bank {
            sources.push(SourceWire {
                source: RegionId::gpio(bank),
                irq: irqs.gpio(bank, line),
            });
        }
    }

    let external = (0..core_count)
        .map(|core| CoreWire {
            core,
            line: IRQ_M_EXT,
        })
        .collect();

    let mut local = Vec::with_capacity(core_count as usize * 2);
    for core in 0..core_count {
        local.push(CoreWire {
            core,
            line: IRQ_M_SOFT,
        });
        local.push(CoreWire {
            core,
            line: IRQ_M_TIMER,
        });
    }

    Ok(InterruptTopology {
        core_count,
        sources,
        external,
        local,
    })
}

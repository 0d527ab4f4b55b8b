//! Board specification: the table that binds one SoC variant together.
//!
//! Everything that distinguishes a board revision lives here as data: the
//! physical address map, the clock tree constants, the per-core capability
//! strings, and the reset-time boot constants. Supporting a new revision
//! means authoring another preset, not changing platform code.

use serde::{Deserialize, Serialize};

use crate::irq::IrqMap;
use crate::memmap::{AddressMap, Region, RegionId};

/// Static description of one board variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoardSpec {
    /// Short machine name used in reports and logs.
    pub name: String,
    /// Human-readable model string advertised to the booted software.
    pub model: String,
    /// Compatible string advertised to the booted software.
    pub compatible: String,
    /// Physical address map.
    pub memmap: AddressMap,
    /// Global interrupt-number assignment.
    pub irq_map: IrqMap,
    /// ISA capability string per core, in core-index order. The length of
    /// this vector is the maximum supported core count.
    pub core_isas: Vec<String>,
    /// MMU translation mode advertised for every core.
    pub mmu_type: String,
    /// Reference clock feeding the serial ports.
    pub ref_clock_hz: u32,
    /// Always-on RTC clock.
    pub rtc_clock_hz: u32,
    /// Timer tick frequency advertised to the booted software.
    pub timebase_hz: u32,
    /// Core clock frequency advertised to the booted software.
    pub cpu_clock_hz: u32,
    /// Fixed DRAM address core 0 jumps to after the reset stub runs.
    pub firmware_entry: u64,
    /// The single DRAM size this board ships with.
    pub default_ram_size: u64,
    /// Kernel command line used when the caller supplies none.
    pub default_bootargs: String,
}

impl BoardSpec {
    /// The dual-core devkit: one general-purpose core, one vector-capable
    /// core, 2 GiB of DRAM at the bottom of the address space.
    pub fn duo() -> Self {
        use RegionId::*;
        let r = |id, base, size| Region { id, base, size };
        let memmap = AddressMap::new(vec![
            r(Dram, 0x0000_0000, 0x8000_0000),
            r(KpuL2Cache, 0x8000_0000, 0x0020_0000),
            r(Sram, 0x8020_0000, 0x0020_0000),
            r(KpuConfig, 0x8040_0000, 0x0000_0800),
            r(Fft, 0x8040_0800, 0x0000_0400),
            r(Ai2dEngine, 0x8040_0c00, 0x0000_0800),
            r(Gsdma, 0x8080_0000, 0x0000_4000),
            r(Dma, 0x8080_4000, 0x0000_4000),
            r(GzipDecomp, 0x8080_8000, 0x0000_4000),
            r(NonAi2d, 0x8080_c000, 0x0000_4000),
            r(Isp, 0x9000_0000, 0x0000_8000),
            r(Dewarp, 0x9000_8000, 0x0000_1000),
            r(CsiRx, 0x9000_9000, 0x0000_2000),
            r(H264, 0x9040_0000, 0x0001_0000),
            r(Gfx2p5d, 0x9080_0000, 0x0004_0000),
            r(VideoOut, 0x9084_0000, 0x0001_0000),
            r(VideoOutConfig, 0x9085_0000, 0x0000_1000),
            r(Gfx3d, 0x90a0_0000, 0x0000_0800),
            r(Pmu, 0x9100_0000, 0x0000_0c00),
            r(Rtc, 0x9100_0c00, 0x0000_0400),
            r(Cmu, 0x9110_0000, 0x0000_1000),
            r(Rmu, 0x9110_1000, 0x0000_1000),
            r(BootCtrl, 0x9110_2000, 0x0000_1000),
            r(Power, 0x9110_3000, 0x0000_1000),
            r(Mailbox, 0x9110_4000, 0x0000_1000),
            r(Iomux, 0x9110_5000, 0x0000_0800),
            r(Timer, 0x9110_5800, 0x0000_0800),
            r(Wdt0, 0x9110_6000, 0x0000_0800),
            r(Wdt1, 0x9110_6800, 0x0000_0800),
            r(ThermalSensor, 0x9110_7000, 0x0000_0800),
            r(Hdi, 0x9110_7800, 0x0000_0800),
            r(Stc, 0x9110_8000, 0x0000_0800),
            r(BootRom, 0x9120_0000, 0x0001_0000),
            r(Security, 0x9121_0000, 0x0000_8000),
            r(Uart0, 0x9140_0000, 0x0000_1000),
            r(Uart1, 0x9140_1000, 0x0000_1000),
            r(Uart2, 0x9140_2000, 0x0000_1000),
            r(Uart3, 0x9140_3000, 0x0000_1000),
            r(Uart4, 0x9140_4000, 0x0000_1000),
            r(I2c0, 0x9140_5000, 0x0000_1000),
            r(I2c1, 0x9140_6000, 0x0000_1000),
            r(I2c2, 0x9140_7000, 0x0000_1000),
            r(I2c3, 0x9140_8000, 0x0000_1000),
            r(I2c4, 0x9140_9000, 0x0000_1000),
            r(Pwm, 0x9140_a000, 0x0000_1000),
            r(Gpio0, 0x9140_b000, 0x0000_1000),
            r(Gpio1, 0x9140_c000, 0x0000_1000),
            r(Adc, 0x9140_d000, 0x0000_1000),
            r(AudioCodec, 0x9140_e000, 0x0000_1000),
            r(I2s, 0x9140_f000, 0x0000_1000),
            r(Usb0, 0x9150_0000, 0x0001_0000),
            r(Usb1, 0x9154_0000, 0x0001_0000),
            r(Sd0, 0x9158_0000, 0x0000_1000),
            r(Sd1, 0x9158_1000, 0x0000_1000),
            r(Qspi0, 0x9158_2000, 0x0000_1000),
            r(Qspi1, 0x9158_3000, 0x0000_1000),
            r(Spi, 0x9158_4000, 0x0000_1000),
            r(HighSysConfig, 0x9158_5000, 0x0000_0400),
            r(DdrConfig, 0x9800_0000, 0x0200_0000),
            r(Flash, 0xc000_0000, 0x0800_0000),
            r(Plic, 0xf000_0000, 0x0040_0000),
            r(Clint, 0xf040_0000, 0x0040_0000),
        ]);

        Self {
            name: "tandem-duo".into(),
            model: "tandem duo devkit".into(),
            compatible: "tandem,duo".into(),
            memmap,
            irq_map: IrqMap::duo(),
            core_isas: vec!["rv64imafdcsu".into(), "rv64imafdcvsu".into()],
            mmu_type: "riscv,sv39".into(),
            ref_clock_hz: 50_000_000,
            rtc_clock_hz: 32_768,
            timebase_hz: 27_000_000,
            cpu_clock_hz: 1_600_000_000,
            firmware_entry: 0x0800_0000,
            default_ram_size: 0x8000_0000,
            default_bootargs: "console=ttyS0,115200n8 debug loglevel=7".into(),
        }
    }

    /// The DRAM region.
    pub fn dram(&self) -> Region {
        self.memmap.region(RegionId::Dram)
    }

    /// The boot ROM region holding the reset-time dispatch stub.
    pub fn boot_rom(&self) -> Region {
        self.memmap.region(RegionId::BootRom)
    }

    /// Address every core starts executing from at reset.
    pub fn reset_vector(&self) -> u64 {
        self.boot_rom().base
    }
}

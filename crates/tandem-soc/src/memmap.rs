//! Physical address map: region identifiers and the immutable lookup table.
//!
//! The table is authored once per board variant and never mutated. Every
//! other component takes physical addresses from here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SocError};

/// Identifier of one physical address region on the SoC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionId {
    Dram,
    KpuL2Cache,
    Sram,
    KpuConfig,
    Fft,
    Ai2dEngine,
    Gsdma,
    Dma,
    GzipDecomp,
    NonAi2d,
    Isp,
    Dewarp,
    CsiRx,
    H264,
    Gfx2p5d,
    VideoOut,
    VideoOutConfig,
    Gfx3d,
    Pmu,
    Rtc,
    Cmu,
    Rmu,
    BootCtrl,
    Power,
    Mailbox,
    Iomux,
    Timer,
    Wdt0,
    Wdt1,
    ThermalSensor,
    Hdi,
    Stc,
    BootRom,
    Security,
    Uart0,
    Uart1,
    Uart2,
    Uart3,
    Uart4,
    I2c0,
    I2c1,
    I2c2,
    I2c3,
    I2c4,
    Pwm,
    Gpio0,
    Gpio1,
    Adc,
    AudioCodec,
    I2s,
    Usb0,
    Usb1,
    Sd0,
    Sd1,
    Qspi0,
    Qspi1,
    Spi,
    HighSysConfig,
    DdrConfig,
    Flash,
    Plic,
    Clint,
}

impl RegionId {
    /// Every region identifier, in address-map order.
    pub const ALL: [RegionId; 62] = [
        RegionId::Dram,
        RegionId::KpuL2Cache,
        RegionId::Sram,
        RegionId::KpuConfig,
        RegionId::Fft,
        RegionId::Ai2dEngine,
        RegionId::Gsdma,
        RegionId::Dma,
        RegionId::GzipDecomp,
        RegionId::NonAi2d,
        RegionId::Isp,
        RegionId::Dewarp,
        RegionId::CsiRx,
        RegionId::H264,
        RegionId::Gfx2p5d,
        RegionId::VideoOut,
        RegionId::VideoOutConfig,
        RegionId::Gfx3d,
        RegionId::Pmu,
        RegionId::Rtc,
        RegionId::Cmu,
        RegionId::Rmu,
        RegionId::BootCtrl,
        RegionId::Power,
        RegionId::Mailbox,
        RegionId::Iomux,
        RegionId::Timer,
        RegionId::Wdt0,
        RegionId::Wdt1,
        RegionId::ThermalSensor,
        RegionId::Hdi,
        RegionId::Stc,
        RegionId::BootRom,
        RegionId::Security,
        RegionId::Uart0,
        RegionId::Uart1,
        RegionId::Uart2,
        RegionId::Uart3,
        RegionId::Uart4,
        RegionId::I2c0,
        RegionId::I2c1,
        RegionId::I2c2,
        RegionId::I2c3,
        RegionId::I2c4,
        RegionId::Pwm,
        RegionId::Gpio0,
        RegionId::Gpio1,
        RegionId::Adc,
        RegionId::AudioCodec,
        RegionId::I2s,
        RegionId::Usb0,
        RegionId::Usb1,
        RegionId::Sd0,
        RegionId::Sd1,
        RegionId::Qspi0,
        RegionId::Qspi1,
        RegionId::Spi,
        RegionId::HighSysConfig,
        RegionId::DdrConfig,
        RegionId::Flash,
        RegionId::Plic,
        RegionId::Clint,
    ];

    /// Stable lower-case name, matching the serialized form.
    pub fn name(self) -> &'static str {
        match self {
            RegionId::Dram => "dram",
            RegionId::KpuL2Cache => "kpu-l2-cache",
            RegionId::Sram => "sram",
            RegionId::KpuConfig => "kpu-config",
            RegionId::Fft => "fft",
            RegionId::Ai2dEngine => "ai2d-engine",
            RegionId::Gsdma => "gsdma",
            RegionId::Dma => "dma",
            RegionId::GzipDecomp => "gzip-decomp",
            RegionId::NonAi2d => "non-ai2d",
            RegionId::Isp => "isp",
            RegionId::Dewarp => "dewarp",
            RegionId::CsiRx => "csi-rx",
            RegionId::H264 => "h264",
            RegionId::Gfx2p5d => "gfx2p5d",
            RegionId::VideoOut => "video-out",
            RegionId::VideoOutConfig => "video-out-config",
            RegionId::Gfx3d => "gfx3d",
            RegionId::Pmu => "pmu",
            RegionId::Rtc => "rtc",
            RegionId::Cmu => "cmu",
            RegionId::Rmu => "rmu",
            RegionId::BootCtrl => "boot-ctrl",
            RegionId::Power => "power",
            RegionId::Mailbox => "mailbox",
            RegionId::Iomux => "iomux",
            RegionId::Timer => "timer",
            RegionId::Wdt0 => "wdt0",
            RegionId::Wdt1 => "wdt1",
            RegionId::ThermalSensor => "thermal-sensor",
            RegionId::Hdi => "hdi",
            RegionId::Stc => "stc",
            RegionId::BootRom => "boot-rom",
            RegionId::Security => "security",
            RegionId::Uart0 => "uart0",
            RegionId::Uart1 => "uart1",
            RegionId::Uart2 => "uart2",
            RegionId::Uart3 => "uart3",
            RegionId::Uart4 => "uart4",
            RegionId::I2c0 => "i2c0",
            RegionId::I2c1 => "i2c1",
            RegionId::I2c2 => "i2c2",
            RegionId::I2c3 => "i2c3",
            RegionId::I2c4 => "i2c4",
            RegionId::Pwm => "pwm",
            RegionId::Gpio0 => "gpio0",
            RegionId::Gpio1 => "gpio1",
            RegionId::Adc => "adc",
            RegionId::AudioCodec => "audio-codec",
            RegionId::I2s => "i2s",
            RegionId::Usb0 => "usb0",
            RegionId::Usb1 => "usb1",
            RegionId::Sd0 => "sd0",
            RegionId::Sd1 => "sd1",
            RegionId::Qspi0 => "qspi0",
            RegionId::Qspi1 => "qspi1",
            RegionId::Spi => "spi",
            RegionId::HighSysConfig => "high-sys-config",
            RegionId::DdrConfig => "ddr-config",
            RegionId::Flash => "flash",
            RegionId::Plic => "plic",
            RegionId::Clint => "clint",
        }
    }

    /// Serial port region by index.
    pub fn uart(index: u32) -> RegionId {
        match index {
            0 => RegionId::Uart0,
            1 => RegionId::Uart1,
            2 => RegionId::Uart2,
            3 => RegionId::Uart3,
            4 => RegionId::Uart4,
            _ => panic!("no uart{index} on this platform"),
        }
    }

    /// GPIO bank region by index.
    pub fn gpio(bank: u32) -> RegionId {
        match bank {
            0 => RegionId::Gpio0,
            1 => RegionId::Gpio1,
            _ => panic!("no gpio bank {bank} on this platform"),
        }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One physical address region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    /// Base physical address.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
}

impl Region {
    /// First address past the region.
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    /// Whether the two regions claim any common address.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

/// Immutable region-id to (base, size) table for one board variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMap {
    regions: Vec<Region>,
}

impl AddressMap {
    /// Build a map from an authored table. Overlap freedom is a
    /// table-authoring obligation checked by [`AddressMap::validate`] in
    /// the variant's tests, not on every lookup.
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Look up a region.
    ///
    /// Panics if the table omits the id: shipped tables are exhaustive and
    /// covered by tests, so a miss is a table-authoring bug, not a runtime
    /// condition.
    pub fn region(&self, id: RegionId) -> Region {
        match self.regions.iter().find(|r| r.id == id) {
            Some(&r) => r,
            None => panic!("region '{id}' missing from address map"),
        }
    }

    /// All regions, in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Number of authored regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// True when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// First pair of overlapping regions, if any.
    pub fn find_overlap(&self) -> Option<(RegionId, RegionId)> {
        for (i, a) in self.regions.iter().enumerate() {
            for b in &self.regions[i + 1..] {
                if a.overlaps(b) {
                    return Some((a.id, b.id));
                }
            }
        }
        None
    }

    /// Reject a table with overlapping regions.
    pub fn validate(&self) -> Result<()> {
        match self.find_overlap() {
            Some((first, second)) => Err(SocError::OverlappingRegions { first, second }),
            None => Ok(()),
        }
    }
}

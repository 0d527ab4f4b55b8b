//! Placeholder peripherals.
//!
//! Most on-chip devices are not modeled: the emulator binds their regions
//! to a generic unimplemented-access handler so guest software touching
//! them gets a well-defined fault instead of silent garbage. The set is
//! pure configuration data; adding a stub means adding a row, not code.

use crate::memmap::RegionId;

/// One address region claimed by a placeholder device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubDevice {
    pub region: RegionId,
    /// Name the unimplemented-access handler reports faults under.
    pub name: &'static str,
}

const fn stub(region: RegionId, name: &'static str) -> StubDevice {
    StubDevice { region, name }
}

/// Every region handled as an unimplemented stub, in address order.
///
/// DRAM, SRAM, the boot ROM, both interrupt controllers, the serial ports,
/// and the GPIO banks are live models and deliberately absent.
pub const UNIMPLEMENTED_DEVICES: &[StubDevice] = &[
    stub(RegionId::KpuL2Cache, "kpu.l2-cache"),
    stub(RegionId::KpuConfig, "kpu.cfg"),
    stub(RegionId::Fft, "fft"),
    stub(RegionId::Ai2dEngine, "ai.2d-engine"),
    stub(RegionId::Gsdma, "gsdma"),
    stub(RegionId::Dma, "dma"),
    stub(RegionId::GzipDecomp, "decomp.gzip"),
    stub(RegionId::NonAi2d, "non-ai.2d"),
    stub(RegionId::Isp, "isp"),
    stub(RegionId::Dewarp, "dewarp"),
    stub(RegionId::CsiRx, "csi.rx"),
    stub(RegionId::H264, "h264"),
    stub(RegionId::Gfx2p5d, "gfx.2p5d"),
    stub(RegionId::VideoOut, "vo"),
    stub(RegionId::VideoOutConfig, "vo.cfg"),
    stub(RegionId::Gfx3d, "gfx.3d"),
    stub(RegionId::Pmu, "pmu"),
    stub(RegionId::Rtc, "rtc"),
    stub(RegionId::Cmu, "cmu"),
    stub(RegionId::Rmu, "rmu"),
    stub(RegionId::BootCtrl, "boot-ctrl"),
    stub(RegionId::Power, "pwr"),
    stub(RegionId::Mailbox, "mailbox"),
    stub(RegionId::Iomux, "iomux"),
    stub(RegionId::Timer, "timer"),
    stub(RegionId::Wdt0, "wdt0"),
    stub(RegionId::Wdt1, "wdt1"),
    stub(RegionId::ThermalSensor, "ts"),
    stub(RegionId::Hdi, "hdi"),
    stub(RegionId::Stc, "stc"),
    stub(RegionId::Security, "security"),
    stub(RegionId::I2c0, "i2c0"),
    stub(RegionId::I2c1, "i2c1"),
    stub(RegionId::I2c2, "i2c2"),
    stub(RegionId::I2c3, "i2c3"),
    stub(RegionId::I2c4, "i2c4"),
    stub(RegionId::Pwm, "pwm"),
    stub(RegionId::Adc, "adc"),
    stub(RegionId::AudioCodec, "codec"),
    stub(RegionId::I2s, "i2s"),
    stub(RegionId::Usb0, "usb0"),
    stub(RegionId::Usb1, "usb1"),
    stub(RegionId::Sd0, "sd0"),
    stub(RegionId::Sd1, "sd1"),
    stub(RegionId::Qspi0, "qspi0"),
    stub(RegionId::Qspi1, "qspi1"),
    stub(RegionId::Spi, "spi"),
    stub(RegionId::HighSysConfig, "hi-sys-cfg"),
    stub(RegionId::DdrConfig, "ddrc.cfg"),
    stub(RegionId::Flash, "flash"),
];

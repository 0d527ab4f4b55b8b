//! Reset-time dispatch stub and firmware hand-off record.
//!
//! Every core leaves reset at the boot ROM base and runs the same ten-word
//! stub: core 0 jumps to the fixed firmware entry in DRAM, every other
//! core parks in a tight self-loop until firmware wakes it over the
//! software interrupt. Directly after the stub sits a small record telling
//! the firmware where to hand off next.

use tandem_soc::BoardSpec;

use crate::error::{MachineError, Result};

/// Stub length: ten 32-bit words.
pub const STUB_LEN: usize = 40;
/// Hand-off record length: six 64-bit fields.
pub const FW_INFO_LEN: usize = 48;

/// Hand-off record magic, "OSBI" read as a little-endian word.
pub const FW_INFO_MAGIC: u64 = 0x4942_534f;
/// Hand-off record layout version.
pub const FW_INFO_VERSION: u64 = 2;
/// Privilege mode the firmware should enter the next stage in (supervisor).
const FW_NEXT_MODE_S: u64 = 1;
/// Core that carries the boot forward.
const BOOT_CORE: u64 = 0;

/// Generate the dispatch stub, as little-endian instruction words.
///
/// The firmware entry is materialized with an `addiw`/`slli` pair, so it
/// must factor into a 12-bit signed mantissa and a shift; every valid
/// entry address is megabyte-aligned, which more than satisfies that.
pub fn dispatch_stub(firmware_entry: u64) -> Vec<u8> {
    assert!(firmware_entry > 0, "firmware entry must be non-zero");
    let shift = firmware_entry.trailing_zeros();
    let mantissa = firmware_entry >> shift;
    assert!(
        mantissa <= 0x7ff && shift <= 63,
        "firmware entry {firmware_entry:#x} is not encodable as addiw+slli"
    );

    let words: [u32; STUB_LEN / 4] = [
        0x0000_0297,                           // auipc  t0, 0x0
        0x0242_8293,                           // addi   t0, t0, 36 (the trap loop below)
        0x3052_9073,                           // csrw   mtvec, t0
        0xf140_2573,                           // csrr   a0, mhartid
        0x0005_0463,                           // beqz   a0, +8 (core 0 proceeds)
        0x0000_006f,                           // j      . (park every other core)
        0x0000_029b | ((mantissa as u32) << 20), // addiw  t0, zero, mantissa
        0x0002_9293 | (shift << 20),           // slli   t0, t0, shift
        0x0002_8067,                           // jr     t0 (firmware entry)
        0x0000_006f,                           // j      . (trap self-loop)
    ];
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Build the hand-off record. `kernel_entry` is 0 when no kernel was
/// loaded and the firmware decides the next stage on its own.
pub fn firmware_info(kernel_entry: u64) -> [u8; FW_INFO_LEN] {
    let fields: [u64; 6] = [
        FW_INFO_MAGIC,
        FW_INFO_VERSION,
        kernel_entry,
        FW_NEXT_MODE_S,
        0, // options
        BOOT_CORE,
    ];
    let mut out = [0u8; FW_INFO_LEN];
    for (chunk, field) in out.chunks_exact_mut(8).zip(fields) {
        chunk.copy_from_slice(&field.to_le_bytes());
    }
    out
}

/// Patched boot ROM contents: the dispatch stub immediately followed by
/// the hand-off record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootRom {
    /// Physical base of the ROM region.
    pub base: u64,
    pub data: Vec<u8>,
    stub_len: usize,
}

impl BootRom {
    /// Generate the stub for `board` and append the hand-off record.
    pub fn patch(board: &BoardSpec, kernel_entry: u64) -> Result<BootRom> {
        let region = board.boot_rom();
        let mut data = dispatch_stub(board.firmware_entry);
        let stub_len = data.len();
        data.extend_from_slice(&firmware_info(kernel_entry));

        if data.len() as u64 > region.size {
            return Err(MachineError::BootRomOverflow {
                need: data.len() as u64,
                avail: region.size,
            });
        }
        Ok(BootRom {
            base: region.base,
            data,
            stub_len,
        })
    }

    /// The dispatch stub bytes.
    pub fn stub(&self) -> &[u8] {
        &self.data[..self.stub_len]
    }

    /// The hand-off record bytes.
    pub fn firmware_info(&self) -> &[u8] {
        &self.data[self.stub_len..]
    }

    /// Physical address of the hand-off record.
    pub fn firmware_info_addr(&self) -> u64 {
        self.base + self.stub_len as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn duo_stub_encodes_the_known_word_sequence() {
        let stub = dispatch_stub(0x0800_0000);
        assert_eq!(stub.len(), STUB_LEN);
        assert_eq!(
            words(&stub),
            vec![
                0x0000_0297,
                0x0242_8293,
                0x3052_9073,
                0xf140_2573,
                0x0005_0463,
                0x0000_006f,
                0x0010_029b, // addiw t0, zero, 1
                0x01b2_9293, // slli  t0, t0, 27
                0x0002_8067,
                0x0000_006f,
            ]
        );
    }

    #[test]
    fn stub_materializes_other_entries() {
        // 0x4000_0000 = 1 << 30.
        let stub = dispatch_stub(0x4000_0000);
        let words = words(&stub);
        assert_eq!(words[6], 0x0010_029b);
        assert_eq!(words[7], 0x01e2_9293);
    }

    #[test]
    #[should_panic(expected = "not encodable")]
    fn stub_rejects_unencodable_entries() {
        dispatch_stub(0x0800_0001);
    }

    #[test]
    fn hand_off_record_layout() {
        let info = firmware_info(0x20_0000);
        assert_eq!(info.len(), FW_INFO_LEN);
        assert_eq!(info[0..8], FW_INFO_MAGIC.to_le_bytes());
        assert_eq!(info[8..16], FW_INFO_VERSION.to_le_bytes());
        assert_eq!(info[16..24], 0x20_0000u64.to_le_bytes());
        assert_eq!(info[24..32], 1u64.to_le_bytes());
        assert_eq!(info[32..40], [0; 8]);
        assert_eq!(info[40..48], [0; 8]);
    }

    #[test]
    fn patched_rom_places_the_record_after_the_stub() {
        let board = BoardSpec::duo();
        let rom = BootRom::patch(&board, 0).unwrap();
        assert_eq!(rom.base, board.boot_rom().base);
        assert_eq!(rom.data.len(), STUB_LEN + FW_INFO_LEN);
        assert_eq!(rom.stub(), &dispatch_stub(board.firmware_entry)[..]);
        assert_eq!(rom.firmware_info(), firmware_info(0));
        assert_eq!(rom.firmware_info_addr(), rom.base + STUB_LEN as u64);
    }
}

//! Flattened blob encoding and decoding.
//!
//! The wire format is the standard open-firmware flattened tree: a fixed
//! header, an empty memory reservation block, a structure block of
//! big-endian tokens, and a deduplicated strings block for property names.

use std::collections::HashMap;
use std::io::Write;

use crate::error::{FdtError, Result};
use crate::tree::{Fdt, NodeId, PropValue};

/// Magic number at offset 0 of every flattened device tree.
pub const FDT_MAGIC: u32 = 0xd00d_feed;
/// Structure version written by the serializer and required of inputs.
pub const FDT_VERSION: u32 = 17;
/// Oldest version readers of our output may implement.
const FDT_LAST_COMP_VERSION: u32 = 16;
/// Ten big-endian u32 header fields.
const HEADER_SIZE: usize = 40;
/// One terminating (0, 0) reservation entry.
const RSVMAP_SIZE: usize = 16;

const FDT_BEGIN_NODE: u32 = 0x1;
const FDT_END_NODE: u32 = 0x2;
const FDT_PROP: u32 = 0x3;
const FDT_NOP: u32 = 0x4;
const FDT_END: u32 = 0x9;

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let end = offset.checked_add(4).ok_or(FdtError::Truncated)?;
    let slice = bytes.get(offset..end).ok_or(FdtError::Truncated)?;
    Ok(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Read a NUL-terminated UTF-8 string starting at `offset`, bounded by `end`.
fn read_cstr(bytes: &[u8], offset: usize, end: usize) -> Result<&str> {
    let window = bytes
        .get(offset..end)
        .ok_or(FdtError::BadString(offset))?;
    let nul = window
        .iter()
        .position(|&b| b == 0)
        .ok_or(FdtError::BadString(offset))?;
    std::str::from_utf8(&window[..nul]).map_err(|_| FdtError::BadString(offset))
}

/// Property-name table for the strings block, deduplicated in first-use order.
#[derive(Default)]
struct StringTable {
    data: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringTable {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&off) = self.offsets.get(name) {
            return off;
        }
        let off = self.data.len() as u32;
        self.data.extend_from_slice(name.as_bytes());
        self.data.push(0);
        self.offsets.insert(name.to_string(), off);
        off
    }
}

impl Fdt {
    /// Serialize the tree into an immutable blob, big-endian throughout.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut strings = StringTable::default();
        let mut structure = Vec::new();
        self.emit_node(self.root(), &mut structure, &mut strings)?;
        push_u32(&mut structure, FDT_END);

        let off_struct = HEADER_SIZE + RSVMAP_SIZE;
        let off_strings = off_struct + structure.len();
        let totalsize = off_strings + strings.data.len();

        let mut out = Vec::with_capacity(totalsize);
        push_u32(&mut out, FDT_MAGIC);
        push_u32(&mut out, totalsize as u32);
        push_u32(&mut out, off_struct as u32);
        push_u32(&mut out, off_strings as u32);
        push_u32(&mut out, HEADER_SIZE as u32);
        push_u32(&mut out, FDT_VERSION);
        push_u32(&mut out, FDT_LAST_COMP_VERSION);
        push_u32(&mut out, self.boot_cpuid());
        push_u32(&mut out, strings.data.len() as u32);
        push_u32(&mut out, structure.len() as u32);
        out.resize(out.len() + RSVMAP_SIZE, 0);
        out.extend_from_slice(&structure);
        out.extend_from_slice(&strings.data);
        Ok(out)
    }

    /// Serialize into a writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    fn emit_node(
        &self,
        id: NodeId,
        structure: &mut Vec<u8>,
        strings: &mut StringTable,
    ) -> Result<()> {
        let node = self.node(id)?;
        push_u32(structure, FDT_BEGIN_NODE);
        structure.extend_from_slice(node.name().as_bytes());
        structure.push(0);
        pad4(structure);
        for (name, value) in node.properties() {
            let encoded = value.encode();
            push_u32(structure, FDT_PROP);
            push_u32(structure, encoded.len() as u32);
            push_u32(structure, strings.intern(name));
            structure.extend_from_slice(&encoded);
            pad4(structure);
        }
        for &child in self.children(id)? {
            self.emit_node(child, structure, strings)?;
        }
        push_u32(structure, FDT_END_NODE);
        Ok(())
    }

    /// Parse an externally produced blob into a tree.
    ///
    /// Property values come back as opaque [`PropValue::Bytes`]; equality
    /// against typed values is wire-level, so round trips compare clean.
    pub fn from_bytes(bytes: &[u8]) -> Result<Fdt> {
        if bytes.len() < HEADER_SIZE {
            return Err(FdtError::Truncated);
        }
        let magic = read_u32(bytes, 0)?;
        if magic != FDT_MAGIC {
            return Err(FdtError::InvalidMagic { found: magic });
        }
        let totalsize = read_u32(bytes, 4)? as usize;
        let off_struct = read_u32(bytes, 8)? as usize;
        let off_strings = read_u32(bytes, 12)? as usize;
        let version = read_u32(bytes, 20)?;
        let boot_cpuid = read_u32(bytes, 28)?;
        let size_strings = read_u32(bytes, 32)? as usize;
        let size_struct = read_u32(bytes, 36)? as usize;

        if version != FDT_VERSION {
            return Err(FdtError::UnsupportedVersion { found: version });
        }
        let struct_end = off_struct
            .checked_add(size_struct)
            .ok_or(FdtError::Truncated)?;
        let strings_end = off_strings
            .checked_add(size_strings)
            .ok_or(FdtError::Truncated)?;
        if totalsize > bytes.len() || struct_end > totalsize || strings_end > totalsize {
            return Err(FdtError::Truncated);
        }

        let mut fdt = Fdt::bare();
        fdt.set_boot_cpuid(boot_cpuid);

        let mut stack: Vec<NodeId> = Vec::new();
        let mut seen_root = false;
        let mut cursor = off_struct;
        loop {
            let token_offset = cursor;
            if cursor + 4 > struct_end {
                return Err(FdtError::Truncated);
            }
            let token = read_u32(bytes, cursor)?;
            cursor += 4;
            match token {
                FDT_BEGIN_NODE => {
                    let name = read_cstr(bytes, cursor, struct_end)?;
                    cursor = align4(cursor + name.len() + 1);
                    match stack.last() {
                        Some(&parent) => {
                            let id = fdt.add_node(parent, name)?;
                            stack.push(id);
                        }
                        None if !seen_root => {
                            seen_root = true;
                            stack.push(fdt.root());
                        }
                        None => return Err(FdtError::UnbalancedTree),
                    }
                }
                FDT_END_NODE => {
                    if stack.pop().is_none() {
                        return Err(FdtError::UnbalancedTree);
                    }
                }
                FDT_PROP => {
                    if cursor + 8 > struct_end {
                        return Err(FdtError::Truncated);
                    }
                    let len = read_u32(bytes, cursor)? as usize;
                    let nameoff = read_u32(bytes, cursor + 4)? as usize;
                    cursor += 8;
                    let value_end = cursor.checked_add(len).ok_or(FdtError::Truncated)?;
                    if value_end > struct_end {
                        return Err(FdtError::Truncated);
                    }
                    let value = bytes[cursor..value_end].to_vec();
                    cursor = align4(value_end);
                    let name = read_cstr(bytes, off_strings + nameoff, strings_end)?;
                    let &target = stack.last().ok_or(FdtError::UnbalancedTree)?;
                    if name == "phandle" && len == 4 {
                        let handle =
                            u32::from_be_bytes([value[0], value[1], value[2], value[3]]);
                        fdt.note_phandle(target, handle);
                    }
                    fdt.set_property(target, name, PropValue::Bytes(value))?;
                }
                FDT_NOP => {}
                FDT_END => {
                    if !stack.is_empty() || !seen_root {
                        return Err(FdtError::UnbalancedTree);
                    }
                    return Ok(fdt);
                }
                other => {
                    return Err(FdtError::BadToken {
                        offset: token_offset,
                        token: other,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Fdt {
        let mut fdt = Fdt::create_root();
        let root = fdt.root();
        fdt.set_str(root, "model", "sample board").unwrap();
        let clk = fdt.add_node(root, "def-clock").unwrap();
        let clk_handle = fdt.allocate_handle(clk).unwrap();
        fdt.set_cell(clk, "clock-frequency", 50_000_000).unwrap();
        fdt.set_str(clk, "compatible", "fixed-clock").unwrap();
        let soc = fdt.add_node(root, "soc").unwrap();
        fdt.set_flag(soc, "ranges").unwrap();
        fdt.set_str_list(soc, "compatible", &["simple-bus"]).unwrap();
        let uart = fdt.add_node(soc, "serial@91400000").unwrap();
        fdt.set_reg(uart, &[(0x9140_0000, 0x400)]).unwrap();
        fdt.set_cells(uart, "clocks", vec![clk_handle]).unwrap();
        fdt.set_property(uart, "blob", PropValue::Bytes(vec![1, 2, 3]))
            .unwrap();
        fdt
    }

    #[test]
    fn header_layout() {
        let bytes = sample_tree().to_bytes().unwrap();
        assert_eq!(read_u32(&bytes, 0).unwrap(), FDT_MAGIC);
        assert_eq!(read_u32(&bytes, 4).unwrap() as usize, bytes.len());
        assert_eq!(read_u32(&bytes, 8).unwrap() as usize, HEADER_SIZE + RSVMAP_SIZE);
        assert_eq!(read_u32(&bytes, 20).unwrap(), FDT_VERSION);
        assert_eq!(read_u32(&bytes, 24).unwrap(), FDT_LAST_COMP_VERSION);
        // reservation block is a single zeroed entry
        assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + RSVMAP_SIZE], &[0u8; 16]);
    }

    #[test]
    fn round_trip_preserves_paths_and_values() {
        let original = sample_tree();
        let bytes = original.to_bytes().unwrap();
        let parsed = Fdt::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.paths(), original.paths());
        for path in original.paths() {
            let a = original.find(&path).unwrap();
            let b = parsed.find(&path).unwrap();
            let node_a = original.node(a).unwrap();
            let node_b = parsed.node(b).unwrap();
            let props_a: Vec<_> = node_a.properties().collect();
            let props_b: Vec<_> = node_b.properties().collect();
            assert_eq!(props_a, props_b, "property mismatch at {path}");
        }
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let bytes = sample_tree().to_bytes().unwrap();
        let reparsed = Fdt::from_bytes(&bytes).unwrap();
        assert_eq!(reparsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn parsed_phandles_resolve() {
        let bytes = sample_tree().to_bytes().unwrap();
        let parsed = Fdt::from_bytes(&bytes).unwrap();
        let clk = parsed.find("/def-clock").unwrap();
        assert_eq!(parsed.resolve_handle(clk).unwrap(), 1);
        assert_eq!(parsed.phandle_node(1), Some(clk));
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = sample_tree().to_bytes().unwrap();
        bytes[0] = 0xff;
        assert!(matches!(
            Fdt::from_bytes(&bytes),
            Err(FdtError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut bytes = sample_tree().to_bytes().unwrap();
        bytes[20..24].copy_from_slice(&3u32.to_be_bytes());
        assert!(matches!(
            Fdt::from_bytes(&bytes),
            Err(FdtError::UnsupportedVersion { found: 3 })
        ));
    }

    #[test]
    fn truncated_blob_rejected() {
        let bytes = sample_tree().to_bytes().unwrap();
        assert!(matches!(
            Fdt::from_bytes(&bytes[..HEADER_SIZE - 4]),
            Err(FdtError::Truncated)
        ));
        assert!(matches!(
            Fdt::from_bytes(&bytes[..bytes.len() - 8]),
            Err(FdtError::Truncated)
        ));
    }

    #[test]
    fn bad_token_rejected() {
        let mut bytes = sample_tree().to_bytes().unwrap();
        let off_struct = read_u32(&bytes, 8).unwrap() as usize;
        bytes[off_struct..off_struct + 4].copy_from_slice(&7u32.to_be_bytes());
        assert!(matches!(
            Fdt::from_bytes(&bytes),
            Err(FdtError::BadToken { token: 7, .. })
        ));
    }

    #[test]
    fn unbalanced_nesting_rejected() {
        let mut bytes = sample_tree().to_bytes().unwrap();
        // Turn the final END_NODE (just before END) into a NOP so the root
        // never closes.
        let off_struct = read_u32(&bytes, 8).unwrap() as usize;
        let size_struct = read_u32(&bytes, 36).unwrap() as usize;
        let last_end_node = off_struct + size_struct - 8;
        assert_eq!(read_u32(&bytes, last_end_node).unwrap(), 0x2);
        bytes[last_end_node..last_end_node + 4].copy_from_slice(&4u32.to_be_bytes());
        assert!(matches!(
            Fdt::from_bytes(&bytes),
            Err(FdtError::UnbalancedTree)
        ));
    }

    #[test]
    fn nop_tokens_skipped() {
        // Hand-build a minimal blob: root node, one NOP, no properties.
        let mut structure = Vec::new();
        push_u32(&mut structure, FDT_NOP);
        push_u32(&mut structure, FDT_BEGIN_NODE);
        push_u32(&mut structure, 0); // empty root name + padding
        push_u32(&mut structure, FDT_NOP);
        push_u32(&mut structure, FDT_END_NODE);
        push_u32(&mut structure, FDT_END);

        let off_struct = HEADER_SIZE + RSVMAP_SIZE;
        let mut bytes = Vec::new();
        push_u32(&mut bytes, FDT_MAGIC);
        push_u32(&mut bytes, (off_struct + structure.len()) as u32);
        push_u32(&mut bytes, off_struct as u32);
        push_u32(&mut bytes, (off_struct + structure.len()) as u32);
        push_u32(&mut bytes, HEADER_SIZE as u32);
        push_u32(&mut bytes, FDT_VERSION);
        push_u32(&mut bytes, FDT_LAST_COMP_VERSION);
        push_u32(&mut bytes, 0);
        push_u32(&mut bytes, 0);
        push_u32(&mut bytes, structure.len() as u32);
        bytes.resize(bytes.len() + RSVMAP_SIZE, 0);
        bytes.extend_from_slice(&structure);

        let fdt = Fdt::from_bytes(&bytes).unwrap();
        assert_eq!(fdt.node_count(), 1);
    }

    #[test]
    fn boot_cpuid_round_trips() {
        let mut fdt = sample_tree();
        fdt.set_boot_cpuid(1);
        let parsed = Fdt::from_bytes(&fdt.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.boot_cpuid(), 1);
    }

    #[test]
    fn write_to_matches_to_bytes() {
        let fdt = sample_tree();
        let mut out = Vec::new();
        fdt.write_to(&mut out).unwrap();
        assert_eq!(out, fdt.to_bytes().unwrap());
    }
}

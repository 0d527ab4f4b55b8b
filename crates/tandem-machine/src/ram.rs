//! Flat guest DRAM.

use std::fmt;

use crate::error::{MachineError, Result};

/// Byte-addressable guest RAM backing one platform instance.
///
/// The whole region is allocated zeroed up front; every access is checked
/// against the configured bounds, so a bad placement fails loudly instead
/// of writing past the guest's memory.
#[derive(Clone)]
pub struct GuestRam {
    base: u64,
    data: Vec<u8>,
}

impl GuestRam {
    pub fn new(base: u64, size: u64) -> Self {
        Self {
            base,
            data: vec![0; size as usize],
        }
    }

    /// First physical address of the region.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// First physical address past the region.
    pub fn end(&self) -> u64 {
        self.base + self.size()
    }

    fn offset(&self, addr: u64, len: usize) -> Result<usize> {
        let fits = addr >= self.base
            && addr
                .checked_add(len as u64)
                .is_some_and(|end| end <= self.end());
        if !fits {
            return Err(MachineError::DramAccess {
                addr,
                len: len as u64,
                base: self.base,
                end: self.end(),
            });
        }
        Ok((addr - self.base) as usize)
    }

    /// Copy bytes into guest memory at a physical address.
    pub fn write(&mut self, addr: u64, bytes: &[u8]) -> Result<()> {
        let offset = self.offset(addr, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Borrow bytes of guest memory at a physical address.
    pub fn read(&self, addr: u64, len: usize) -> Result<&[u8]> {
        let offset = self.offset(addr, len)?;
        Ok(&self.data[offset..offset + len])
    }
}

impl fmt::Debug for GuestRam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestRam")
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &self.data.len())
            .finish_non_exhaustive()
    }
}

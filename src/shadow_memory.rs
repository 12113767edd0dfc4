//! The backing store for labels of guest memory.
//!
//! Instrumented code never touches shadow memory directly: it calls the `LOADV*` and `STOREV*`
//! helpers, and whatever executes those helpers forwards them to a [`ShadowMemory`].

use crate::containers::unordered::UnorderedMap;
use crate::ir::Endness;

/// Storage for the labels of guest memory, one label byte per guest byte.
pub trait ShadowMemory {
    /// The label of `bytes` bytes at `addr`, composed according to `end`. At most 16 bytes.
    fn load_shadow(&self, addr: u64, bytes: u32, end: Endness) -> u128;
    /// Set the label of `bytes` bytes at `addr`. At most 16 bytes.
    fn store_shadow(&mut self, addr: u64, bytes: u32, end: Endness, label: u128);
    /// Mark `[addr, addr+len)` as untainted.
    fn mark_defined(&mut self, addr: u64, len: u64);
    /// Give every byte of `[addr, addr+len)` the label `byte_label`.
    fn mark_tainted(&mut self, addr: u64, len: u64, byte_label: u8);
}

/// Byte position (in significance order, 0 = least significant) of the `i`th byte in memory.
fn significance(i: u32, bytes: u32, end: Endness) -> u32 {
    match end {
        Endness::Little => i,
        Endness::Big => bytes - 1 - i,
    }
}

/// A sparse byte-granular shadow memory. Bytes never written are untainted.
#[derive(Clone, Debug, Default)]
pub struct ByteShadowMemory {
    labels: UnorderedMap<u64, u8>,
}

impl ByteShadowMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The label byte at `addr`
    pub fn byte(&self, addr: u64) -> u8 {
        self.labels.get(&addr).copied().unwrap_or(0)
    }

    fn set_byte(&mut self, addr: u64, label: u8) {
        if label == 0 {
            self.labels.remove(&addr);
        } else {
            self.labels.insert(addr, label);
        }
    }

    /// Number of bytes that currently carry a label
    pub fn tainted_bytes(&self) -> usize {
        self.labels.len()
    }
}

impl ShadowMemory for ByteShadowMemory {
    fn load_shadow(&self, addr: u64, bytes: u32, end: Endness) -> u128 {
        assert!(bytes <= 16, "Shadow load of {} bytes", bytes);
        (0..bytes).fold(0u128, |acc, i| {
            let b = self.byte(addr.wrapping_add(i as u64)) as u128;
            acc | (b << (8 * significance(i, bytes, end)))
        })
    }

    fn store_shadow(&mut self, addr: u64, bytes: u32, end: Endness, label: u128) {
        assert!(bytes <= 16, "Shadow store of {} bytes", bytes);
        for i in 0..bytes {
            let b = (label >> (8 * significance(i, bytes, end))) as u8;
            self.set_byte(addr.wrapping_add(i as u64), b);
        }
    }

    fn mark_defined(&mut self, addr: u64, len: u64) {
        for i in 0..len {
            self.labels.remove(&addr.wrapping_add(i));
        }
    }

    fn mark_tainted(&mut self, addr: u64, len: u64, byte_label: u8) {
        for i in 0..len {
            self.set_byte(addr.wrapping_add(i), byte_label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_memory_is_untainted() {
        let m = ByteShadowMemory::new();
        assert_eq!(m.load_shadow(0x1000, 8, Endness::Little), 0);
        assert_eq!(m.tainted_bytes(), 0);
    }

    #[test]
    fn endianness_orders_bytes() {
        let mut m = ByteShadowMemory::new();
        m.store_shadow(0x100, 4, Endness::Little, 0x11223344);
        assert_eq!(m.byte(0x100), 0x44);
        assert_eq!(m.byte(0x103), 0x11);
        assert_eq!(m.load_shadow(0x100, 4, Endness::Big), 0x44332211);
        assert_eq!(m.load_shadow(0x102, 2, Endness::Little), 0x1122);
    }

    #[test]
    fn defined_then_tainted() {
        let mut m = ByteShadowMemory::new();
        m.mark_tainted(0x10, 4, 0xff);
        m.mark_defined(0x11, 2);
        assert_eq!(m.load_shadow(0x10, 4, Endness::Little), 0xff0000ff);
        assert_eq!(m.tainted_bytes(), 2);
    }
}

//! # Binary layouts
//!
//! All structures are little-endian and packed. They are decoded field by
//! field from byte slices; nothing is ever cast in place, so a short or
//! misaligned mapping yields `None` instead of undefined behavior.

use crate::{PhysicalAddress, RegionKind};
use bitfield_struct::bitfield;

/// Signature at the start of every coreboot table.
pub const LBIO_SIGNATURE: [u8; 4] = *b"LBIO";

#[inline]
fn read_array<const N: usize>(buf: &[u8], off: usize) -> Option<[u8; N]> {
    let end = off.checked_add(N)?;
    buf.get(off..end)?.try_into().ok()
}

#[inline]
pub(crate) fn read_u16_le(buf: &[u8], off: usize) -> Option<u16> {
    read_array(buf, off).map(u16::from_le_bytes)
}

#[inline]
pub(crate) fn read_u32_le(buf: &[u8], off: usize) -> Option<u32> {
    read_array(buf, off).map(u32::from_le_bytes)
}

#[inline]
pub(crate) fn read_u64_le(buf: &[u8], off: usize) -> Option<u64> {
    read_array(buf, off).map(u64::from_le_bytes)
}

/// Coreboot table header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TableHeader {
    /// `"LBIO"`.
    pub signature: [u8; 4],
    /// Size of the header; the first record starts this many bytes in.
    pub header_bytes: u32,
    /// Not verified.
    pub header_checksum: u32,
    /// Size of the record area.
    pub table_bytes: u32,
    /// [`checksum`](crate::checksum) of the record area.
    pub table_checksum: u32,
    /// Number of records.
    pub table_entries: u32,
}

impl TableHeader {
    pub const SIZE: usize = 24;

    #[must_use]
    pub fn read(buf: &[u8]) -> Option<Self> {
        Some(Self {
            signature: read_array(buf, 0)?,
            header_bytes: read_u32_le(buf, 4)?,
            header_checksum: read_u32_le(buf, 8)?,
            table_bytes: read_u32_le(buf, 12)?,
            table_checksum: read_u32_le(buf, 16)?,
            table_entries: read_u32_le(buf, 20)?,
        })
    }
}

/// Generic record header. `size` covers the header itself plus its payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub tag: u32,
    pub size: u32,
}

impl EntryHeader {
    pub const SIZE: usize = 8;

    #[must_use]
    pub fn read(buf: &[u8]) -> Option<Self> {
        Some(Self {
            tag: read_u32_le(buf, 0)?,
            size: read_u32_le(buf, 4)?,
        })
    }
}

/// Record pointing at a CBMEM region (`lb_cbmem_ref`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CbmemRef {
    pub tag: u32,
    pub size: u32,
    pub cbmem_addr: PhysicalAddress,
}

impl CbmemRef {
    pub const SIZE: usize = 16;

    #[must_use]
    pub fn read(buf: &[u8]) -> Option<Self> {
        Some(Self {
            tag: read_u32_le(buf, 0)?,
            size: read_u32_le(buf, 4)?,
            cbmem_addr: PhysicalAddress::new(read_u64_le(buf, 8)?),
        })
    }
}

/// Write cursor of the CBMEM console.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct ConsoleCursor {
    /// Bits 0–27 — Byte offset of the next write into the log buffer.
    #[bits(28)]
    pub offset: u32,

    /// Bits 28–30 — Reserved.
    #[bits(3, default = 0)]
    _reserved_28_30: u8,

    /// Bit 31 — The ring buffer has wrapped at least once.
    pub overflow: bool,
}

/// Header of the CBMEM console (`cbmem_console`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ConsoleHeader {
    /// Capacity of the log buffer in bytes.
    pub size: u32,
    pub cursor: ConsoleCursor,
}

impl ConsoleHeader {
    pub const SIZE: usize = 8;

    #[must_use]
    pub fn read(buf: &[u8]) -> Option<Self> {
        Some(Self {
            size: read_u32_le(buf, 0)?,
            cursor: ConsoleCursor::from_bits(read_u32_le(buf, 4)?),
        })
    }

    /// Bytes of the log buffer currently holding text.
    ///
    /// Up to the cursor while the buffer has not wrapped, the whole buffer otherwise.
    #[must_use]
    pub const fn live_bytes(&self) -> u32 {
        let cursor = self.cursor.offset();
        if !self.cursor.overflow() && cursor < self.size {
            cursor
        } else {
            self.size
        }
    }
}

/// Header of the boot timestamp table (`timestamp_table`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimestampTableHeader {
    pub base_time: u64,
    pub max_entries: u16,
    pub tick_freq_mhz: u16,
    pub num_entries: u32,
}

impl TimestampTableHeader {
    pub const SIZE: usize = 16;
    /// `{ entry_id: u32, entry_stamp: i64 }`
    pub const ENTRY_SIZE: usize = 12;

    #[must_use]
    pub fn read(buf: &[u8]) -> Option<Self> {
        Some(Self {
            base_time: read_u64_le(buf, 0)?,
            max_entries: read_u16_le(buf, 8)?,
            tick_freq_mhz: read_u16_le(buf, 10)?,
            num_entries: read_u32_le(buf, 12)?,
        })
    }
}

/// Header of the TCPA measurement log (`tcpa_table`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TcpaTableHeader {
    pub max_entries: u16,
    pub num_entries: u16,
}

impl TcpaTableHeader {
    pub const SIZE: usize = 4;
    /// `{ pcr: u32, digest_type: [u8; 10], digest: [u8; 64], digest_length: u32, name: [u8; 50] }`
    pub const ENTRY_SIZE: usize = 4 + 10 + 64 + 4 + 50;

    #[must_use]
    pub fn read(buf: &[u8]) -> Option<Self> {
        Some(Self {
            max_entries: read_u16_le(buf, 0)?,
            num_entries: read_u16_le(buf, 2)?,
        })
    }
}

/// A CBMEM region whose in-use length is described by its own fixed-size header.
pub trait SelfSizing {
    /// The region slot this layout fills.
    const KIND: RegionKind;

    /// Size of the fixed header that has to be mapped to learn the live size.
    const HEADER_SIZE: usize;

    /// Live payload size following the header, computed from the header bytes.
    ///
    /// Returns `None` if `header` is short or the size does not fit `usize`.
    fn live_payload(header: &[u8]) -> Option<usize>;
}

impl SelfSizing for ConsoleHeader {
    const KIND: RegionKind = RegionKind::Console;
    const HEADER_SIZE: usize = Self::SIZE;

    fn live_payload(header: &[u8]) -> Option<usize> {
        usize::try_from(Self::read(header)?.live_bytes()).ok()
    }
}

impl SelfSizing for TimestampTableHeader {
    const KIND: RegionKind = RegionKind::Timestamps;
    const HEADER_SIZE: usize = Self::SIZE;

    fn live_payload(header: &[u8]) -> Option<usize> {
        let entries = usize::try_from(Self::read(header)?.num_entries).ok()?;
        entries.checked_mul(Self::ENTRY_SIZE)
    }
}

impl SelfSizing for TcpaTableHeader {
    const KIND: RegionKind = RegionKind::Tcpa;
    const HEADER_SIZE: usize = Self::SIZE;

    fn live_payload(header: &[u8]) -> Option<usize> {
        usize::from(Self::read(header)?.num_entries).checked_mul(Self::ENTRY_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console(size: u32, cursor: u32) -> [u8; 8] {
        let mut b = [0u8; 8];
        b[..4].copy_from_slice(&size.to_le_bytes());
        b[4..].copy_from_slice(&cursor.to_le_bytes());
        b
    }

    #[test]
    fn console_live_size_is_cursor_before_wrap() {
        let hdr = console(0x1_0000, 500);
        assert_eq!(ConsoleHeader::live_payload(&hdr), Some(500));
    }

    #[test]
    fn console_live_size_is_capacity_after_wrap() {
        let hdr = console(0x1_0000, (1 << 31) | 500);
        assert_eq!(ConsoleHeader::live_payload(&hdr), Some(0x1_0000));
    }

    #[test]
    fn console_cursor_beyond_capacity_is_clamped() {
        let hdr = console(0x100, 0x2000);
        assert_eq!(ConsoleHeader::live_payload(&hdr), Some(0x100));
    }

    #[test]
    fn console_cursor_reserved_bits_are_masked() {
        let hdr = ConsoleHeader::read(&console(0x1000, 0x7000_0010)).unwrap();
        assert_eq!(hdr.cursor.offset(), 0x10);
        assert!(!hdr.cursor.overflow());
        assert_eq!(hdr.live_bytes(), 0x10);
    }

    #[test]
    fn timestamp_and_tcpa_sizes() {
        let mut ts = [0u8; 16];
        ts[12..].copy_from_slice(&3u32.to_le_bytes());
        assert_eq!(TimestampTableHeader::live_payload(&ts), Some(36));

        let tcpa = [50, 0, 2, 0];
        assert_eq!(TcpaTableHeader::live_payload(&tcpa), Some(264));
        assert_eq!(TcpaTableHeader::ENTRY_SIZE, 132);
    }

    #[test]
    fn short_buffers_decode_to_none() {
        assert_eq!(TableHeader::read(&[0u8; 23]), None);
        assert_eq!(CbmemRef::read(&[0u8; 15]), None);
        assert_eq!(ConsoleHeader::live_payload(&[0u8; 7]), None);
        assert_eq!(read_u32_le(&[1, 2, 3], usize::MAX), None);
    }

    #[test]
    fn cbmem_ref_decodes_address() {
        let mut b = [0u8; 16];
        b[..4].copy_from_slice(&0x17u32.to_le_bytes());
        b[4..8].copy_from_slice(&16u32.to_le_bytes());
        b[8..].copy_from_slice(&0x7fe0_1000u64.to_le_bytes());
        let r = CbmemRef::read(&b).unwrap();
        assert_eq!(r.tag, 0x17);
        assert_eq!(r.cbmem_addr, PhysicalAddress::new(0x7fe0_1000));
    }
}

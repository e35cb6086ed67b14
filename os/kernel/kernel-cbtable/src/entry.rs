//! # Table records
//!
//! A record is decoded in two steps: the generic `{tag, size}` header first,
//! then the payload, but only for the tags this crate acts on. Everything else
//! becomes [`TableEntry::Other`] and is only used to advance the walk.

use crate::layout::{CbmemRef, EntryHeader};

/// Record tags (`LB_TAG_*`) this crate refers to.
pub mod tags {
    pub const SERIAL: u32 = 0x000f;
    pub const TIMESTAMPS: u32 = 0x0016;
    pub const CBMEM_CONSOLE: u32 = 0x0017;
    pub const TCPA_LOG: u32 = 0x0036;
}

/// One decoded table record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableEntry {
    CbmemConsole(CbmemRef),
    Timestamps(CbmemRef),
    TcpaLog(CbmemRef),
    /// Any tag not acted upon; carries only what the walk needs.
    Other { tag: u32, size: u32 },
}

impl TableEntry {
    /// Decodes the record occupying exactly `record`.
    ///
    /// `record` must already be bounded to the record's `size`. Returns `None`
    /// if a region reference is too short to hold its address.
    #[must_use]
    pub fn decode(header: EntryHeader, record: &[u8]) -> Option<Self> {
        let wrap: fn(CbmemRef) -> Self = match header.tag {
            tags::CBMEM_CONSOLE => Self::CbmemConsole,
            tags::TIMESTAMPS => Self::Timestamps,
            tags::TCPA_LOG => Self::TcpaLog,
            tag => {
                return Some(Self::Other {
                    tag,
                    size: header.size,
                });
            }
        };
        CbmemRef::read(record).map(wrap)
    }

    #[must_use]
    pub const fn tag(&self) -> u32 {
        match self {
            Self::CbmemConsole(r) | Self::Timestamps(r) | Self::TcpaLog(r) => r.tag,
            Self::Other { tag, .. } => *tag,
        }
    }

    #[must_use]
    pub const fn size(&self) -> u32 {
        match self {
            Self::CbmemConsole(r) | Self::Timestamps(r) | Self::TcpaLog(r) => r.size,
            Self::Other { size, .. } => *size,
        }
    }
}

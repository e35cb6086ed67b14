use crate::{DeviceState, PhysicalAddress, RegionKind};

/// A physical range could not be mapped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("refusing to map an empty range")]
    EmptyRange,
    #[error("region size overflows the address space")]
    SizeOverflow,
    #[error("unable to map {len} bytes at {address}")]
    Unavailable { address: PhysicalAddress, len: usize },
}

/// The root table is not a valid coreboot table. Always fatal for the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("root mapping of {len} bytes is too small for a table header")]
    RootTooSmall { len: usize },
    #[error("invalid coreboot table signature {found:?}")]
    InvalidSignature { found: [u8; 4] },
    #[error("header size {header_bytes} is smaller than the table header")]
    HeaderTooSmall { header_bytes: u32 },
    #[error("table ends at byte {end} but only {mapped} bytes are mapped")]
    TableOutOfBounds { end: u64, mapped: usize },
    #[error("invalid table checksum 0x{stored:x} vs 0x{computed:x}")]
    ChecksumMismatch { stored: u32, computed: u16 },
    #[error("malformed entry #{index} at offset {offset}: size {size}")]
    MalformedEntry { index: u32, offset: usize, size: u32 },
    #[error("entry #{index} at offset {offset} with size {size} exceeds the table")]
    EntryOutOfBounds { index: u32, offset: usize, size: u32 },
}

/// A single read or write request failed. Other requests are unaffected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("{region} region is not mapped")]
    NotReady { region: RegionKind },
    #[error("invalid parameter")]
    InvalidParameter,
}

/// The device could not complete a lifecycle transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("no memory resource describes the coreboot table")]
    NoMemoryResource,
    #[error("failed to map the root table: {0}")]
    RootUnavailable(MapError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("device is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: DeviceState,
        actual: DeviceState,
    },
}

use kernel_cbtable::{MapError, PhysMap, PhysicalAddress};
use std::cell::Cell;
use std::ptr::NonNull;

/// Serves a raw memory dump as physical memory starting at `base`.
pub struct ImageMapper {
    base: PhysicalAddress,
    bytes: Vec<u8>,
    live: Cell<usize>,
}

impl ImageMapper {
    #[must_use]
    pub const fn new(base: PhysicalAddress, bytes: Vec<u8>) -> Self {
        Self {
            base,
            bytes,
            live: Cell::new(0),
        }
    }

    /// Number of mappings handed out and not yet released.
    #[must_use]
    pub const fn live_mappings(&self) -> usize {
        self.live.get()
    }
}

impl PhysMap for ImageMapper {
    unsafe fn map(&self, pa: PhysicalAddress, len: usize) -> Result<NonNull<u8>, MapError> {
        let bytes = pa
            .offset_from(self.base)
            .and_then(|offset| usize::try_from(offset).ok())
            .and_then(|start| Some(start..start.checked_add(len)?))
            .and_then(|range| self.bytes.get(range))
            .ok_or(MapError::Unavailable { address: pa, len })?;

        self.live.set(self.live.get() + 1);
        Ok(NonNull::from(bytes).cast::<u8>())
    }

    unsafe fn unmap(&self, _va: NonNull<u8>, _len: usize) {
        self.live.set(self.live.get().saturating_sub(1));
    }
}

//! # Region mapping
//!
//! CBMEM regions describe their own length, so they are mapped in two phases:
//!
//! 1. map just the fixed header (a [`ProbeView`], released on drop)
//! 2. compute the live size, release the probe, map header + live payload
//!
//! A failure in either phase leaves the region unmapped and is not fatal to
//! the device. Every successful `map` is paired with exactly one `unmap`.

use crate::layout::SelfSizing;
use crate::{Category, LogConfig, MapError, PhysMap, PhysicalAddress};
use core::ptr::NonNull;
use log::Level;

/// A live read-only mapping of `len > 0` bytes.
///
/// Owned views are released explicitly through [`MappedView::unmap`];
/// dropping one without doing so leaks the mapping.
#[derive(Debug)]
pub struct MappedView {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the view only grants shared reads of firmware memory, which is not
// tied to the mapping thread.
unsafe impl Send for MappedView {}
// SAFETY: see above; there is no interior mutability.
unsafe impl Sync for MappedView {}

impl MappedView {
    /// # Safety
    /// See [`PhysMap::map`].
    unsafe fn map<M: PhysMap>(
        mapper: &M,
        pa: PhysicalAddress,
        len: usize,
        log: &LogConfig,
    ) -> Result<Self, MapError> {
        if len == 0 {
            return Err(MapError::EmptyRange);
        }

        let ptr = unsafe { mapper.map(pa, len) }.inspect_err(|e| {
            cb_log!(log, Category::Pnp, Level::Debug, "map {pa} +{len:#x} failed: {e}");
        })?;
        cb_log!(log, Category::Pnp, Level::Debug, "mapped {pa} +{len:#x}");
        Ok(Self { ptr, len })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` was returned by `PhysMap::map` for `len` bytes and stays
        // valid until `unmap` consumes the view.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Releases the mapping. Must be given the mapper that created it.
    pub fn unmap<M: PhysMap>(self, mapper: &M, log: &LogConfig) {
        cb_log!(log, Category::Pnp, Level::Debug, "unmapping {:p} +{:#x}", self.ptr, self.len);
        // SAFETY: the view is consumed, so this is the only unmap of this mapping.
        unsafe { mapper.unmap(self.ptr, self.len) }
    }
}

/// Scoped phase-1 mapping that is always released when it goes out of scope.
struct ProbeView<'m, M: PhysMap> {
    mapper: &'m M,
    log: &'m LogConfig,
    view: Option<MappedView>,
}

impl<'m, M: PhysMap> ProbeView<'m, M> {
    /// # Safety
    /// See [`PhysMap::map`].
    unsafe fn map(
        mapper: &'m M,
        pa: PhysicalAddress,
        len: usize,
        log: &'m LogConfig,
    ) -> Result<Self, MapError> {
        let view = unsafe { MappedView::map(mapper, pa, len, log) }?;
        Ok(Self {
            mapper,
            log,
            view: Some(view),
        })
    }

    fn as_slice(&self) -> &[u8] {
        match &self.view {
            Some(view) => view.as_slice(),
            None => &[],
        }
    }
}

impl<M: PhysMap> Drop for ProbeView<'_, M> {
    fn drop(&mut self) {
        if let Some(view) = self.view.take() {
            view.unmap(self.mapper, self.log);
        }
    }
}

/// Maps a region whose size is already known, such as the root table.
///
/// # Safety
/// See [`PhysMap::map`].
///
/// # Errors
/// [`MapError::EmptyRange`] for `len == 0`, otherwise whatever the mapper reports.
pub unsafe fn map_fixed<M: PhysMap>(
    mapper: &M,
    pa: PhysicalAddress,
    len: usize,
    log: &LogConfig,
) -> Result<MappedView, MapError> {
    unsafe { MappedView::map(mapper, pa, len, log) }
}

/// Maps the self-describing region `L` at `pa` at its live size.
///
/// The probe mapping is released before the final mapping is attempted,
/// including on every early return.
///
/// # Safety
/// See [`PhysMap::map`]. The caller must ensure `pa` comes from a validated table.
///
/// # Errors
/// [`MapError::SizeOverflow`] if the advertised size does not fit the address
/// space, otherwise whatever the mapper reports for either phase.
pub unsafe fn map_self_sizing<L: SelfSizing, M: PhysMap>(
    mapper: &M,
    pa: PhysicalAddress,
    log: &LogConfig,
) -> Result<MappedView, MapError> {
    let payload = {
        let probe = unsafe { ProbeView::map(mapper, pa, L::HEADER_SIZE, log) }?;
        L::live_payload(probe.as_slice())
    };

    let len = payload
        .and_then(|payload| payload.checked_add(L::HEADER_SIZE))
        .filter(|len| u64::try_from(*len).ok().and_then(|len| pa.checked_add(len)).is_some())
        .ok_or(MapError::SizeOverflow)?;

    cb_log!(
        log,
        Category::Pnp,
        Level::Debug,
        "{} region at {pa} is {len:#x} bytes",
        L::KIND
    );
    unsafe { MappedView::map(mapper, pa, len, log) }
}

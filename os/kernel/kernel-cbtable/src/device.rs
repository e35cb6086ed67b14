//! # Coreboot table device
//!
//! Ties the pieces together along the host's lifecycle:
//!
//! ```text
//! prepare_hardware ──▶ Prepared ──power_up──▶ Active
//!        ▲                ▲                     │
//!        │                └─────power_down──────┘
//! release_hardware (or drop) unmaps whatever is still mapped
//! ```
//!
//! Mapping and unmapping only happen inside these transitions. Requests take
//! `&mut self`, so they are processed one at a time and a write is visible to
//! the very next read. An outer layer that accepts requests concurrently has
//! to funnel them through exclusive access (e.g. a mutex around the device).

use crate::mapper::map_fixed;
use crate::parser::CorebootTable;
use crate::{
    Category, DeviceError, LogConfig, MapError, MemoryRegion, PhysMap, PhysicalAddress,
    RegionKind, RegionSelector, RegionStore, RequestError,
};
use log::Level;

/// Encoded size of a selector value in a write request.
pub const SELECTOR_SIZE: usize = size_of::<u32>();

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceState {
    /// Root table mapped, auxiliary regions not.
    Prepared,
    /// Table validated, auxiliary regions mapped where possible.
    Active,
}

/// The memory range the host assigned to the device: the coreboot table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RootResource {
    pub start: PhysicalAddress,
    pub length: usize,
}

impl RootResource {
    #[must_use]
    pub const fn new(start: PhysicalAddress, length: usize) -> Self {
        Self { start, length }
    }

    /// Picks the memory range out of the device's resource list.
    ///
    /// Other resource types are ignored. If several memory ranges are listed the
    /// last one wins.
    ///
    /// # Errors
    /// [`DeviceError::NoMemoryResource`] if the list has no memory range.
    pub fn from_resources(
        resources: impl IntoIterator<Item = HardwareResource>,
    ) -> Result<Self, DeviceError> {
        resources
            .into_iter()
            .filter_map(|r| match r {
                HardwareResource::Memory(m) => Some(m),
                HardwareResource::Other => None,
            })
            .last()
            .ok_or(DeviceError::NoMemoryResource)
    }
}

/// One entry of a host-provided resource list.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HardwareResource {
    Memory(RootResource),
    /// Interrupts, I/O ports and anything else the device does not use.
    Other,
}

pub struct CbTableDevice<M: PhysMap> {
    mapper: M,
    log: LogConfig,
    store: RegionStore,
    selector: RegionSelector,
    state: DeviceState,
    entry_count: u32,
}

impl<M: PhysMap> CbTableDevice<M> {
    /// Maps the root table at its fixed size.
    ///
    /// # Errors
    /// [`DeviceError::RootUnavailable`] if the mapping fails; the device cannot
    /// be brought up without it.
    pub fn prepare_hardware(
        mapper: M,
        resource: RootResource,
        log: LogConfig,
    ) -> Result<Self, DeviceError> {
        cb_log!(
            &log,
            Category::Init,
            Level::Info,
            "coreboot table resource at {} +{:#x}",
            resource.start,
            resource.length
        );

        // SAFETY: the host assigned this range to the device.
        let view = unsafe { map_fixed(&mapper, resource.start, resource.length, &log) }
            .map_err(|e| {
                cb_log!(&log, Category::Init, Level::Error, "cannot map coreboot table: {e}");
                DeviceError::RootUnavailable(e)
            })?;

        Ok(Self {
            mapper,
            log,
            store: RegionStore::new(MemoryRegion::mapped(resource.start, view)),
            selector: RegionSelector::new(),
            state: DeviceState::Prepared,
            entry_count: 0,
        })
    }

    /// Validates the root table and maps the regions it references.
    ///
    /// Auxiliary regions that fail to map stay unmapped without failing the call.
    ///
    /// # Errors
    /// * [`DeviceError::InvalidState`] unless the device is [`DeviceState::Prepared`]
    /// * [`DeviceError::Table`] if the table is invalid; nothing gets mapped and
    ///   the device stays prepared
    pub fn power_up(&mut self) -> Result<(), DeviceError> {
        self.expect_state(DeviceState::Prepared)?;

        let root = self
            .store
            .region(RegionKind::Root)
            .bytes()
            .ok_or(DeviceError::RootUnavailable(MapError::EmptyRange))?;

        let found = CorebootTable::parse(root)
            .and_then(|table| table.discover(&self.log))
            .inspect_err(|e| {
                cb_log!(&self.log, Category::Init, Level::Error, "invalid coreboot table: {e}");
            })?;

        self.store.map_discovered(&self.mapper, &found, &self.log);
        self.entry_count = found.entry_count;
        self.state = DeviceState::Active;
        cb_log!(
            &self.log,
            Category::Init,
            Level::Debug,
            "active with {} table entries",
            self.entry_count
        );
        Ok(())
    }

    /// Unmaps the auxiliary regions. A no-op unless the device is active.
    pub fn power_down(&mut self) {
        if self.state != DeviceState::Active {
            return;
        }

        self.store.release_auxiliary(&self.mapper, &self.log);
        self.state = DeviceState::Prepared;
        cb_log!(&self.log, Category::Init, Level::Debug, "powered down");
    }

    /// Powers down if needed and unmaps the root table.
    pub fn release_hardware(self) {
        drop(self);
    }

    /// Selects the region returned by the next [`read`](Self::read).
    ///
    /// The first [`SELECTOR_SIZE`] bytes are read as a little-endian `u32`;
    /// anything after them is ignored. Returns the number of bytes consumed.
    ///
    /// # Errors
    /// [`RequestError::InvalidParameter`] for a short buffer or an unknown
    /// selector; the pending selection is unchanged.
    pub fn write(&mut self, input: &[u8]) -> Result<usize, RequestError> {
        let Some(raw) = input.first_chunk::<SELECTOR_SIZE>() else {
            cb_log!(
                &self.log,
                Category::Io,
                Level::Warn,
                "input buffer too small ({} bytes)",
                input.len()
            );
            return Err(RequestError::InvalidParameter);
        };

        let value = u32::from_le_bytes(*raw);
        let kind = self.selector.select(value).inspect_err(|_| {
            cb_log!(&self.log, Category::Io, Level::Warn, "invalid region selector {value}");
        })?;

        cb_log!(&self.log, Category::Io, Level::Debug, "next read returns {kind}");
        Ok(SELECTOR_SIZE)
    }

    /// Copies the selected region into `out` and resets the selection.
    ///
    /// `out` is zero-filled first; then `min(out.len(), region size)` bytes are
    /// copied and that count is returned.
    ///
    /// # Errors
    /// [`RequestError::NotReady`] if the selected region is not mapped.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize, RequestError> {
        let kind = self.selector.consume();
        out.fill(0);

        let Some(bytes) = self.store.region(kind).bytes() else {
            cb_log!(&self.log, Category::Io, Level::Warn, "requested {kind} mapping not present");
            return Err(RequestError::NotReady { region: kind });
        };

        let n = out.len().min(bytes.len());
        out[..n].copy_from_slice(&bytes[..n]);
        cb_log!(&self.log, Category::Io, Level::Trace, "read {n} bytes of {kind}");
        Ok(n)
    }

    #[must_use]
    pub const fn state(&self) -> DeviceState {
        self.state
    }

    /// Number of table entries walked by the last successful [`power_up`](Self::power_up).
    #[must_use]
    pub const fn entry_count(&self) -> u32 {
        self.entry_count
    }

    #[must_use]
    pub const fn region(&self, kind: RegionKind) -> &MemoryRegion {
        self.store.region(kind)
    }

    #[must_use]
    pub const fn selector(&self) -> &RegionSelector {
        &self.selector
    }

    #[must_use]
    pub const fn log_config(&self) -> &LogConfig {
        &self.log
    }

    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    fn expect_state(&self, expected: DeviceState) -> Result<(), DeviceError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DeviceError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}

impl<M: PhysMap> Drop for CbTableDevice<M> {
    fn drop(&mut self) {
        self.power_down();
        self.store.release_root(&self.mapper, &self.log);
    }
}

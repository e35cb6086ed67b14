//! # Region store
//!
//! Owns the four region slots for the lifetime of a device. A slot is either
//! unmapped or holds exactly one live [`MappedView`]; views are only created
//! by [`mapper`](crate::mapper) and only released here.

use crate::layout::{ConsoleHeader, SelfSizing, TcpaTableHeader, TimestampTableHeader};
use crate::mapper::{MappedView, map_self_sizing};
use crate::{
    Candidates, Category, DiscoveredRegions, LogConfig, MapError, PhysMap, PhysicalAddress,
    RegionKind,
};
use log::Level;

/// One region slot. Mapped iff it holds a view, and views are never empty.
#[derive(Debug, Default)]
pub struct MemoryRegion {
    physical_address: PhysicalAddress,
    view: Option<MappedView>,
}

impl MemoryRegion {
    #[must_use]
    pub const fn unmapped(physical_address: PhysicalAddress) -> Self {
        Self {
            physical_address,
            view: None,
        }
    }

    #[must_use]
    pub const fn mapped(physical_address: PhysicalAddress, view: MappedView) -> Self {
        Self {
            physical_address,
            view: Some(view),
        }
    }

    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        self.view.is_some()
    }

    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        self.physical_address
    }

    /// Mapped size in bytes, `0` while unmapped.
    #[must_use]
    pub const fn size(&self) -> usize {
        match &self.view {
            Some(view) => view.len(),
            None => 0,
        }
    }

    /// Current contents, or `None` while unmapped.
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        self.view.as_ref().map(MappedView::as_slice)
    }

    fn release<M: PhysMap>(&mut self, mapper: &M, log: &LogConfig) {
        if let Some(view) = self.view.take() {
            view.unmap(mapper, log);
        }
    }
}

#[derive(Debug)]
pub struct RegionStore {
    root: MemoryRegion,
    console: MemoryRegion,
    timestamps: MemoryRegion,
    tcpa: MemoryRegion,
}

impl RegionStore {
    /// Creates a store around an already mapped root table.
    #[must_use]
    pub fn new(root: MemoryRegion) -> Self {
        Self {
            root,
            console: MemoryRegion::default(),
            timestamps: MemoryRegion::default(),
            tcpa: MemoryRegion::default(),
        }
    }

    #[must_use]
    pub const fn region(&self, kind: RegionKind) -> &MemoryRegion {
        match kind {
            RegionKind::Console => &self.console,
            RegionKind::Timestamps => &self.timestamps,
            RegionKind::Root => &self.root,
            RegionKind::Tcpa => &self.tcpa,
        }
    }

    const fn region_mut(&mut self, kind: RegionKind) -> &mut MemoryRegion {
        match kind {
            RegionKind::Console => &mut self.console,
            RegionKind::Timestamps => &mut self.timestamps,
            RegionKind::Root => &mut self.root,
            RegionKind::Tcpa => &mut self.tcpa,
        }
    }

    /// Maps every discovered auxiliary region.
    ///
    /// Each kind's references are tried in table order and the first one that
    /// maps wins. Failures are logged and never abort the other kinds.
    pub fn map_discovered<M: PhysMap>(
        &mut self,
        mapper: &M,
        found: &DiscoveredRegions,
        log: &LogConfig,
    ) {
        self.map_one::<ConsoleHeader, M>(mapper, &found.console, log);
        self.map_one::<TimestampTableHeader, M>(mapper, &found.timestamps, log);
        self.map_one::<TcpaTableHeader, M>(mapper, &found.tcpa, log);
    }

    fn map_one<L: SelfSizing, M: PhysMap>(
        &mut self,
        mapper: &M,
        candidates: &Candidates,
        log: &LogConfig,
    ) {
        let Some(first) = candidates.first() else {
            return;
        };

        let slot = self.region_mut(L::KIND);
        if slot.is_mapped() {
            cb_log!(
                log,
                Category::Pnp,
                Level::Warn,
                "{} region already mapped at {}",
                L::KIND,
                slot.physical_address
            );
            return;
        }

        for &pa in candidates.as_slice() {
            match map_region::<L, M>(mapper, pa, log) {
                Ok(view) => {
                    *slot = MemoryRegion::mapped(pa, view);
                    return;
                }
                Err(e) => cb_log!(
                    log,
                    Category::Pnp,
                    Level::Warn,
                    "cannot map {} region at {pa}: {e}",
                    L::KIND
                ),
            }
        }

        cb_log!(log, Category::Pnp, Level::Warn, "leaving {} region unmapped", L::KIND);
        *slot = MemoryRegion::unmapped(first);
    }

    /// Unmaps console, timestamps and TCPA log. The root table stays mapped.
    pub fn release_auxiliary<M: PhysMap>(&mut self, mapper: &M, log: &LogConfig) {
        for kind in [RegionKind::Console, RegionKind::Timestamps, RegionKind::Tcpa] {
            self.region_mut(kind).release(mapper, log);
        }
    }

    /// Unmaps the root table.
    pub fn release_root<M: PhysMap>(&mut self, mapper: &M, log: &LogConfig) {
        self.root.release(mapper, log);
    }
}

fn map_region<L: SelfSizing, M: PhysMap>(
    mapper: &M,
    pa: PhysicalAddress,
    log: &LogConfig,
) -> Result<MappedView, MapError> {
    if pa.is_null() {
        return Err(MapError::Unavailable { address: pa, len: L::HEADER_SIZE });
    }
    // SAFETY: `pa` was taken from a table that passed signature, bounds and
    // checksum validation.
    unsafe { map_self_sizing::<L, M>(mapper, pa, log) }
}

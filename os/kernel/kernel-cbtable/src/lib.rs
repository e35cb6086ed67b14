//! # Coreboot Table Support
//!
//! This crate locates and validates the coreboot table ("LBIO" table) that
//! platform firmware leaves in physical memory, and uses it to expose three
//! firmware-maintained CBMEM regions: the circular console log, the boot
//! timestamp table and the measured-boot (TCPA) event log.
//!
//! ## Overview
//!
//! Coreboot hands information to the loaded OS that cannot be discovered by
//! querying hardware directly. The root table is a header followed by a list
//! of variable-length tagged records. Three of those records point at CBMEM
//! regions that are *self-describing*: their size is only known after reading
//! their own header.
//!
//! ```text
//! Firmware
//!     ↓
//! Root table ("LBIO" header + tagged records)
//!     ↓
//! Region references (tag 0x17 console, 0x16 timestamps, 0x36 TCPA log)
//!     ↓
//! CBMEM regions (header + live payload)
//! ```
//!
//! ## Key Components
//!
//! ### Physical Memory Mapping ([`PhysMap`])
//! The mapping primitive is provided by the host. The core decides *when* and
//! *how many bytes* to map, and pairs every successful mapping with exactly
//! one unmap of the same length.
//!
//! ### Table Validation ([`parser`], [`checksum`])
//! * **Signature**: the header must start with `"LBIO"`
//! * **Checksum**: the 16-bit one's complement sum over the record area must
//!   match `table_checksum` before any record is trusted
//! * **Bounds**: every record must fit in the checksummed area and be at least
//!   8 bytes long
//!
//! ### Two-Phase Region Mapping ([`mapper`])
//! 1. Map only the fixed region header (probe)
//! 2. Compute the live payload size from it, release the probe
//! 3. Map header + live payload
//!
//! ### Request Surface ([`device`], [`selector`])
//! A one-shot selector picks the region returned by the next read and resets
//! to the console log after every read.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core::ptr::NonNull;
//! use kernel_cbtable::{
//!     CbTableDevice, LogConfig, MapError, PhysMap, PhysicalAddress, RootResource,
//! };
//!
//! struct IdentityMapper;
//! impl PhysMap for IdentityMapper {
//!     unsafe fn map(&self, pa: PhysicalAddress, len: usize) -> Result<NonNull<u8>, MapError> {
//!         NonNull::new(pa.as_u64() as *mut u8).ok_or(MapError::Unavailable { address: pa, len })
//!     }
//!
//!     unsafe fn unmap(&self, _va: NonNull<u8>, _len: usize) {}
//! }
//!
//! let resource = RootResource::new(PhysicalAddress::new(0x7ff0_0000), 0x1000);
//! let mut device = CbTableDevice::prepare_hardware(IdentityMapper, resource, LogConfig::default())?;
//! device.power_up()?;
//!
//! device.write(&1u32.to_le_bytes())?; // timestamps
//! let mut buf = [0u8; 4096];
//! let n = device.read(&mut buf)?;
//! println!("read {n} bytes of timestamp table");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[macro_use]
mod log_config;

mod address;
pub mod checksum;
pub mod device;
pub mod entry;
mod error;
pub mod layout;
pub mod mapper;
pub mod parser;
pub mod selector;
pub mod store;

use core::ptr::NonNull;

pub use address::PhysicalAddress;
pub use checksum::checksum;
pub use device::{CbTableDevice, DeviceState, HardwareResource, RootResource, SELECTOR_SIZE};
pub use entry::TableEntry;
pub use error::{DeviceError, MapError, RequestError, TableError};
pub use log_config::{Category, LogCategories, LogConfig};
pub use parser::{Candidates, CorebootTable, DiscoveredRegions, MAX_CANDIDATES};
pub use selector::{RegionKind, RegionSelector};
pub use store::{MemoryRegion, RegionStore};

/// Map a physical range for reading and release it again.
/// You provide the implementation (identity map, HHDM, `ioremap`, a file image, ...).
pub trait PhysMap {
    /// Map `len` bytes starting at `pa`.
    ///
    /// `len` is never zero when called by this crate.
    ///
    /// # Safety
    /// The caller must ensure `pa .. pa + len` is firmware-owned memory that may
    /// be mapped. The implementor must return a pointer that stays valid for
    /// reads of `len` bytes until it is handed back to [`PhysMap::unmap`].
    ///
    /// # Errors
    /// Returns [`MapError::Unavailable`] if the range cannot be mapped.
    unsafe fn map(&self, pa: PhysicalAddress, len: usize) -> Result<NonNull<u8>, MapError>;

    /// Release a mapping previously returned by [`PhysMap::map`].
    ///
    /// # Safety
    /// `va` and `len` must be exactly the pointer and length of one live mapping,
    /// and no view into it may be used afterwards.
    unsafe fn unmap(&self, va: NonNull<u8>, len: usize);
}

impl<T: PhysMap + ?Sized> PhysMap for &T {
    unsafe fn map(&self, pa: PhysicalAddress, len: usize) -> Result<NonNull<u8>, MapError> {
        unsafe { (**self).map(pa, len) }
    }

    unsafe fn unmap(&self, va: NonNull<u8>, len: usize) {
        unsafe { (**self).unmap(va, len) }
    }
}

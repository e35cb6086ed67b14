//! # Root table validation and record walk

use crate::entry::TableEntry;
use crate::layout::{EntryHeader, LBIO_SIGNATURE, TableHeader};
use crate::{Category, LogConfig, PhysicalAddress, TableError, checksum};
use log::Level;

/// A coreboot table whose header, bounds and checksum have been verified.
#[derive(Debug, Copy, Clone)]
pub struct CorebootTable<'a> {
    header: TableHeader,
    records: &'a [u8],
}

/// Number of references kept per region kind.
pub const MAX_CANDIDATES: usize = 4;

/// Distinct addresses referencing one region kind, in table order.
///
/// The first one that maps is used; later ones are fallbacks.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    addresses: [PhysicalAddress; MAX_CANDIDATES],
    len: usize,
}

impl Candidates {
    /// Appends `pa` unless it is already listed.
    ///
    /// Returns `false` if the list is full and `pa` was dropped.
    pub fn push(&mut self, pa: PhysicalAddress) -> bool {
        if self.as_slice().contains(&pa) {
            return true;
        }
        let Some(slot) = self.addresses.get_mut(self.len) else {
            return false;
        };
        *slot = pa;
        self.len += 1;
        true
    }

    #[must_use]
    pub fn as_slice(&self) -> &[PhysicalAddress] {
        &self.addresses[..self.len]
    }

    #[must_use]
    pub fn first(&self) -> Option<PhysicalAddress> {
        self.as_slice().first().copied()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Physical locations of the CBMEM regions referenced by the table.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredRegions {
    pub console: Candidates,
    pub timestamps: Candidates,
    pub tcpa: Candidates,
    /// Number of records walked.
    pub entry_count: u32,
}

impl<'a> CorebootTable<'a> {
    /// Validates the table at the start of `root`.
    ///
    /// # Errors
    /// * [`TableError::RootTooSmall`] if `root` cannot hold a header
    /// * [`TableError::InvalidSignature`] unless the table starts with `"LBIO"`
    /// * [`TableError::HeaderTooSmall`] / [`TableError::TableOutOfBounds`] if the
    ///   record area does not lie within `root`
    /// * [`TableError::ChecksumMismatch`] if the record area fails its checksum
    pub fn parse(root: &'a [u8]) -> Result<Self, TableError> {
        let header = TableHeader::read(root).ok_or(TableError::RootTooSmall { len: root.len() })?;
        if header.signature != LBIO_SIGNATURE {
            return Err(TableError::InvalidSignature {
                found: header.signature,
            });
        }

        let start = usize::try_from(header.header_bytes).map_err(|_| TableError::HeaderTooSmall {
            header_bytes: header.header_bytes,
        })?;
        if start < TableHeader::SIZE {
            return Err(TableError::HeaderTooSmall {
                header_bytes: header.header_bytes,
            });
        }

        let end = u64::from(header.header_bytes) + u64::from(header.table_bytes);
        let records = usize::try_from(end)
            .ok()
            .and_then(|end| root.get(start..end))
            .ok_or(TableError::TableOutOfBounds {
                end,
                mapped: root.len(),
            })?;

        let computed = checksum(records);
        if header.table_checksum != u32::from(computed) {
            return Err(TableError::ChecksumMismatch {
                stored: header.table_checksum,
                computed,
            });
        }

        Ok(Self { header, records })
    }

    #[must_use]
    pub const fn header(&self) -> &TableHeader {
        &self.header
    }

    /// The checksummed record area.
    #[must_use]
    pub const fn records(&self) -> &'a [u8] {
        self.records
    }

    /// Iterates over exactly `table_entries` records.
    ///
    /// The iterator yields an error for the first malformed record and ends after it.
    #[must_use]
    pub const fn entries(&self) -> Entries<'a> {
        Entries {
            records: self.records,
            remaining: self.header.table_entries,
            index: 0,
            offset: 0,
        }
    }

    /// Walks every record and collects the referenced region addresses.
    ///
    /// Up to [`MAX_CANDIDATES`] distinct addresses are kept per region kind.
    ///
    /// The whole walk is validated before anything is returned, so a table that
    /// turns out malformed half way never leads to a mapping.
    ///
    /// # Errors
    /// [`TableError::MalformedEntry`] or [`TableError::EntryOutOfBounds`] for the
    /// first bad record.
    pub fn discover(&self, log: &LogConfig) -> Result<DiscoveredRegions, TableError> {
        let mut found = DiscoveredRegions::default();

        for entry in self.entries() {
            let entry = entry?;
            found.entry_count += 1;

            let (slot, what, reference) = match entry {
                TableEntry::CbmemConsole(r) => (&mut found.console, "console", r),
                TableEntry::Timestamps(r) => (&mut found.timestamps, "timestamps", r),
                TableEntry::TcpaLog(r) => (&mut found.tcpa, "tcpa", r),
                TableEntry::Other { tag, size } => {
                    cb_log!(
                        log,
                        Category::Init,
                        Level::Trace,
                        "skipping entry 0x{tag:04x} ({size} bytes)"
                    );
                    continue;
                }
            };

            let pa = reference.cbmem_addr;
            if slot.as_slice().contains(&pa) {
                continue;
            }
            if slot.is_empty() {
                cb_log!(log, Category::Init, Level::Info, "found cbmem {what} at {pa}");
            } else {
                cb_log!(
                    log,
                    Category::Init,
                    Level::Warn,
                    "duplicate cbmem {what} at {pa}, kept as fallback"
                );
            }
            if !slot.push(pa) {
                cb_log!(
                    log,
                    Category::Init,
                    Level::Warn,
                    "too many cbmem {what} references, dropping {pa}"
                );
            }
        }

        Ok(found)
    }
}

/// Iterator over the records of a [`CorebootTable`].
#[derive(Debug, Clone)]
pub struct Entries<'a> {
    records: &'a [u8],
    remaining: u32,
    index: u32,
    offset: usize,
}

impl Entries<'_> {
    fn next_entry(&mut self) -> Result<TableEntry, TableError> {
        let (index, offset) = (self.index, self.offset);
        let out_of_bounds = |size| TableError::EntryOutOfBounds {
            index,
            offset,
            size,
        };

        let rest = self.records.get(offset..).unwrap_or_default();
        let header = EntryHeader::read(rest).ok_or_else(|| out_of_bounds(0))?;

        // A record shorter than its own header would stall or corrupt the walk.
        let size = usize::try_from(header.size).map_err(|_| out_of_bounds(header.size))?;
        if size < EntryHeader::SIZE {
            return Err(TableError::MalformedEntry {
                index,
                offset,
                size: header.size,
            });
        }

        let record = rest.get(..size).ok_or_else(|| out_of_bounds(header.size))?;
        let entry = TableEntry::decode(header, record).ok_or(TableError::MalformedEntry {
            index,
            offset,
            size: header.size,
        })?;

        self.index += 1;
        self.offset += size;
        Ok(entry)
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<TableEntry, TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let entry = self.next_entry();
        self.remaining = if entry.is_ok() { self.remaining - 1 } else { 0 };
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, usize::try_from(self.remaining).ok())
    }
}

impl core::iter::FusedIterator for Entries<'_> {}

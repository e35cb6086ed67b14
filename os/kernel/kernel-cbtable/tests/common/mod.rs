//! Shared fixtures: a fake physical memory that records every map/unmap, and
//! builders for coreboot tables and CBMEM regions.

#![allow(dead_code)]

use kernel_cbtable::entry::tags;
use kernel_cbtable::{MapError, PhysMap, PhysicalAddress, RootResource, checksum};
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;

pub const BASE: u64 = 0x7ff0_0000;
pub const MEMORY_SIZE: usize = 0x10000;

pub const CONSOLE_OFFSET: usize = 0x1000;
pub const TIMESTAMPS_OFFSET: usize = 0x3000;
pub const TCPA_OFFSET: usize = 0x5000;
pub const ROOT_LEN: usize = 0x400;

pub const fn pa(offset: usize) -> PhysicalAddress {
    PhysicalAddress::new(BASE + offset as u64)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Call {
    Map { pa: PhysicalAddress, len: usize },
    Unmap { pa: PhysicalAddress, len: usize },
}

/// A flat byte image standing in for physical memory at [`BASE`].
///
/// Panics on an unmap that does not match a live mapping, and on drop if any
/// mapping is still outstanding.
pub struct FakePhysMemory {
    memory: Box<[u8]>,
    calls: RefCell<Vec<Call>>,
    outstanding: RefCell<Vec<(usize, usize)>>,
    map_count: Cell<usize>,
    fail_calls: Vec<usize>,
    fail_addresses: Vec<PhysicalAddress>,
}

impl FakePhysMemory {
    pub fn new(memory: Vec<u8>) -> Self {
        Self {
            memory: memory.into_boxed_slice(),
            calls: RefCell::new(Vec::new()),
            outstanding: RefCell::new(Vec::new()),
            map_count: Cell::new(0),
            fail_calls: Vec::new(),
            fail_addresses: Vec::new(),
        }
    }

    /// Fails the `n`th call to `map` (zero based).
    pub fn fail_map_call(mut self, n: usize) -> Self {
        self.fail_calls.push(n);
        self
    }

    /// Fails every `map` starting at `pa`.
    pub fn fail_address(mut self, pa: PhysicalAddress) -> Self {
        self.fail_addresses.push(pa);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn maps(&self) -> Vec<(PhysicalAddress, usize)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match *c {
                Call::Map { pa, len } => Some((pa, len)),
                Call::Unmap { .. } => None,
            })
            .collect()
    }

    pub fn unmaps(&self) -> Vec<(PhysicalAddress, usize)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match *c {
                Call::Unmap { pa, len } => Some((pa, len)),
                Call::Map { .. } => None,
            })
            .collect()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.borrow().len()
    }
}

impl PhysMap for FakePhysMemory {
    unsafe fn map(&self, pa: PhysicalAddress, len: usize) -> Result<NonNull<u8>, MapError> {
        let n = self.map_count.get();
        self.map_count.set(n + 1);
        self.calls.borrow_mut().push(Call::Map { pa, len });

        let unavailable = MapError::Unavailable { address: pa, len };
        if len == 0 || self.fail_calls.contains(&n) || self.fail_addresses.contains(&pa) {
            return Err(unavailable);
        }

        let offset = pa
            .offset_from(PhysicalAddress::new(BASE))
            .and_then(|o| usize::try_from(o).ok())
            .ok_or(unavailable)?;
        let bytes = offset
            .checked_add(len)
            .and_then(|end| self.memory.get(offset..end))
            .ok_or(unavailable)?;

        self.outstanding.borrow_mut().push((offset, len));
        Ok(NonNull::from(bytes).cast::<u8>())
    }

    unsafe fn unmap(&self, va: NonNull<u8>, len: usize) {
        let offset = va.as_ptr() as usize - self.memory.as_ptr() as usize;
        let mut outstanding = self.outstanding.borrow_mut();
        let idx = outstanding
            .iter()
            .position(|&m| m == (offset, len))
            .unwrap_or_else(|| panic!("unmap of unknown mapping +{offset:#x} ({len} bytes)"));
        outstanding.remove(idx);
        self.calls.borrow_mut().push(Call::Unmap { pa: pa(offset), len });
    }
}

impl Drop for FakePhysMemory {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert!(
                self.outstanding.borrow().is_empty(),
                "leaked mappings: {:?}",
                self.outstanding.borrow()
            );
        }
    }
}

/// Encodes a `{tag, size}` record with `payload` appended.
pub fn record(tag: u32, payload: &[u8]) -> Vec<u8> {
    let size = u32::try_from(8 + payload.len()).unwrap();
    [&tag.to_le_bytes()[..], &size.to_le_bytes(), payload].concat()
}

/// Encodes a 16-byte CBMEM reference record.
pub fn cbmem_ref(tag: u32, addr: PhysicalAddress) -> Vec<u8> {
    record(tag, &addr.as_u64().to_le_bytes())
}

/// Builds a complete table with a correct record checksum.
pub fn table(entries: &[Vec<u8>]) -> Vec<u8> {
    let body = entries.concat();
    let mut t = Vec::new();
    t.extend_from_slice(b"LBIO");
    t.extend_from_slice(&24u32.to_le_bytes());
    t.extend_from_slice(&0u32.to_le_bytes());
    t.extend_from_slice(&u32::try_from(body.len()).unwrap().to_le_bytes());
    t.extend_from_slice(&u32::from(checksum(&body)).to_le_bytes());
    t.extend_from_slice(&u32::try_from(entries.len()).unwrap().to_le_bytes());
    t.extend_from_slice(&body);
    t
}

/// Rewrites the stored checksum after a test has tampered with the records.
pub fn reseal(t: &mut [u8]) {
    let sum = u32::from(checksum(&t[24..]));
    t[16..20].copy_from_slice(&sum.to_le_bytes());
}

/// CBMEM console with `size` bytes of capacity, a raw `cursor` word and `text`
/// at the start of the buffer.
pub fn console(size: u32, cursor: u32, text: &[u8]) -> Vec<u8> {
    let mut c = Vec::new();
    c.extend_from_slice(&size.to_le_bytes());
    c.extend_from_slice(&cursor.to_le_bytes());
    c.extend_from_slice(text);
    c
}

pub fn timestamps(num_entries: u32) -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&1234u64.to_le_bytes());
    t.extend_from_slice(&64u16.to_le_bytes());
    t.extend_from_slice(&1000u16.to_le_bytes());
    t.extend_from_slice(&num_entries.to_le_bytes());
    for id in 0..num_entries {
        t.extend_from_slice(&id.to_le_bytes());
        t.extend_from_slice(&(i64::from(id) * 100).to_le_bytes());
    }
    t
}

pub fn tcpa(num_entries: u16) -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(&16u16.to_le_bytes());
    t.extend_from_slice(&num_entries.to_le_bytes());
    t.resize(4 + usize::from(num_entries) * 132, 0xa5);
    t
}

/// A memory image being assembled.
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; MEMORY_SIZE],
        }
    }

    pub fn place(mut self, offset: usize, data: &[u8]) -> Self {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_memory(self) -> FakePhysMemory {
        FakePhysMemory::new(self.bytes)
    }
}

pub fn root() -> RootResource {
    RootResource::new(pa(0), ROOT_LEN)
}

/// Console text used by [`standard_image`].
pub const CONSOLE_TEXT: &[u8] = b"coreboot-4.22 bootblock starting...\n";

/// Root table referencing a console with text, 3 timestamps and 2 TCPA entries.
pub fn standard_image() -> Image {
    let cursor = u32::try_from(CONSOLE_TEXT.len()).unwrap();
    let t = table(&[
        record(tags::SERIAL, &[0; 8]),
        cbmem_ref(tags::CBMEM_CONSOLE, pa(CONSOLE_OFFSET)),
        cbmem_ref(tags::TIMESTAMPS, pa(TIMESTAMPS_OFFSET)),
        cbmem_ref(tags::TCPA_LOG, pa(TCPA_OFFSET)),
    ]);
    Image::new()
        .place(0, &t)
        .place(CONSOLE_OFFSET, &console(0x1000, cursor, CONSOLE_TEXT))
        .place(TIMESTAMPS_OFFSET, &timestamps(3))
        .place(TCPA_OFFSET, &tcpa(2))
}

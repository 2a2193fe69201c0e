//! The segment provider contract (§4.7): the external collaborator that
//! hands the heap fresh, page-aligned, contiguous memory on demand.
//!
//! Two implementations are provided. [`MmapSegmentProvider`] is the real
//! one, reserving a large span of address space up front with
//! `mmap(PROT_NONE)` and committing pages into it with `mprotect` as the
//! heap grows, so growth never has to relocate anything already handed
//! out. [`BufferSegmentProvider`] backs the same contract with a single
//! heap buffer and no system calls, for tests.

use std::alloc::{Layout, alloc, dealloc};
use std::ffi::c_void;
use std::ptr::{self, NonNull};

/// A source of page-aligned, contiguous memory extents for a [`crate::heap::Heap`].
///
/// `page_size` is a provider-defined positive multiple of eight, typically
/// a power of two. Every `pages` argument is a count of `page_size()`-sized
/// pages, not a byte count.
pub trait SegmentProvider {
  /// Commit the first `pages` pages, returning the start of the segment.
  /// Called at most once, by [`crate::heap::Heap::init`].
  fn init_segment(&mut self, pages: usize) -> Option<NonNull<u8>>;

  /// Commit `pages` additional pages contiguous with the existing segment,
  /// returning the address at which the new pages begin.
  fn extend_segment(&mut self, pages: usize) -> Option<NonNull<u8>>;

  /// The start of the segment, once `init_segment` has succeeded.
  fn segment_start(&self) -> Option<NonNull<u8>>;

  /// The total number of bytes committed so far.
  fn segment_size(&self) -> usize;

  /// The page size this provider hands out memory in multiples of.
  fn page_size(&self) -> usize;
}

/// Reserves `reservation_bytes` of address space up front with
/// `mmap(PROT_NONE)` and commits pages into the front of that reservation
/// with `mprotect(PROT_READ | PROT_WRITE)` as the heap grows.
///
/// Reserving everything up front guarantees `extend_segment` never needs
/// to move already-committed pages: the reservation is the ceiling on how
/// large this heap can ever grow. `Drop` `munmap`s the whole reservation.
pub struct MmapSegmentProvider {
  reservation: *mut c_void,
  reservation_bytes: usize,
  committed_bytes: usize,
  page_size: usize,
}

impl MmapSegmentProvider {
  /// Reserve `reservation_bytes` (rounded up to a whole number of pages)
  /// of address space, committing none of it yet.
  pub fn new(reservation_bytes: usize) -> Option<Self> {
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    let reservation_bytes = crate::align::pages_for(reservation_bytes, page_size) * page_size;

    let addr = unsafe {
      libc::mmap(
        ptr::null_mut(),
        reservation_bytes,
        libc::PROT_NONE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };
    if addr == libc::MAP_FAILED {
      return None;
    }

    Some(Self { reservation: addr, reservation_bytes, committed_bytes: 0, page_size })
  }

  fn commit(&mut self, pages: usize) -> Option<NonNull<u8>> {
    let grow_by = pages * self.page_size;
    if self.committed_bytes + grow_by > self.reservation_bytes {
      return None;
    }

    let start = unsafe { (self.reservation as *mut u8).add(self.committed_bytes) };
    let rc = unsafe { libc::mprotect(start as *mut c_void, grow_by, libc::PROT_READ | libc::PROT_WRITE) };
    if rc != 0 {
      return None;
    }

    self.committed_bytes += grow_by;
    NonNull::new(start)
  }
}

impl SegmentProvider for MmapSegmentProvider {
  fn init_segment(&mut self, pages: usize) -> Option<NonNull<u8>> {
    debug_assert_eq!(self.committed_bytes, 0, "init_segment called twice");
    self.commit(pages)
  }

  fn extend_segment(&mut self, pages: usize) -> Option<NonNull<u8>> {
    self.commit(pages)
  }

  fn segment_start(&self) -> Option<NonNull<u8>> {
    if self.committed_bytes == 0 { None } else { NonNull::new(self.reservation as *mut u8) }
  }

  fn segment_size(&self) -> usize {
    self.committed_bytes
  }

  fn page_size(&self) -> usize {
    self.page_size
  }
}

impl Drop for MmapSegmentProvider {
  fn drop(&mut self) {
    unsafe { libc::munmap(self.reservation, self.reservation_bytes) };
  }
}

/// Backs the [`SegmentProvider`] contract with a single pre-allocated,
/// page-aligned heap buffer and no system calls, so tests can exercise
/// growth without depending on `mmap`/`mprotect` or real page granularity.
pub struct BufferSegmentProvider {
  ptr: *mut u8,
  layout: Layout,
  capacity: usize,
  committed_bytes: usize,
  page_size: usize,
}

impl BufferSegmentProvider {
  /// Allocate a `capacity`-byte buffer, page size fixed at 4096. `None` if
  /// `capacity` doesn't yield a valid `Layout` or the allocator refuses it,
  /// mirroring [`MmapSegmentProvider::new`]'s sentinel-on-failure contract.
  pub fn new(capacity: usize) -> Option<Self> {
    const PAGE_SIZE: usize = 4096;
    let layout = Layout::from_size_align(capacity, PAGE_SIZE).ok()?;
    let ptr = unsafe { alloc(layout) };
    if ptr.is_null() {
      return None;
    }
    Some(Self { ptr, layout, capacity, committed_bytes: 0, page_size: PAGE_SIZE })
  }

  fn commit(&mut self, pages: usize) -> Option<NonNull<u8>> {
    let grow_by = pages * self.page_size;
    if self.committed_bytes + grow_by > self.capacity {
      return None;
    }
    let start = unsafe { self.ptr.add(self.committed_bytes) };
    self.committed_bytes += grow_by;
    NonNull::new(start)
  }
}

impl SegmentProvider for BufferSegmentProvider {
  fn init_segment(&mut self, pages: usize) -> Option<NonNull<u8>> {
    debug_assert_eq!(self.committed_bytes, 0, "init_segment called twice");
    self.commit(pages)
  }

  fn extend_segment(&mut self, pages: usize) -> Option<NonNull<u8>> {
    self.commit(pages)
  }

  fn segment_start(&self) -> Option<NonNull<u8>> {
    if self.committed_bytes == 0 { None } else { NonNull::new(self.ptr) }
  }

  fn segment_size(&self) -> usize {
    self.committed_bytes
  }

  fn page_size(&self) -> usize {
    self.page_size
  }
}

impl Drop for BufferSegmentProvider {
  fn drop(&mut self) {
    unsafe { dealloc(self.ptr, self.layout) };
  }
}

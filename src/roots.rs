//! The three process-wide roots from the design doc (§3/§5), bundled as
//! fields of an owned value instead of module statics so that a program
//! can run more than one independent heap.

use std::ptr::NonNull;

/// `base`, `end`, and `free_list_head` for a single heap.
///
/// `base` is the address of the first block's head tag; `end` is the
/// address of the last block's foot tag. Both are fixed at construction
/// and only ever move outward as the heap grows — `base` never changes
/// after [`crate::heap::Heap::init`], only `end`.
pub(crate) struct HeapRoots {
  pub(crate) base: NonNull<u8>,
  pub(crate) end: NonNull<u8>,
  pub(crate) free_list_head: Option<NonNull<u8>>,
}

impl HeapRoots {
  pub(crate) fn is_base(&self, head: *mut u8) -> bool {
    head == self.base.as_ptr()
  }

  pub(crate) fn is_end(&self, foot: *mut u8) -> bool {
    foot == self.end.as_ptr()
  }
}

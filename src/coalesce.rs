//! Merging a newly freed block with its physically adjacent neighbors
//! (§4.3). This is the classical Knuth boundary-tag scheme: the previous
//! block's allocation status and size are readable directly from its foot
//! tag, with no free-list traversal required.

use std::ptr::NonNull;

use crate::align::WORD_SIZE;
use crate::block::{alloc_of_tag, foot_of, head_of, prev_block_payload, size_of_tag, write_tag};
use crate::freelist::{delete, insert};
use crate::roots::HeapRoots;

/// Merge the freed block at `payload` with any free physical neighbors,
/// threading the surviving block onto the free list.
///
/// Returns the head address of the block that ends up holding `payload`'s
/// bytes — itself if no merge happened, `prev`'s head if it absorbed
/// backwards. Callers that need to keep operating on "the block that now
/// contains this address" (growth, in particular) must use this return
/// value rather than re-deriving the address themselves; see the open
/// question resolved in `growth::grow`.
pub(crate) unsafe fn coalesce(roots: &mut HeapRoots, payload: *mut u8) -> NonNull<u8> {
  unsafe {
    let head = head_of(payload);
    let foot = foot_of(payload);
    let size = size_of_tag(head);

    let prev_free = !roots.is_base(head) && !alloc_of_tag(head_of(prev_block_payload(payload)));
    let next_free = !roots.is_end(foot) && !alloc_of_tag(foot.add(WORD_SIZE));

    match (prev_free, next_free) {
      (false, false) => {
        let head_nn = NonNull::new_unchecked(head);
        insert(&mut roots.free_list_head, head_nn);
        head_nn
      }
      (false, true) => {
        // absorb next: [head][payload..][ ][next head][next payload][next foot]
        let next_payload = foot.add(2 * WORD_SIZE);
        let next_head = head_of(next_payload);
        let next_size = size_of_tag(next_head);
        let next_foot = foot_of(next_payload);

        let merged_size = size + next_size + 2 * WORD_SIZE;
        write_tag(head, merged_size, false);
        write_tag(next_foot, merged_size, false);

        delete(&mut roots.free_list_head, NonNull::new_unchecked(next_head));
        let head_nn = NonNull::new_unchecked(head);
        insert(&mut roots.free_list_head, head_nn);
        head_nn
      }
      (true, false) => {
        let prev_payload = prev_block_payload(payload);
        let prev_head = head_of(prev_payload);
        let prev_size = size_of_tag(prev_head);

        let merged_size = size + prev_size + 2 * WORD_SIZE;
        write_tag(prev_head, merged_size, false);
        write_tag(foot, merged_size, false);

        let prev_head_nn = NonNull::new_unchecked(prev_head);
        delete(&mut roots.free_list_head, prev_head_nn);
        insert(&mut roots.free_list_head, prev_head_nn);
        prev_head_nn
      }
      (true, true) => {
        let prev_payload = prev_block_payload(payload);
        let prev_head = head_of(prev_payload);
        let prev_size = size_of_tag(prev_head);

        let next_payload = foot.add(2 * WORD_SIZE);
        let next_head = head_of(next_payload);
        let next_size = size_of_tag(next_head);
        let next_foot = foot_of(next_payload);

        let merged_size = size + prev_size + next_size + 4 * WORD_SIZE;
        write_tag(prev_head, merged_size, false);
        write_tag(next_foot, merged_size, false);

        delete(&mut roots.free_list_head, NonNull::new_unchecked(next_head));
        let prev_head_nn = NonNull::new_unchecked(prev_head);
        delete(&mut roots.free_list_head, prev_head_nn);
        insert(&mut roots.free_list_head, prev_head_nn);
        prev_head_nn
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::{payload_of, write_tag as block_write_tag};
  use std::alloc::{Layout, alloc, dealloc};

  /// A scratch heap of three consecutive 8-byte-payload blocks:
  /// [A][B][C], each `WORD*2 + 8` bytes, contiguous in one allocation.
  struct ThreeBlockHeap {
    ptr: *mut u8,
    layout: Layout,
    block_stride: usize,
  }

  impl ThreeBlockHeap {
    fn new() -> Self {
      let block_stride = WORD_SIZE * 2 + 8;
      let layout = Layout::from_size_align(block_stride * 3, 8).unwrap();
      let ptr = unsafe { alloc(layout) };
      assert!(!ptr.is_null());
      let mut heap = Self { ptr, layout, block_stride };
      unsafe { heap.reset_all_allocated() };
      heap
    }

    unsafe fn reset_all_allocated(&mut self) {
      for i in 0..3 {
        let head = unsafe { self.ptr.add(i * self.block_stride) };
        let payload = unsafe { payload_of(head) };
        unsafe {
          block_write_tag(head, 8, true);
          block_write_tag(foot_of(payload), 8, true);
        }
      }
    }

    fn head(&self, i: usize) -> *mut u8 {
      unsafe { self.ptr.add(i * self.block_stride) }
    }

    fn payload(&self, i: usize) -> *mut u8 {
      unsafe { payload_of(self.head(i)) }
    }

    fn roots(&self) -> HeapRoots {
      let base = NonNull::new(self.ptr).unwrap();
      let last_foot = unsafe { foot_of(self.payload(2)) };
      HeapRoots { base, end: NonNull::new(last_foot).unwrap(), free_list_head: None }
    }

    fn mark_free(&self, i: usize) {
      unsafe {
        block_write_tag(self.head(i), 8, false);
        block_write_tag(foot_of(self.payload(i)), 8, false);
      }
    }
  }

  impl Drop for ThreeBlockHeap {
    fn drop(&mut self) {
      unsafe { dealloc(self.ptr, self.layout) };
    }
  }

  #[test]
  fn both_neighbors_allocated_just_inserts() {
    let heap = ThreeBlockHeap::new();
    let mut roots = heap.roots();
    heap.mark_free(1);

    let result = unsafe { coalesce(&mut roots, heap.payload(1)) };
    assert_eq!(result.as_ptr(), heap.head(1));
    assert_eq!(roots.free_list_head, NonNull::new(heap.head(1)));
    assert_eq!(unsafe { size_of_tag(heap.head(1)) }, 8);
  }

  #[test]
  fn free_next_neighbor_absorbs_forward() {
    let heap = ThreeBlockHeap::new();
    let mut roots = heap.roots();
    heap.mark_free(2);
    unsafe { insert(&mut roots.free_list_head, NonNull::new_unchecked(heap.head(2))) };
    heap.mark_free(1);

    let result = unsafe { coalesce(&mut roots, heap.payload(1)) };
    assert_eq!(result.as_ptr(), heap.head(1));
    // merged size = 8 + 8 + 2*WORD
    assert_eq!(unsafe { size_of_tag(heap.head(1)) }, 16 + 2 * WORD_SIZE);
    assert_eq!(unsafe { size_of_tag(heap.end.as_ptr()) }, 16 + 2 * WORD_SIZE);
    assert_eq!(roots.free_list_head, NonNull::new(heap.head(1)));
  }

  #[test]
  fn free_prev_neighbor_absorbs_backward() {
    let heap = ThreeBlockHeap::new();
    let mut roots = heap.roots();
    heap.mark_free(0);
    unsafe { insert(&mut roots.free_list_head, NonNull::new_unchecked(heap.head(0))) };
    heap.mark_free(1);

    let result = unsafe { coalesce(&mut roots, heap.payload(1)) };
    assert_eq!(result.as_ptr(), heap.head(0));
    assert_eq!(unsafe { size_of_tag(heap.head(0)) }, 16 + 2 * WORD_SIZE);
    assert_eq!(roots.free_list_head, NonNull::new(heap.head(0)));
  }

  #[test]
  fn both_neighbors_free_absorbs_both() {
    let heap = ThreeBlockHeap::new();
    let mut roots = heap.roots();
    heap.mark_free(0);
    heap.mark_free(2);
    unsafe {
      insert(&mut roots.free_list_head, NonNull::new_unchecked(heap.head(0)));
      insert(&mut roots.free_list_head, NonNull::new_unchecked(heap.head(2)));
    }
    heap.mark_free(1);

    let result = unsafe { coalesce(&mut roots, heap.payload(1)) };
    assert_eq!(result.as_ptr(), heap.head(0));
    assert_eq!(unsafe { size_of_tag(heap.head(0)) }, 24 + 4 * WORD_SIZE);
    assert_eq!(unsafe { size_of_tag(heap.end.as_ptr()) }, 24 + 4 * WORD_SIZE);
    assert_eq!(roots.free_list_head, NonNull::new(heap.head(0)));
  }
}

//! On-demand heap growth (§4.5): asking the segment provider for more
//! pages and splicing them into the heap as a new free block.

use std::ptr::NonNull;

use crate::align::{WORD_SIZE, pages_for};
use crate::block::{alloc_of_tag, payload_of, size_of_tag, write_tag};
use crate::coalesce::coalesce;
use crate::placement::allocate;
use crate::roots::HeapRoots;
use crate::segment::SegmentProvider;

/// Grow the heap enough to satisfy `requested_size`, then allocate it.
///
/// Returns `None` (heap left untouched) only if the segment provider
/// refuses to extend the segment; any other failure is a logic error.
pub(crate) unsafe fn grow<S: SegmentProvider>(
  roots: &mut HeapRoots,
  provider: &mut S,
  requested_size: usize,
) -> Option<NonNull<u8>> {
  unsafe {
    let end = roots.end.as_ptr();
    let last_allocated = alloc_of_tag(end);
    let tail_free_size = if last_allocated { 0 } else { size_of_tag(end) };

    // Where the newly requested allocation will ultimately be placed: at
    // the existing tail free block's payload if there is one, else the
    // payload of a fresh block starting right past `end`.
    let placement_guess =
      if last_allocated { end.add(2 * WORD_SIZE) } else { end.sub(tail_free_size) };

    let needed_bytes = requested_size - tail_free_size + 2 * WORD_SIZE;
    let page_size = provider.page_size();
    let pages = pages_for(needed_bytes, page_size);

    let new_region_start = provider.extend_segment(pages)?;

    let new_size = pages * page_size - 2 * WORD_SIZE;
    let new_foot = new_region_start.as_ptr().add(WORD_SIZE).add(new_size);
    write_tag(new_region_start.as_ptr(), new_size, false);
    write_tag(new_foot, new_size, false);
    roots.end = NonNull::new_unchecked(new_foot);

    let new_payload = new_region_start.as_ptr().add(WORD_SIZE);
    let coalesced_head = coalesce(roots, new_payload);
    let coalesced_payload = payload_of(coalesced_head.as_ptr());

    // Use coalesce's returned block, not `placement_guess`: if the new
    // region merged backwards with a free tail block, the block that now
    // contains `placement_guess` starts earlier, at `coalesced_payload`.
    // Using the stale guess here would write the new allocation's tags at
    // the wrong offsets (see the "growth open question" in the design
    // doc).
    debug_assert_eq!(coalesced_payload, placement_guess);
    Some(allocate(roots, coalesced_payload, requested_size))
  }
}

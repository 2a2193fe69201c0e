//! # tagalloc - A boundary-tag memory allocator
//!
//! A general-purpose dynamic memory allocator over a contiguous heap
//! obtained from an external segment provider: first-fit placement with
//! splitting, four-case physical-neighbor coalescing, and on-demand
//! growth.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macros and constants
//!   ├── block      - Boundary-tag layout primitives (internal)
//!   ├── freelist   - Doubly linked free list (internal)
//!   ├── roots      - base/end/free_list_head bundle (internal)
//!   ├── coalesce   - Physical-neighbor merging (internal)
//!   ├── placement  - First-fit scan and split/consume (internal)
//!   ├── growth     - On-demand heap growth (internal)
//!   ├── segment    - SegmentProvider trait + mmap/buffer implementations
//!   └── heap       - Heap<S>: the public API
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tagalloc::{Heap, MmapSegmentProvider};
//!
//! let provider = MmapSegmentProvider::new(64 * 1024 * 1024).expect("reservation failed");
//! let mut heap = Heap::init(provider).expect("initial page unavailable");
//!
//! let p = heap.alloc(64).expect("allocation failed");
//! heap.free(Some(p));
//! ```
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! The `Heap<S>` surface itself is safe to call; the pointer arithmetic
//! lives entirely in the internal `block`, `freelist`, `coalesce`,
//! `placement`, and `growth` modules, each a small `unsafe fn` with
//! documented preconditions.

pub mod align;
mod block;
mod coalesce;
mod freelist;
mod growth;
mod heap;
mod placement;
mod roots;
pub mod segment;

pub use heap::{GrowthError, Heap, HeapDump, ValidationError};
pub use segment::{BufferSegmentProvider, MmapSegmentProvider, SegmentProvider};

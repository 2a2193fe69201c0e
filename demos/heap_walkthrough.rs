use std::ptr;

use tagalloc::{Heap, HeapDump, MmapSegmentProvider};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how allocations change the heap.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().read_line(&mut String::new());
}

fn print_dump(label: &str, dump: HeapDump) {
  println!("[{label}] {dump}");
}

fn main() {
  // A 64 MiB reservation, committed one page at a time as the heap grows.
  let provider = MmapSegmentProvider::new(64 * 1024 * 1024).expect("mmap reservation failed");
  let mut heap = Heap::init(provider).expect("initial page unavailable");

  print_dump("start", heap.dump());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate 16 bytes and write a recognizable pattern into it.
  // --------------------------------------------------------------------
  let a = heap.alloc(16).expect("alloc should succeed");
  println!("\n[1] Allocated 16 bytes at {:?}", a);
  unsafe { ptr::write_bytes(a.as_ptr(), 0xAB, 16) };
  print_dump("1", heap.dump());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate a second, larger block.
  // --------------------------------------------------------------------
  let b = heap.alloc(256).expect("alloc should succeed");
  println!("\n[2] Allocated 256 bytes at {:?}", b);
  print_dump("2", heap.dump());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Free the first block, then allocate something small enough to
  //    reuse it.
  // --------------------------------------------------------------------
  heap.free(Some(a));
  println!("\n[3] Freed block 1");
  print_dump("3", heap.dump());

  let c = heap.alloc(12).expect("alloc should succeed");
  println!(
    "[3] Reused block 1's space? {}",
    if c == a { "yes" } else { "no, placed elsewhere" }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Grow a block with realloc, preserving its contents.
  // --------------------------------------------------------------------
  let grown = heap.realloc(Some(c), 4096).expect("realloc should succeed");
  println!("\n[4] Grew block 3 from 12 to 4096 bytes");
  print_dump("4", heap.dump());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Force growth with a large allocation.
  // --------------------------------------------------------------------
  let big = heap.alloc(200_000).expect("growth should satisfy a large request");
  println!("\n[5] Allocated 200000 bytes, triggering heap growth at {:?}", big);
  print_dump("5", heap.dump());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Validate, then free everything and validate again.
  // --------------------------------------------------------------------
  heap.validate().expect("heap should be internally consistent");
  println!("\n[6] validate() reports a consistent heap");

  heap.free(Some(b));
  heap.free(Some(grown));
  heap.free(Some(big));
  heap.validate().expect("heap should still be consistent after freeing everything");
  print_dump("6 (all freed)", heap.dump());

  println!("\n[7] End of walkthrough. Dropping the heap releases the mmap reservation.");
}

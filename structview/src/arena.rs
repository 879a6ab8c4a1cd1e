//! Arenas and foreign memory.
//!
//! An [`Arena`] is an allocation scope: every region it hands out borrows it, and all of them
//! are released at once when the arena is dropped. The borrow checker therefore prevents any
//! region from outliving its arena.
//!
//! Arenas are also the scope that foreign memory (memory the native library allocated itself)
//! gets bound to with [`Arena::reinterpret`]. This module is the only place where raw addresses
//! are turned into regions; everything else in this crate works on bounds-checked regions.

use crate::alloc::{AllocError, Allocator};
use crate::region::RegionMut;
use crate::scalar::Address;
use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::fmt;
use std::ptr::NonNull;
use std::slice;

/// Action run on a reinterpreted region when its arena is dropped.
pub type ReleaseAction = Box<dyn FnOnce(RegionMut<'_>)>;

// A block owned by the arena.
struct Block {
  ptr: NonNull<u8>,
  layout: Layout,
}

// A foreign region bound to the arena, with its release action.
struct Binding {
  address: Address,
  size: usize,
  on_release: ReleaseAction,
}

/// Allocation scope owning the regions it hands out.
///
/// Arenas are single-threaded: they are neither [`Send`] nor [`Sync`].
pub struct Arena {
  blocks: RefCell<Vec<Block>>,
  bindings: RefCell<Vec<Binding>>,
}

impl Arena {
  pub fn new() -> Self {
    Arena {
      blocks: RefCell::new(Vec::new()),
      bindings: RefCell::new(Vec::new()),
    }
  }

  /// Number of blocks currently allocated.
  pub fn allocated_blocks(&self) -> usize {
    self.blocks.borrow().len()
  }

  /// Number of bytes currently allocated.
  pub fn allocated_bytes(&self) -> usize {
    self.blocks.borrow().iter().map(|block| block.layout.size()).sum()
  }

  /// Bind `size` bytes of foreign memory starting at `address` to this arena.
  ///
  /// If provided, `on_release` is run with the region when the arena is dropped, before the
  /// arena frees its own blocks. Release actions run in reverse order of binding.
  ///
  /// # Panics
  ///
  /// Panics if `address` is null.
  ///
  /// # Safety
  ///
  /// `address` must point to `size` bytes that are valid for reads and writes, and that nothing
  /// else accesses, for as long as the arena lives (release action included). Nothing of this is
  /// checked.
  pub unsafe fn reinterpret(
    &self,
    address: Address,
    size: usize,
    on_release: Option<ReleaseAction>,
  ) -> RegionMut<'_> {
    assert!(!address.is_null(), "cannot reinterpret a null address");

    log::trace!("reinterpreting {} bytes at {}", size, address);

    if let Some(on_release) = on_release {
      self.bindings.borrow_mut().push(Binding {
        address,
        size,
        on_release,
      });
    }

    RegionMut::new(slice::from_raw_parts_mut(address.as_mut_ptr(), size))
  }
}

impl Default for Arena {
  fn default() -> Self {
    Arena::new()
  }
}

impl Allocator for Arena {
  fn allocate(&self, size: usize, align: usize) -> Result<RegionMut<'_>, AllocError> {
    if !align.is_power_of_two() {
      return Err(AllocError::InvalidAlign { align });
    }

    // empty regions own nothing but still get a well-aligned address
    if size == 0 {
      // SAFETY: a non-null, aligned pointer is valid for an empty slice
      let bytes = unsafe { slice::from_raw_parts_mut(align as *mut u8, 0) };
      return Ok(RegionMut::new(bytes));
    }

    let layout =
      Layout::from_size_align(size, align).map_err(|_| AllocError::SizeOverflow { size, count: 1 })?;

    // SAFETY: the layout has a non-zero size
    let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) })
      .ok_or(AllocError::OutOfMemory { size, align })?;

    self.blocks.borrow_mut().push(Block { ptr, layout });

    log::trace!("allocated {} bytes at {:p} (align = {})", size, ptr, align);

    // SAFETY: the block is freshly allocated, so no other region aliases it, and it is freed only
    // when the arena is dropped, which cannot happen while the returned region borrows it
    Ok(RegionMut::new(unsafe {
      slice::from_raw_parts_mut(ptr.as_ptr(), size)
    }))
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    let bindings = self.bindings.get_mut();

    if !bindings.is_empty() {
      log::debug!("running {} release action(s)", bindings.len());
    }

    while let Some(binding) = bindings.pop() {
      // SAFETY: guaranteed by the contract of Arena::reinterpret
      let region =
        unsafe { slice::from_raw_parts_mut(binding.address.as_mut_ptr(), binding.size) };
      (binding.on_release)(RegionMut::new(region));
    }

    let blocks = self.blocks.get_mut();

    if !blocks.is_empty() {
      log::debug!("freeing {} block(s)", blocks.len());
    }

    for block in blocks.drain(..) {
      // SAFETY: every block was allocated with its own layout and is freed once
      unsafe { alloc::dealloc(block.ptr.as_ptr(), block.layout) };
    }
  }
}

impl fmt::Debug for Arena {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("Arena")
      .field("blocks", &self.allocated_blocks())
      .field("bytes", &self.allocated_bytes())
      .field("bindings", &self.bindings.borrow().len())
      .finish()
  }
}

/// Turn `size` bytes of foreign memory starting at `address` into a region no scope owns.
///
/// # Panics
///
/// Panics if `address` is null.
///
/// # Safety
///
/// The lifetime of the returned region is chosen by the caller, who must guarantee that the
/// memory stays valid, and is not accessed through anything else, for as long as the region is
/// used.
pub unsafe fn reinterpret_unbound(address: Address, size: usize) -> RegionMut<'static> {
  assert!(!address.is_null(), "cannot reinterpret a null address");

  log::trace!("reinterpreting {} unbound bytes at {}", size, address);

  RegionMut::new(slice::from_raw_parts_mut(address.as_mut_ptr(), size))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::rc::Rc;

  #[test]
  fn allocations_are_zeroed_and_aligned() {
    let arena = Arena::new();

    let a = arena.allocate(24, 8).unwrap();
    let b = arena.allocate(3, 64).unwrap();

    assert_eq!(a.len(), 24);
    assert!(a.as_bytes().iter().all(|&x| x == 0));
    assert_eq!(b.address().raw() % 64, 0);
    assert_eq!(arena.allocated_blocks(), 2);
    assert_eq!(arena.allocated_bytes(), 27);
  }

  #[test]
  fn regions_are_independent() {
    let arena = Arena::new();

    let mut a = arena.allocate(4, 4).unwrap();
    let b = arena.allocate(4, 4).unwrap();
    a.set(0, u32::MAX);

    assert_eq!(b.get::<u32>(0), 0);
  }

  #[test]
  fn zero_sized() {
    let arena = Arena::new();

    for &align in &[1, 8, 64, 4096] {
      let region = arena.allocate(0, align).unwrap();

      assert!(region.is_empty());
      assert!(!region.address().is_null());
      assert_eq!(region.address().raw() % align, 0);
    }

    assert_eq!(arena.allocated_blocks(), 0);
  }

  #[test]
  fn errors() {
    let arena = Arena::new();

    assert_eq!(
      arena.allocate(8, 6).unwrap_err(),
      AllocError::InvalidAlign { align: 6 }
    );
    assert_eq!(
      arena.allocate(usize::MAX, 8).unwrap_err(),
      AllocError::SizeOverflow {
        size: usize::MAX,
        count: 1
      }
    );
  }

  #[test]
  fn release_actions_run_in_reverse_order_on_drop() {
    let mut foreign = [0u32; 2];
    let base = Address::from_ptr(foreign.as_mut_ptr());
    let log = Rc::new(RefCell::new(Vec::new()));

    {
      let arena = Arena::new();

      // each tag gets its own half of the foreign memory
      for tag in 1..=2u32 {
        let log = log.clone();
        let action: ReleaseAction = Box::new(move |region: RegionMut| {
          log.borrow_mut().push((tag, region.get::<u32>(0)));
        });

        let address = base.add((tag as usize - 1) * 4);
        let mut region = unsafe { arena.reinterpret(address, 4, Some(action)) };
        region.set(0, tag * 10);
      }

      // an allocation must not interfere with the release actions
      arena.allocate(16, 8).unwrap();
      assert!(log.borrow().is_empty());
    }

    assert_eq!(*log.borrow(), vec![(2, 20), (1, 10)]);
    assert_eq!(foreign, [10, 20]);
  }

  #[test]
  fn reinterpret_aliases_foreign_memory() {
    let mut foreign = [0u8; 4];
    let address = Address::from_ptr(foreign.as_mut_ptr());

    {
      let arena = Arena::new();
      let mut region = unsafe { arena.reinterpret(address, 4, None) };
      region.set(0, 0x0102_0304u32);
    }

    assert_eq!(foreign, 0x0102_0304u32.to_ne_bytes());
  }

  #[test]
  #[should_panic(expected = "cannot reinterpret a null address")]
  fn reinterpret_null() {
    let arena = Arena::new();
    let _ = unsafe { arena.reinterpret(Address::null(), 4, None) };
  }

  #[test]
  fn unbound() {
    let mut foreign = [0u8; 2];
    let address = Address::from_ptr(foreign.as_mut_ptr());

    unsafe { reinterpret_unbound(address, 2) }.set(0, 0xBEEFu16);

    assert_eq!(foreign, 0xBEEFu16.to_ne_bytes());
  }
}

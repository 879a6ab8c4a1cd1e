//! Allocators.
//!
//! An [`Allocator`] hands out zeroed regions that live as long as the allocator is borrowed. Two
//! allocators are provided:
//!
//! - [`Arena`](crate::arena::Arena), which owns the memory it allocates and releases everything
//!   at once when dropped.
//! - [`SlicingAllocator`], which carves regions out of a bigger region it was given.

use crate::region::RegionMut;
use std::cell::Cell;
use std::error;
use std::fmt;
use std::marker::PhantomData;
use std::slice;

/// Class of types that can allocate zeroed regions.
pub trait Allocator {
  /// Allocate a zeroed region of `size` bytes, aligned on `align` bytes.
  ///
  /// # Errors
  ///
  /// `align` must be a power of two, or [`AllocError::InvalidAlign`] is returned. Other errors
  /// depend on the implementation.
  fn allocate(&self, size: usize, align: usize) -> Result<RegionMut<'_>, AllocError>;

  /// Allocate a zeroed region for `count` contiguous elements of `size` bytes each.
  fn allocate_array(
    &self,
    size: usize,
    align: usize,
    count: usize,
  ) -> Result<RegionMut<'_>, AllocError> {
    let bytes = size
      .checked_mul(count)
      .ok_or(AllocError::SizeOverflow { size, count })?;

    self.allocate(bytes, align)
  }
}

impl<A> Allocator for &A
where
  A: ?Sized + Allocator,
{
  fn allocate(&self, size: usize, align: usize) -> Result<RegionMut<'_>, AllocError> {
    (**self).allocate(size, align)
  }
}

/// Allocation errors.
///
/// Please keep in mind that this `enum` is _non exhaustive_; you will not be able to exhaustively
/// pattern-match against it.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AllocError {
  /// The requested size does not fit in memory addresses.
  SizeOverflow { size: usize, count: usize },
  /// The alignment is not a power of two.
  InvalidAlign { align: usize },
  /// The system allocator failed.
  OutOfMemory { size: usize, align: usize },
  /// A slicing allocator has not enough room left.
  Exhausted { requested: usize, available: usize },
}

impl fmt::Display for AllocError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      AllocError::SizeOverflow { size, count } => write!(
        f,
        "allocation size overflow (size = {}, count = {})",
        size, count
      ),

      AllocError::InvalidAlign { align } => write!(
        f,
        "invalid alignment (align = {}); must be a power of two",
        align
      ),

      AllocError::OutOfMemory { size, align } => {
        write!(f, "out of memory (size = {}, align = {})", size, align)
      }

      AllocError::Exhausted {
        requested,
        available,
      } => write!(
        f,
        "allocator exhausted (requested = {}, available = {})",
        requested, available
      ),
    }
  }
}

impl error::Error for AllocError {}

/// Allocator slicing a region into smaller regions.
///
/// Regions are handed out front to back, each one aligned and zeroed. Nothing is ever freed
/// individually; [`SlicingAllocator::reset`] makes the whole region available again.
pub struct SlicingAllocator<'a> {
  base: *mut u8,
  len: usize,
  cursor: Cell<usize>,
  _region: PhantomData<&'a mut [u8]>,
}

impl<'a> SlicingAllocator<'a> {
  pub fn new(region: RegionMut<'a>) -> Self {
    let bytes = region.into_bytes();

    SlicingAllocator {
      base: bytes.as_mut_ptr(),
      len: bytes.len(),
      cursor: Cell::new(0),
      _region: PhantomData,
    }
  }

  /// Number of bytes not handed out yet (alignment padding of the next allocation excluded).
  pub fn remaining(&self) -> usize {
    self.len - self.cursor.get()
  }

  /// Make the whole region available again.
  ///
  /// Taking `&mut self` guarantees that no region handed out before is still alive.
  pub fn reset(&mut self) {
    self.cursor.set(0);
  }
}

impl Allocator for SlicingAllocator<'_> {
  fn allocate(&self, size: usize, align: usize) -> Result<RegionMut<'_>, AllocError> {
    if !align.is_power_of_two() {
      return Err(AllocError::InvalidAlign { align });
    }

    let exhausted = AllocError::Exhausted {
      requested: size,
      available: self.remaining(),
    };

    // align the absolute address, not the offset, as the base might be unaligned
    let base = self.base as usize;
    let start = (base + self.cursor.get())
      .checked_add(align - 1)
      .map(|addr| (addr & !(align - 1)) - base)
      .ok_or_else(|| exhausted.clone())?;
    let end = start.checked_add(size).ok_or_else(|| exhausted.clone())?;

    if end > self.len {
      return Err(exhausted);
    }

    self.cursor.set(end);

    log::trace!("sliced {} bytes at offset {} (align = {})", size, start, align);

    // SAFETY: [start, end) lies within the region we borrow mutably for 'a, and the cursor only
    // moves forward, so the returned slices never overlap
    let bytes = unsafe { slice::from_raw_parts_mut(self.base.add(start), size) };
    bytes.fill(0);

    Ok(RegionMut::new(bytes))
  }
}

impl fmt::Debug for SlicingAllocator<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("SlicingAllocator")
      .field("len", &self.len)
      .field("cursor", &self.cursor.get())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn slices_are_zeroed_aligned_and_disjoint() {
    let mut backing = vec![0xFFu8; 64];
    let slicer = SlicingAllocator::new(RegionMut::new(&mut backing));

    let mut a = slicer.allocate(3, 1).unwrap();
    let b = slicer.allocate(8, 8).unwrap();

    assert!(a.as_bytes().iter().all(|&x| x == 0));
    assert!(b.as_bytes().iter().all(|&x| x == 0));
    assert_eq!(b.address().raw() % 8, 0);
    assert!(b.address().raw() >= a.address().raw() + 3);

    a.fill(1);
    assert!(b.as_bytes().iter().all(|&x| x == 0));
  }

  #[test]
  fn exhaustion() {
    let mut backing = [0u8; 16];
    let slicer = SlicingAllocator::new(RegionMut::new(&mut backing));

    assert!(slicer.allocate(12, 1).is_ok());
    assert_eq!(
      slicer.allocate(8, 1).unwrap_err(),
      AllocError::Exhausted {
        requested: 8,
        available: 4
      }
    );
    assert!(slicer.allocate(4, 1).is_ok());
    assert_eq!(slicer.remaining(), 0);
  }

  #[test]
  fn reset() {
    let mut backing = [0u8; 8];
    let mut slicer = SlicingAllocator::new(RegionMut::new(&mut backing));

    slicer.allocate(8, 1).unwrap().fill(9);
    slicer.reset();

    let again = slicer.allocate(8, 1).unwrap();
    assert!(again.as_bytes().iter().all(|&x| x == 0));
  }

  #[test]
  fn arrays_and_errors() {
    let mut backing = [0u8; 32];
    let slicer = SlicingAllocator::new(RegionMut::new(&mut backing));

    assert_eq!(slicer.allocate_array(4, 4, 3).unwrap().len(), 12);
    assert_eq!(
      slicer.allocate_array(usize::MAX, 1, 2).unwrap_err(),
      AllocError::SizeOverflow {
        size: usize::MAX,
        count: 2
      }
    );
    assert_eq!(
      slicer.allocate(1, 3).unwrap_err(),
      AllocError::InvalidAlign { align: 3 }
    );
  }
}

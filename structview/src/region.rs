//! Memory regions.
//!
//! A region is a contiguous span of bytes with a known length, borrowed from whatever owns it
//! (an [`Arena`], a [`SlicingAllocator`], a plain byte buffer or native memory bound with
//! [`Arena::reinterpret`]). [`Region`] is a shared view and [`RegionMut`] an exclusive one, so the
//! usual borrowing rules prevent a region from being read and written at the same time.
//!
//! Every access is bounds-checked against the length of the region. Accessing bytes past the end
//! of a region panics.
//!
//! [`Arena`]: crate::arena::Arena
//! [`Arena::reinterpret`]: crate::arena::Arena::reinterpret
//! [`SlicingAllocator`]: crate::alloc::SlicingAllocator

use crate::scalar::{Address, Scalar};
use std::fmt;
use std::ops::Range;

// Compute the byte range [offset, offset + len) and check it lies within a region of `total` bytes.
#[track_caller]
fn checked_range(offset: usize, len: usize, total: usize) -> Range<usize> {
  match offset.checked_add(len) {
    Some(end) if end <= total => offset..end,
    _ => panic!(
      "region access out of bounds (offset = {}, size = {}, region = {})",
      offset, len, total
    ),
  }
}

/// A shared view on a region of memory.
#[derive(Clone, Copy)]
pub struct Region<'a> {
  bytes: &'a [u8],
}

impl<'a> Region<'a> {
  pub fn new(bytes: &'a [u8]) -> Self {
    Region { bytes }
  }

  /// Length of the region in bytes.
  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  /// Address of the first byte.
  pub fn address(&self) -> Address {
    Address::from_ptr(self.bytes.as_ptr())
  }

  pub fn as_bytes(&self) -> &'a [u8] {
    self.bytes
  }

  /// Sub-region of `len` bytes starting at `offset`.
  #[track_caller]
  pub fn slice(&self, offset: usize, len: usize) -> Region<'a> {
    Region::new(&self.bytes[checked_range(offset, len, self.bytes.len())])
  }

  /// Decode a scalar stored at `offset`.
  #[track_caller]
  pub fn get<T>(&self, offset: usize) -> T
  where
    T: Scalar,
  {
    T::decode(&self.bytes[checked_range(offset, T::SIZE, self.bytes.len())])
  }
}

impl<'a> From<&'a [u8]> for Region<'a> {
  fn from(bytes: &'a [u8]) -> Self {
    Region::new(bytes)
  }
}

impl fmt::Debug for Region<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("Region")
      .field("address", &self.address())
      .field("len", &self.len())
      .finish()
  }
}

/// An exclusive view on a region of memory.
pub struct RegionMut<'a> {
  bytes: &'a mut [u8],
}

impl<'a> RegionMut<'a> {
  pub fn new(bytes: &'a mut [u8]) -> Self {
    RegionMut { bytes }
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  pub fn address(&self) -> Address {
    Address::from_ptr(self.bytes.as_ptr())
  }

  pub fn as_bytes(&self) -> &[u8] {
    self.bytes
  }

  pub fn as_bytes_mut(&mut self) -> &mut [u8] {
    self.bytes
  }

  /// Give the underlying bytes away.
  pub fn into_bytes(self) -> &'a mut [u8] {
    self.bytes
  }

  /// Shared view on the same bytes.
  pub fn as_region(&self) -> Region<'_> {
    Region::new(self.bytes)
  }

  /// Turn into a shared view for the whole lifetime of the region.
  pub fn into_region(self) -> Region<'a> {
    Region::new(self.bytes)
  }

  /// Exclusive view on the same bytes, for a shorter lifetime.
  pub fn reborrow(&mut self) -> RegionMut<'_> {
    RegionMut::new(self.bytes)
  }

  #[track_caller]
  pub fn slice(&self, offset: usize, len: usize) -> Region<'_> {
    Region::new(&self.bytes[checked_range(offset, len, self.bytes.len())])
  }

  #[track_caller]
  pub fn slice_mut(&mut self, offset: usize, len: usize) -> RegionMut<'_> {
    let range = checked_range(offset, len, self.bytes.len());
    RegionMut::new(&mut self.bytes[range])
  }

  /// Same as [`RegionMut::slice_mut`], consuming the region to keep its lifetime.
  #[track_caller]
  pub fn into_slice(self, offset: usize, len: usize) -> RegionMut<'a> {
    let range = checked_range(offset, len, self.bytes.len());
    RegionMut::new(&mut self.bytes[range])
  }

  /// Split into two disjoint regions, the first one of `mid` bytes.
  #[track_caller]
  pub fn split_at(self, mid: usize) -> (RegionMut<'a>, RegionMut<'a>) {
    checked_range(0, mid, self.bytes.len());
    let (left, right) = self.bytes.split_at_mut(mid);
    (RegionMut::new(left), RegionMut::new(right))
  }

  #[track_caller]
  pub fn get<T>(&self, offset: usize) -> T
  where
    T: Scalar,
  {
    self.as_region().get(offset)
  }

  /// Encode a scalar at `offset`. Only the `T::SIZE` bytes of the scalar are touched.
  #[track_caller]
  pub fn set<T>(&mut self, offset: usize, value: T)
  where
    T: Scalar,
  {
    let range = checked_range(offset, T::SIZE, self.bytes.len());
    value.encode(&mut self.bytes[range]);
  }

  /// Copy the whole `source` region at `offset`.
  #[track_caller]
  pub fn copy_from(&mut self, offset: usize, source: &Region) {
    let range = checked_range(offset, source.len(), self.bytes.len());
    self.bytes[range].copy_from_slice(source.as_bytes());
  }

  /// Set every byte of the region to `byte`.
  pub fn fill(&mut self, byte: u8) {
    self.bytes.fill(byte);
  }
}

impl<'a> From<&'a mut [u8]> for RegionMut<'a> {
  fn from(bytes: &'a mut [u8]) -> Self {
    RegionMut::new(bytes)
  }
}

impl fmt::Debug for RegionMut<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("RegionMut")
      .field("address", &self.address())
      .field("len", &self.len())
      .finish()
  }
}

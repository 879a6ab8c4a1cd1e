//! Native structs.
//!
//! A native struct is a Rust type standing for a C struct: it knows the [`StructLayout`] of the C
//! struct and, from it, how to allocate regions for one or several instances, how to index into
//! arrays of instances and how to bind foreign memory.
//!
//! Implementing [`NativeStruct`] by hand is possible but you should prefer the derive macro from
//! `structview-derive`, which computes the layout from a `#[repr(C)]` mirror of the C struct and
//! checks it against the compiler at compile time.

use crate::alloc::{AllocError, Allocator};
use crate::arena::{Arena, ReleaseAction};
use crate::layout::{FieldLayout, LayoutError, StructLayout};
use crate::region::{Region, RegionMut};
use crate::scalar::Address;
use std::sync::OnceLock;

/// Class of types standing for a native C struct.
///
/// # Safety
///
/// [`NativeStruct::layout`] must be the exact layout of the C struct on the target (size,
/// alignment and every field offset). Regions handed to native code are built with it, so a wrong
/// layout corrupts native memory.
pub unsafe trait NativeStruct: Sized {
  /// Name of the native struct.
  const NAME: &'static str;

  /// Layout of the native struct.
  fn layout() -> &'static StructLayout;

  /// Size in bytes of one instance, trailing padding included.
  fn size_of() -> usize {
    Self::layout().size()
  }

  fn align_of() -> usize {
    Self::layout().align()
  }

  /// Allocate a zeroed region for one instance.
  fn allocate<A>(allocator: &A) -> Result<RegionMut<'_>, AllocError>
  where
    A: ?Sized + Allocator,
  {
    allocator.allocate(Self::size_of(), Self::align_of())
  }

  /// Allocate a zeroed region for `count` contiguous instances.
  fn allocate_array<A>(count: usize, allocator: &A) -> Result<RegionMut<'_>, AllocError>
  where
    A: ?Sized + Allocator,
  {
    allocator.allocate_array(Self::size_of(), Self::align_of(), count)
  }

  /// Region of the `index`-th instance of an array region.
  ///
  /// The length of the array is not tracked.
  ///
  /// # Panics
  ///
  /// Panics if the element does not lie entirely within `array`.
  #[track_caller]
  fn element_at<'a>(array: &Region<'a>, index: usize) -> Region<'a> {
    array.slice(element_offset::<Self>(index), Self::size_of())
  }

  /// Exclusive region of the `index`-th instance of an array region.
  ///
  /// # Panics
  ///
  /// Panics if the element does not lie entirely within `array`.
  #[track_caller]
  fn element_at_mut<'r>(array: &'r mut RegionMut<'_>, index: usize) -> RegionMut<'r> {
    array.slice_mut(element_offset::<Self>(index), Self::size_of())
  }

  /// Bind `count` contiguous instances living at the foreign `address` to `arena`.
  ///
  /// `on_release` is run with the whole region when the arena is dropped.
  ///
  /// # Panics
  ///
  /// Panics if `address` is null or if `count` instances do not fit in memory.
  ///
  /// # Safety
  ///
  /// Same contract as [`Arena::reinterpret`].
  unsafe fn reinterpret(
    address: Address,
    count: usize,
    arena: &Arena,
    on_release: Option<ReleaseAction>,
  ) -> RegionMut<'_> {
    let size = match Self::size_of().checked_mul(count) {
      Some(size) => size,
      None => panic!(
        "cannot reinterpret {} instances of {}: size overflow",
        count,
        Self::NAME
      ),
    };

    arena.reinterpret(address, size, on_release)
  }
}

#[track_caller]
fn element_offset<S>(index: usize) -> usize
where
  S: NativeStruct,
{
  match index.checked_mul(S::size_of()) {
    Some(offset) => offset,
    None => panic!("element index out of bounds (index = {}, struct = {})", index, S::NAME),
  }
}

/// Build a layout once and cache it for the lifetime of the program.
///
/// This is what [`NativeStruct::layout`] implementations use to compute their layout only once.
///
/// # Panics
///
/// Panics if `build` fails. Layouts of native structs are fixed at compile time, so a failure is
/// a bug in the implementation, not something to recover from.
pub fn cached_layout<F>(cell: &'static OnceLock<StructLayout>, build: F) -> &'static StructLayout
where
  F: FnOnce() -> Result<StructLayout, LayoutError>,
{
  cell.get_or_init(|| match build() {
    Ok(layout) => layout,
    Err(e) => panic!("invalid native struct layout: {}", e),
  })
}

/// Check a layout against the compiler's layout of the Rust mirror of its struct.
///
/// Derived [`NativeStruct::layout`] implementations run this once, when the layout is built. It
/// catches nested structs whose own layout disagrees with their Rust type, which compile-time
/// checks cannot see.
///
/// # Panics
///
/// Panics if the size, the alignment or any field offset differ.
pub fn expect_abi(layout: &StructLayout, size: usize, align: usize, offsets: &[usize]) {
  let found = layout
    .fields()
    .iter()
    .map(FieldLayout::offset)
    .collect::<Vec<_>>();

  if layout.size() != size || layout.align() != align || found != offsets {
    panic!(
      "native struct layout of {} disagrees with the compiler (size = {} vs {}, align = {} vs {}, offsets = {:?} vs {:?})",
      layout.name(),
      layout.size(),
      size,
      layout.align(),
      align,
      found,
      offsets
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::field::Field;
  use crate::layout::{FieldKind, LayoutBuilder};
  use crate::scalar::Scalar;

  const PTR: usize = std::mem::size_of::<usize>();

  // struct Chained { void* next; uint32_t a; uint32_t b; };
  struct Chained;

  impl Chained {
    const NEXT: Field<Address> = Field::new(0);
    const A: Field<u32> = Field::new(PTR);
    const B: Field<u32> = Field::new(PTR + 4);
  }

  unsafe impl NativeStruct for Chained {
    const NAME: &'static str = "Chained";

    fn layout() -> &'static StructLayout {
      static LAYOUT: OnceLock<StructLayout> = OnceLock::new();

      cached_layout(&LAYOUT, || {
        LayoutBuilder::new(Self::NAME)
          .field("next", FieldKind::of::<Address>())
          .field("a", FieldKind::of::<u32>())
          .field("b", FieldKind::of::<u32>())
          .build()
      })
    }
  }

  #[test]
  fn layout_is_cached() {
    assert!(std::ptr::eq(Chained::layout(), Chained::layout()));
    assert_eq!(Chained::size_of(), PTR + 8);
    assert_eq!(Chained::align_of(), PTR);
  }

  #[test]
  fn abi_agreement() {
    expect_abi(Chained::layout(), PTR + 8, PTR, &[0, PTR, PTR + 4]);
  }

  #[test]
  #[should_panic(expected = "disagrees with the compiler")]
  fn abi_disagreement() {
    // a nested struct over-aligned by the compiler shifts the offsets
    expect_abi(Chained::layout(), PTR + 8, PTR, &[0, 2 * PTR, 2 * PTR + 4]);
  }

  #[test]
  fn accessor_offsets_agree_with_the_layout() {
    let layout = Chained::layout();

    assert_eq!(layout.field("next").unwrap().offset(), Chained::NEXT.offset());
    assert_eq!(layout.field("a").unwrap().offset(), Chained::A.offset());
    assert_eq!(layout.field("b").unwrap().offset(), Chained::B.offset());
  }

  #[cfg(target_pointer_width = "64")]
  #[test]
  fn second_field_write_leaves_the_rest_untouched() {
    let arena = Arena::new();
    let mut region = Chained::allocate(&arena).unwrap();

    assert_eq!(region.len(), 16);

    region.fill(0x5A);
    Chained::A.write(&mut region, 42);

    assert_eq!(Chained::A.read(&region.as_region()), 42);
    assert!(region.as_bytes()[0..8].iter().all(|&b| b == 0x5A));
    assert!(region.as_bytes()[12..16].iter().all(|&b| b == 0x5A));
  }

  #[test]
  fn array_elements_are_disjoint() {
    let arena = Arena::new();
    let n = 4;
    let mut array = Chained::allocate_array(n, &arena).unwrap();
    let size = Chained::size_of();

    assert_eq!(array.len(), n * size);

    for i in 0..n {
      let mut element = Chained::element_at_mut(&mut array, i);
      Chained::B.write(&mut element, i as u32 + 1);
    }

    let array = array.into_region();
    for i in 0..n {
      let element = Chained::element_at(&array, i);

      assert_eq!(element.address(), array.address().add(i * size));
      assert_eq!(element.len(), size);
      assert_eq!(Chained::B.read(&element), i as u32 + 1);
      assert_eq!(Chained::A.read(&element), 0);
    }
  }

  #[test]
  #[should_panic(expected = "region access out of bounds")]
  fn element_past_the_end() {
    let arena = Arena::new();
    let array = Chained::allocate_array(2, &arena).unwrap();

    Chained::element_at(&array.as_region(), 2);
  }

  #[test]
  fn array_size_overflow() {
    let arena = Arena::new();

    assert!(matches!(
      Chained::allocate_array(usize::MAX, &arena),
      Err(AllocError::SizeOverflow { .. })
    ));
  }

  #[test]
  fn reinterpret_an_array() {
    let mut foreign = vec![0u8; 2 * Chained::size_of()];
    let address = Address::from_ptr(foreign.as_mut_ptr());

    {
      let arena = Arena::new();
      let mut array = unsafe { Chained::reinterpret(address, 2, &arena, None) };
      let mut second = Chained::element_at_mut(&mut array, 1);

      Chained::NEXT.write(&mut second, address);
    }

    let offset = Chained::size_of();
    assert_eq!(Address::decode(&foreign[offset..offset + PTR]), address);
  }
}

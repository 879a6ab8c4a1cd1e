//! Field accessors.
//!
//! Two flavours of accessors exist:
//!
//! - Typed accessors, [`Field`] and [`Nested`], which know their Rust type at compile time. Those
//!   are the ones generated for bound structs; they cannot fail besides reading past the end of a
//!   too small region, which panics.
//! - Dynamic accessors, on [`FieldLayout`], for layouts that have no Rust counterpart (typically
//!   layouts resolved from a schema). The kind of the field is checked at runtime and a mismatch
//!   is reported as an [`AccessError`].

use crate::layout::{FieldKind, FieldLayout};
use crate::native::NativeStruct;
use crate::region::{Region, RegionMut};
use crate::scalar::{Scalar, Value};
use std::error;
use std::fmt;
use std::marker::PhantomData;

/// Accessor for a scalar field of type `T` at a fixed offset.
pub struct Field<T> {
  offset: usize,
  _t: PhantomData<fn() -> T>,
}

impl<T> Field<T> {
  pub const fn new(offset: usize) -> Self {
    Field {
      offset,
      _t: PhantomData,
    }
  }

  pub const fn offset(&self) -> usize {
    self.offset
  }
}

impl<T> Field<T>
where
  T: Scalar,
{
  pub const fn size(&self) -> usize {
    T::SIZE
  }

  /// Decode the field from `region`.
  ///
  /// # Panics
  ///
  /// Panics if `region` is smaller than `offset + size`.
  #[track_caller]
  pub fn read(&self, region: &Region) -> T {
    region.get(self.offset)
  }

  /// Encode `value` into `region`; bytes outside of the field are left untouched.
  ///
  /// # Panics
  ///
  /// Panics if `region` is smaller than `offset + size`.
  #[track_caller]
  pub fn write(&self, region: &mut RegionMut, value: T) {
    region.set(self.offset, value)
  }
}

impl<T> Clone for Field<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Field<T> {}

impl<T> fmt::Debug for Field<T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("Field").field("offset", &self.offset).finish()
  }
}

/// Accessor for a nested struct `S` embedded at a fixed offset.
///
/// Nested structs are not copied out: [`Nested::view`] aliases the bytes of the nested struct
/// within the enclosing region, which can then be accessed with the accessors of `S`.
pub struct Nested<S> {
  offset: usize,
  _s: PhantomData<fn() -> S>,
}

impl<S> Nested<S> {
  pub const fn new(offset: usize) -> Self {
    Nested {
      offset,
      _s: PhantomData,
    }
  }

  pub const fn offset(&self) -> usize {
    self.offset
  }
}

impl<S> Nested<S>
where
  S: NativeStruct,
{
  /// Zero-copy view on the nested struct.
  #[track_caller]
  pub fn view<'a>(&self, region: &Region<'a>) -> Region<'a> {
    region.slice(self.offset, S::size_of())
  }

  /// Zero-copy exclusive view on the nested struct.
  #[track_caller]
  pub fn view_mut<'r>(&self, region: &'r mut RegionMut<'_>) -> RegionMut<'r> {
    region.slice_mut(self.offset, S::size_of())
  }

  /// Copy the first `size_of::<S>()` bytes of `source` over the nested struct.
  ///
  /// # Panics
  ///
  /// Panics if `source` is smaller than the nested struct or if `region` is too small to hold
  /// it.
  #[track_caller]
  pub fn set(&self, region: &mut RegionMut, source: &Region) {
    region.copy_from(self.offset, &source.slice(0, S::size_of()));
  }
}

impl<S> Clone for Nested<S> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<S> Copy for Nested<S> {}

impl<S> fmt::Debug for Nested<S> {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("Nested").field("offset", &self.offset).finish()
  }
}

impl FieldLayout {
  fn expect_kind<T>(&self) -> Result<(), AccessError>
  where
    T: Scalar,
  {
    let expected = T::kind();

    if self.kind == expected {
      Ok(())
    } else {
      Err(AccessError::KindMismatch {
        field: self.name.clone(),
        expected: expected.to_string(),
        found: self.kind.to_string(),
      })
    }
  }

  /// Read the field as a `T`.
  pub fn read<T>(&self, region: &Region) -> Result<T, AccessError>
  where
    T: Scalar,
  {
    self.expect_kind::<T>()?;
    Ok(region.get(self.offset))
  }

  /// Write the field as a `T`.
  pub fn write<T>(&self, region: &mut RegionMut, value: T) -> Result<(), AccessError>
  where
    T: Scalar,
  {
    self.expect_kind::<T>()?;
    region.set(self.offset, value);
    Ok(())
  }

  /// Zero-copy view on a nested struct field.
  pub fn view<'a>(&self, region: &Region<'a>) -> Result<Region<'a>, AccessError> {
    match self.kind {
      FieldKind::Struct(_) => Ok(region.slice(self.offset, self.size)),
      _ => Err(AccessError::NotAStruct {
        field: self.name.clone(),
      }),
    }
  }

  /// Zero-copy exclusive view on a nested struct field.
  pub fn view_mut<'r>(&self, region: &'r mut RegionMut<'_>) -> Result<RegionMut<'r>, AccessError> {
    match self.kind {
      FieldKind::Struct(_) => Ok(region.slice_mut(self.offset, self.size)),
      _ => Err(AccessError::NotAStruct {
        field: self.name.clone(),
      }),
    }
  }

  /// Decode the field as a dynamically-typed value.
  pub fn value(&self, region: &Region) -> Result<Value, AccessError> {
    decode_value(&self.kind, &region.slice(self.offset, self.size)).ok_or_else(|| {
      AccessError::NotAScalar {
        field: self.name.clone(),
      }
    })
  }
}

fn decode_value(kind: &FieldKind, region: &Region) -> Option<Value> {
  match *kind {
    FieldKind::Scalar(kind) => Some(Value::decode(kind, region.as_bytes())),

    FieldKind::Array { ref element, len } => {
      let size = element.size();
      let values = (0..len)
        .map(|i| decode_value(element, &region.slice(i * size, size)))
        .collect::<Option<Vec<_>>>()?;

      Some(Value::Array(values))
    }

    FieldKind::Struct(_) => None,
  }
}

/// Errors that might occur when accessing a field dynamically.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AccessError {
  /// No field with that name exists.
  UnknownField { layout: String, field: String },
  /// The field exists but has another kind than the requested one.
  KindMismatch {
    field: String,
    expected: String,
    found: String,
  },
  /// The field is not a nested struct.
  NotAStruct { field: String },
  /// The field is a nested struct and cannot be decoded as a value.
  NotAScalar { field: String },
}

impl fmt::Display for AccessError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      AccessError::UnknownField {
        ref layout,
        ref field,
      } => write!(f, "unknown field {} in {}", field, layout),

      AccessError::KindMismatch {
        ref field,
        ref expected,
        ref found,
      } => write!(
        f,
        "kind mismatch for field {} (requested = {}, actual = {})",
        field, expected, found
      ),

      AccessError::NotAStruct { ref field } => write!(f, "field {} is not a struct", field),

      AccessError::NotAScalar { ref field } => write!(f, "field {} is not a scalar", field),
    }
  }
}

impl error::Error for AccessError {}

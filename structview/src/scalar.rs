//! Scalar field types.
//!
//! A scalar is a value that a native struct stores inline and that can be decoded from (and
//! encoded into) a fixed number of bytes: fixed-width integers, floating-point numbers, C
//! booleans, native addresses and fixed-size arrays of those. Every scalar uses the native byte
//! order of the target, which is the byte order of the C ABI the structs are shared with.

use crate::layout::FieldKind;
use std::fmt;
use std::mem;

/// Kind of a scalar field, as stored in a [`FieldKind`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ScalarKind {
  U8,
  I8,
  U16,
  I16,
  U32,
  I32,
  U64,
  I64,
  F32,
  F64,
  /// C `bool` (`_Bool`), one byte.
  Bool,
  /// A native pointer; pointer-width bytes.
  Address,
}

impl ScalarKind {
  /// Size in bytes of a value of this kind on the target.
  pub const fn size(self) -> usize {
    match self {
      ScalarKind::U8 | ScalarKind::I8 | ScalarKind::Bool => 1,
      ScalarKind::U16 | ScalarKind::I16 => 2,
      ScalarKind::U32 | ScalarKind::I32 | ScalarKind::F32 => 4,
      ScalarKind::U64 | ScalarKind::I64 | ScalarKind::F64 => 8,
      ScalarKind::Address => mem::size_of::<usize>(),
    }
  }

  /// Natural alignment of a value of this kind on the target.
  ///
  /// This is not always the size: 64-bit integers are only 4-byte aligned on some 32-bit ABIs.
  pub const fn align(self) -> usize {
    match self {
      ScalarKind::U8 => mem::align_of::<u8>(),
      ScalarKind::I8 => mem::align_of::<i8>(),
      ScalarKind::U16 => mem::align_of::<u16>(),
      ScalarKind::I16 => mem::align_of::<i16>(),
      ScalarKind::U32 => mem::align_of::<u32>(),
      ScalarKind::I32 => mem::align_of::<i32>(),
      ScalarKind::U64 => mem::align_of::<u64>(),
      ScalarKind::I64 => mem::align_of::<i64>(),
      ScalarKind::F32 => mem::align_of::<f32>(),
      ScalarKind::F64 => mem::align_of::<f64>(),
      ScalarKind::Bool => mem::align_of::<bool>(),
      ScalarKind::Address => mem::align_of::<usize>(),
    }
  }

  /// Canonical name of the kind, as accepted by [`ScalarKind::parse`].
  pub const fn name(self) -> &'static str {
    match self {
      ScalarKind::U8 => "u8",
      ScalarKind::I8 => "i8",
      ScalarKind::U16 => "u16",
      ScalarKind::I16 => "i16",
      ScalarKind::U32 => "u32",
      ScalarKind::I32 => "i32",
      ScalarKind::U64 => "u64",
      ScalarKind::I64 => "i64",
      ScalarKind::F32 => "f32",
      ScalarKind::F64 => "f64",
      ScalarKind::Bool => "bool",
      ScalarKind::Address => "pointer",
    }
  }

  /// Parse a scalar kind from its canonical name or from the matching C type name.
  pub fn parse(name: &str) -> Option<Self> {
    let kind = match name {
      "u8" | "uint8_t" | "unsigned char" => ScalarKind::U8,
      // plain `char` is left out: its signedness depends on the target
      "i8" | "int8_t" | "signed char" => ScalarKind::I8,
      "u16" | "uint16_t" => ScalarKind::U16,
      "i16" | "int16_t" => ScalarKind::I16,
      "u32" | "uint32_t" => ScalarKind::U32,
      "i32" | "int32_t" | "int" => ScalarKind::I32,
      "u64" | "uint64_t" => ScalarKind::U64,
      "i64" | "int64_t" => ScalarKind::I64,
      "f32" | "float" => ScalarKind::F32,
      "f64" | "double" => ScalarKind::F64,
      "bool" | "_Bool" => ScalarKind::Bool,
      "pointer" | "address" | "void*" => ScalarKind::Address,
      _ => return None,
    };

    Some(kind)
  }
}

impl fmt::Display for ScalarKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.write_str(self.name())
  }
}

/// A native address (the value of a C pointer field).
///
/// Addresses are plain integers here: storing one in a region or reading it back never
/// dereferences it. Turning an address into memory you can access is the job of
/// [`Arena::reinterpret`](crate::arena::Arena::reinterpret).
#[repr(transparent)]
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(usize);

impl Address {
  /// The null address.
  pub const fn null() -> Self {
    Address(0)
  }

  pub const fn from_raw(raw: usize) -> Self {
    Address(raw)
  }

  pub fn from_ptr<T>(ptr: *const T) -> Self {
    Address(ptr as usize)
  }

  pub const fn raw(self) -> usize {
    self.0
  }

  pub const fn is_null(self) -> bool {
    self.0 == 0
  }

  pub fn as_ptr<T>(self) -> *const T {
    self.0 as *const T
  }

  pub fn as_mut_ptr<T>(self) -> *mut T {
    self.0 as *mut T
  }

  /// Address `bytes` further.
  pub const fn add(self, bytes: usize) -> Self {
    Address(self.0.wrapping_add(bytes))
  }
}

impl fmt::Debug for Address {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "Address({:#x})", self.0)
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "{:#x}", self.0)
  }
}

impl<T> From<*const T> for Address {
  fn from(ptr: *const T) -> Self {
    Address::from_ptr(ptr)
  }
}

impl<T> From<*mut T> for Address {
  fn from(ptr: *mut T) -> Self {
    Address::from_ptr(ptr)
  }
}

/// Types that can be stored inline in a native struct.
///
/// `decode` and `encode` work on slices of exactly [`Scalar::SIZE`] bytes and panic otherwise.
pub trait Scalar: Copy {
  /// Size in bytes.
  const SIZE: usize;

  /// Natural alignment in bytes.
  const ALIGN: usize;

  /// Layout kind of this scalar.
  fn kind() -> FieldKind;

  /// Decode a value from its native representation.
  fn decode(bytes: &[u8]) -> Self;

  /// Encode a value into its native representation.
  fn encode(self, bytes: &mut [u8]);
}

// Implement Scalar for a primitive type with a native byte representation.
macro_rules! impl_scalar {
  ($t:ty, $kind:ident) => {
    impl Scalar for $t {
      const SIZE: usize = mem::size_of::<$t>();
      const ALIGN: usize = mem::align_of::<$t>();

      fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::$kind)
      }

      fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0; mem::size_of::<$t>()];
        raw.copy_from_slice(bytes);
        <$t>::from_ne_bytes(raw)
      }

      fn encode(self, bytes: &mut [u8]) {
        bytes.copy_from_slice(&self.to_ne_bytes());
      }
    }
  };
}

impl_scalar!(u8, U8);
impl_scalar!(i8, I8);
impl_scalar!(u16, U16);
impl_scalar!(i16, I16);
impl_scalar!(u32, U32);
impl_scalar!(i32, I32);
impl_scalar!(u64, U64);
impl_scalar!(i64, I64);
impl_scalar!(f32, F32);
impl_scalar!(f64, F64);

impl Scalar for bool {
  const SIZE: usize = 1;
  const ALIGN: usize = mem::align_of::<bool>();

  fn kind() -> FieldKind {
    FieldKind::Scalar(ScalarKind::Bool)
  }

  // any nonzero byte is true, as in C
  fn decode(bytes: &[u8]) -> Self {
    let mut raw = [0; 1];
    raw.copy_from_slice(bytes);
    raw[0] != 0
  }

  fn encode(self, bytes: &mut [u8]) {
    bytes.copy_from_slice(&[self as u8]);
  }
}

impl Scalar for Address {
  const SIZE: usize = mem::size_of::<usize>();
  const ALIGN: usize = mem::align_of::<usize>();

  fn kind() -> FieldKind {
    FieldKind::Scalar(ScalarKind::Address)
  }

  fn decode(bytes: &[u8]) -> Self {
    let mut raw = [0; mem::size_of::<usize>()];
    raw.copy_from_slice(bytes);
    Address(usize::from_ne_bytes(raw))
  }

  fn encode(self, bytes: &mut [u8]) {
    bytes.copy_from_slice(&self.0.to_ne_bytes());
  }
}

impl<T, const N: usize> Scalar for [T; N]
where
  T: Scalar,
{
  const SIZE: usize = T::SIZE * N;
  const ALIGN: usize = T::ALIGN;

  fn kind() -> FieldKind {
    FieldKind::Array {
      element: Box::new(T::kind()),
      len: N,
    }
  }

  fn decode(bytes: &[u8]) -> Self {
    assert_eq!(bytes.len(), Self::SIZE, "array scalar size mismatch");
    std::array::from_fn(|i| T::decode(&bytes[i * T::SIZE..(i + 1) * T::SIZE]))
  }

  fn encode(self, bytes: &mut [u8]) {
    assert_eq!(bytes.len(), Self::SIZE, "array scalar size mismatch");

    for (value, chunk) in self.into_iter().zip(bytes.chunks_exact_mut(T::SIZE)) {
      value.encode(chunk);
    }
  }
}

/// A dynamically-typed scalar value.
///
/// Used when reading fields of layouts that have no Rust type, such as layouts resolved from a
/// [schema](crate::schema).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  U8(u8),
  I8(i8),
  U16(u16),
  I16(i16),
  U32(u32),
  I32(i32),
  U64(u64),
  I64(i64),
  F32(f32),
  F64(f64),
  Bool(bool),
  Address(Address),
  Array(Vec<Value>),
}

impl Value {
  /// Decode a value of the given scalar kind.
  pub fn decode(kind: ScalarKind, bytes: &[u8]) -> Self {
    match kind {
      ScalarKind::U8 => Value::U8(u8::decode(bytes)),
      ScalarKind::I8 => Value::I8(i8::decode(bytes)),
      ScalarKind::U16 => Value::U16(u16::decode(bytes)),
      ScalarKind::I16 => Value::I16(i16::decode(bytes)),
      ScalarKind::U32 => Value::U32(u32::decode(bytes)),
      ScalarKind::I32 => Value::I32(i32::decode(bytes)),
      ScalarKind::U64 => Value::U64(u64::decode(bytes)),
      ScalarKind::I64 => Value::I64(i64::decode(bytes)),
      ScalarKind::F32 => Value::F32(f32::decode(bytes)),
      ScalarKind::F64 => Value::F64(f64::decode(bytes)),
      ScalarKind::Bool => Value::Bool(bool::decode(bytes)),
      ScalarKind::Address => Value::Address(Address::decode(bytes)),
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      Value::U8(x) => write!(f, "{}", x),
      Value::I8(x) => write!(f, "{}", x),
      Value::U16(x) => write!(f, "{}", x),
      Value::I16(x) => write!(f, "{}", x),
      Value::U32(x) => write!(f, "{}", x),
      Value::I32(x) => write!(f, "{}", x),
      Value::U64(x) => write!(f, "{}", x),
      Value::I64(x) => write!(f, "{}", x),
      Value::F32(x) => write!(f, "{}", x),
      Value::F64(x) => write!(f, "{}", x),
      Value::Bool(x) => write!(f, "{}", x),
      Value::Address(x) => write!(f, "{}", x),
      Value::Array(ref values) => {
        f.write_str("[")?;

        for (i, value) in values.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }

          write!(f, "{}", value)?;
        }

        f.write_str("]")
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn round_trip<T>(value: T) -> T
  where
    T: Scalar,
  {
    let mut bytes = vec![0; T::SIZE];
    value.encode(&mut bytes);
    T::decode(&bytes)
  }

  #[test]
  fn primitives_round_trip() {
    assert_eq!(round_trip(0xABu8), 0xAB);
    assert_eq!(round_trip(-3i16), -3);
    assert_eq!(round_trip(u32::MAX), u32::MAX);
    assert_eq!(round_trip(i64::MIN), i64::MIN);
    assert_eq!(round_trip(1.5f32), 1.5);
    assert_eq!(round_trip(-0.25f64), -0.25);
    assert!(round_trip(true));
    assert!(!round_trip(false));
  }

  proptest! {
    #[test]
    fn integers_round_trip(a: u8, b: i16, c: u32, d: i64, e: usize) {
      prop_assert_eq!(round_trip(a), a);
      prop_assert_eq!(round_trip(b), b);
      prop_assert_eq!(round_trip(c), c);
      prop_assert_eq!(round_trip(d), d);
      prop_assert_eq!(round_trip(Address::from_raw(e)), Address::from_raw(e));
    }

    #[test]
    fn floats_round_trip_bitwise(x: f32, y: f64) {
      // NaN payloads included
      prop_assert_eq!(round_trip(x).to_bits(), x.to_bits());
      prop_assert_eq!(round_trip(y).to_bits(), y.to_bits());
    }

    #[test]
    fn arrays_round_trip(values: [u16; 5], flags: [bool; 3]) {
      prop_assert_eq!(round_trip(values), values);
      prop_assert_eq!(round_trip(flags), flags);
    }
  }

  #[test]
  fn native_byte_order() {
    let mut bytes = [0; 4];
    0x0102_0304u32.encode(&mut bytes);
    assert_eq!(bytes, 0x0102_0304u32.to_ne_bytes());
  }

  #[test]
  fn bool_nonzero_is_true() {
    assert!(bool::decode(&[2]));
    assert!(!bool::decode(&[0]));
  }

  #[test]
  fn address() {
    let x = 7u32;
    let addr = Address::from_ptr(&x as *const u32);

    assert!(!addr.is_null());
    assert!(Address::null().is_null());
    assert_eq!(round_trip(addr), addr);
    assert_eq!(addr.as_ptr::<u32>(), &x as *const u32);
    assert_eq!(Address::SIZE, mem::size_of::<*const u8>());
  }

  #[test]
  fn arrays_are_element_wise() {
    let mut bytes = [0; 8];
    [1u16, 2, 3, 4].encode(&mut bytes);

    assert_eq!(&bytes[2..4], &2u16.to_ne_bytes());
    assert_eq!(<[u16; 4]>::decode(&bytes), [1, 2, 3, 4]);
    assert_eq!(
      <[u16; 4]>::kind(),
      FieldKind::Array {
        element: Box::new(FieldKind::Scalar(ScalarKind::U16)),
        len: 4
      }
    );
  }

  #[test]
  #[should_panic]
  fn decode_wrong_size() {
    u32::decode(&[0; 3]);
  }

  #[test]
  fn kind_names() {
    assert_eq!(ScalarKind::parse("uint32_t"), Some(ScalarKind::U32));
    assert_eq!(ScalarKind::parse("pointer"), Some(ScalarKind::Address));
    assert_eq!(ScalarKind::parse("WGPUFlags"), None);
    assert_eq!(ScalarKind::parse("signed char"), Some(ScalarKind::I8));
    assert_eq!(ScalarKind::parse("char"), None);
    assert_eq!(ScalarKind::Address.size(), mem::size_of::<usize>());
    assert_eq!(ScalarKind::U64.align(), mem::align_of::<u64>());
  }

  #[test]
  fn value_display() {
    let v = Value::Array(vec![Value::U8(1), Value::Bool(true)]);
    assert_eq!(v.to_string(), "[1, true]");
    assert_eq!(Value::Address(Address::from_raw(0x10)).to_string(), "0x10");
  }
}

//! Struct layout descriptors.
//!
//! A [`StructLayout`] maps every field of a native struct to its offset, size, alignment and
//! kind. Layouts are never written by hand: they are computed by a [`LayoutBuilder`] that applies
//! the C layout rules of the target:
//!
//! - Fields are placed sequentially, in declaration order.
//! - Each field is placed at the next offset that is a multiple of its alignment.
//! - The struct alignment is the biggest field alignment.
//! - The struct size is padded up to a multiple of the struct alignment, so that arrays of the
//!   struct keep every element aligned.
//!
//! A maximum alignment can be set with [`LayoutBuilder::packed`], which is what `#pragma pack(n)`
//! does to a C struct.
//!
//! Once built, a layout is immutable. Compare two layouts with [`StructLayout::verify`], which is
//! how layouts resolved from a schema are checked against the ones compiled in.

use crate::field::AccessError;
use crate::native::NativeStruct;
use crate::scalar::{Scalar, ScalarKind};
use std::error;
use std::fmt;
use std::sync::Arc;

/// Round `offset` up to the next multiple of `align`.
///
/// `align` must be a power of two. This is usable in `const` contexts, which is where derived
/// bindings check their layout against the compiler’s.
pub const fn align_to(offset: usize, align: usize) -> usize {
  (offset + align - 1) & !(align - 1)
}

fn checked_align_to(offset: usize, align: usize) -> Option<usize> {
  offset.checked_add(align - 1).map(|x| x & !(align - 1))
}

/// Kind of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
  /// A scalar value.
  Scalar(ScalarKind),
  /// A fixed-size inline array.
  Array { element: Box<FieldKind>, len: usize },
  /// A nested struct, embedded inline.
  Struct(Arc<StructLayout>),
}

impl FieldKind {
  /// Kind of a scalar type.
  pub fn of<T>() -> Self
  where
    T: Scalar,
  {
    T::kind()
  }

  /// Kind of a nested native struct.
  pub fn of_struct<S>() -> Self
  where
    S: NativeStruct,
  {
    FieldKind::Struct(Arc::new(S::layout().clone()))
  }

  /// Size in bytes of a field of this kind.
  pub fn size(&self) -> usize {
    self.checked_size().unwrap_or(usize::MAX)
  }

  fn checked_size(&self) -> Option<usize> {
    match *self {
      FieldKind::Scalar(kind) => Some(kind.size()),
      FieldKind::Array { ref element, len } => element.checked_size()?.checked_mul(len),
      FieldKind::Struct(ref layout) => Some(layout.size()),
    }
  }

  /// Natural alignment of a field of this kind.
  pub fn align(&self) -> usize {
    match *self {
      FieldKind::Scalar(kind) => kind.align(),
      FieldKind::Array { ref element, .. } => element.align(),
      FieldKind::Struct(ref layout) => layout.align(),
    }
  }
}

impl fmt::Display for FieldKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      FieldKind::Scalar(kind) => fmt::Display::fmt(&kind, f),
      FieldKind::Array { ref element, len } => write!(f, "[{}; {}]", element, len),
      FieldKind::Struct(ref layout) => write!(f, "struct {}", layout.name()),
    }
  }
}

/// Layout of a single field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldLayout {
  pub(crate) name: String,
  pub(crate) offset: usize,
  pub(crate) size: usize,
  pub(crate) align: usize,
  pub(crate) kind: FieldKind,
}

impl FieldLayout {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Offset in bytes from the start of the enclosing struct.
  pub fn offset(&self) -> usize {
    self.offset
  }

  pub fn size(&self) -> usize {
    self.size
  }

  /// Effective alignment (natural alignment, capped by packing if any).
  pub fn align(&self) -> usize {
    self.align
  }

  pub fn kind(&self) -> &FieldKind {
    &self.kind
  }

  /// Offset of the first byte after the field.
  pub fn end(&self) -> usize {
    self.offset + self.size
  }
}

/// Layout of a native struct.
#[derive(Clone, Debug, PartialEq)]
pub struct StructLayout {
  name: String,
  size: usize,
  align: usize,
  packing: Option<usize>,
  fields: Vec<FieldLayout>,
}

impl StructLayout {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Total size in bytes, trailing padding included.
  pub fn size(&self) -> usize {
    self.size
  }

  pub fn align(&self) -> usize {
    self.align
  }

  /// Distance in bytes between two consecutive elements of an array of this struct.
  pub fn stride(&self) -> usize {
    self.size
  }

  /// Maximum field alignment, if the struct is packed.
  pub fn packing(&self) -> Option<usize> {
    self.packing
  }

  /// Fields, in declaration (and offset) order.
  pub fn fields(&self) -> &[FieldLayout] {
    &self.fields
  }

  /// Look a field up by name.
  pub fn field(&self, name: &str) -> Option<&FieldLayout> {
    self.fields.iter().find(|field| field.name == name)
  }

  /// Look a field up by name, failing with [`AccessError::UnknownField`].
  pub fn get(&self, name: &str) -> Result<&FieldLayout, AccessError> {
    self.field(name).ok_or_else(|| AccessError::UnknownField {
      layout: self.name.clone(),
      field: name.to_owned(),
    })
  }

  /// Select a field through nested structs.
  ///
  /// `["buffer", "minBindingSize"]` selects the `minBindingSize` field of the nested `buffer`
  /// struct. The returned field has its offset relative to `self` and its name is the dotted
  /// path.
  pub fn select(&self, path: &[&str]) -> Result<FieldLayout, AccessError> {
    let (first, rest) = match path.split_first() {
      Some(split) => split,
      None => {
        return Err(AccessError::UnknownField {
          layout: self.name.clone(),
          field: String::new(),
        })
      }
    };

    let mut selected = self.get(first)?.clone();

    for name in rest {
      let nested = match selected.kind {
        FieldKind::Struct(ref layout) => layout.get(name)?.clone(),
        _ => {
          return Err(AccessError::NotAStruct {
            field: selected.name,
          })
        }
      };

      selected = FieldLayout {
        name: format!("{}.{}", selected.name, nested.name),
        offset: selected.offset + nested.offset,
        ..nested
      };
    }

    Ok(selected)
  }

  /// Check that `self` is identical to the `expected` layout.
  ///
  /// Names of the structs themselves are not compared, field names are. Nested structs are
  /// compared recursively.
  pub fn verify(&self, expected: &StructLayout) -> Result<(), LayoutMismatch> {
    if self.size != expected.size {
      return Err(LayoutMismatch::Size {
        layout: expected.name.clone(),
        expected: expected.size,
        found: self.size,
      });
    }

    if self.align != expected.align {
      return Err(LayoutMismatch::Align {
        layout: expected.name.clone(),
        expected: expected.align,
        found: self.align,
      });
    }

    if self.fields.len() != expected.fields.len() {
      return Err(LayoutMismatch::FieldCount {
        layout: expected.name.clone(),
        expected: expected.fields.len(),
        found: self.fields.len(),
      });
    }

    for (index, (found, wanted)) in self.fields.iter().zip(&expected.fields).enumerate() {
      if found.name != wanted.name {
        return Err(LayoutMismatch::FieldName {
          layout: expected.name.clone(),
          index,
          expected: wanted.name.clone(),
          found: found.name.clone(),
        });
      }

      if found.offset != wanted.offset {
        return Err(LayoutMismatch::FieldOffset {
          layout: expected.name.clone(),
          field: wanted.name.clone(),
          expected: wanted.offset,
          found: found.offset,
        });
      }

      if found.size != wanted.size {
        return Err(LayoutMismatch::FieldSize {
          layout: expected.name.clone(),
          field: wanted.name.clone(),
          expected: wanted.size,
          found: found.size,
        });
      }

      match (&found.kind, &wanted.kind) {
        (FieldKind::Struct(found), FieldKind::Struct(wanted)) => found.verify(wanted)?,

        (found_kind, wanted_kind) if found_kind != wanted_kind => {
          return Err(LayoutMismatch::FieldKind {
            layout: expected.name.clone(),
            field: wanted.name.clone(),
            expected: wanted_kind.to_string(),
            found: found_kind.to_string(),
          });
        }

        _ => (),
      }
    }

    Ok(())
  }
}

impl fmt::Display for StructLayout {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "struct {} {{ // size = {}, align = {}", self.name, self.size, self.align)?;

    if let Some(packing) = self.packing {
      write!(f, ", packed = {}", packing)?;
    }

    writeln!(f)?;

    for field in &self.fields {
      writeln!(
        f,
        "  /* {:#06x} ({:>3}) */ {} {};",
        field.offset, field.size, field.kind, field.name
      )?;
    }

    f.write_str("}")
  }
}

/// Builder computing a [`StructLayout`] with the C layout rules.
///
/// ```
/// use structview::layout::{FieldKind, LayoutBuilder};
/// use structview::scalar::ScalarKind;
///
/// let layout = LayoutBuilder::new("Example")
///   .field("next", FieldKind::Scalar(ScalarKind::Address))
///   .field("a", FieldKind::Scalar(ScalarKind::U32))
///   .field("b", FieldKind::Scalar(ScalarKind::U32))
///   .build()
///   .unwrap();
///
/// assert_eq!(layout.field("a").unwrap().offset(), std::mem::size_of::<usize>());
/// ```
#[derive(Clone, Debug)]
pub struct LayoutBuilder {
  name: String,
  packing: Option<usize>,
  members: Vec<(String, FieldKind)>,
}

impl LayoutBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    LayoutBuilder {
      name: name.into(),
      packing: None,
      members: Vec::new(),
    }
  }

  /// Cap field alignment to `packing` bytes, as `#pragma pack(packing)` does.
  pub fn packed(mut self, packing: usize) -> Self {
    self.packing = Some(packing);
    self
  }

  /// Append a field.
  pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
    self.members.push((name.into(), kind));
    self
  }

  /// Compute the layout.
  ///
  /// # Errors
  ///
  /// See [`LayoutError`].
  pub fn build(self) -> Result<StructLayout, LayoutError> {
    let LayoutBuilder {
      name,
      packing,
      members,
    } = self;

    if let Some(packing) = packing {
      if !packing.is_power_of_two() {
        return Err(LayoutError::InvalidPacking { layout: name, packing });
      }
    }

    if members.is_empty() {
      return Err(LayoutError::Empty { layout: name });
    }

    let mut fields: Vec<FieldLayout> = Vec::with_capacity(members.len());
    let mut offset = 0usize;
    let mut struct_align = 1;

    for (field_name, kind) in members {
      if fields.iter().any(|field| field.name == field_name) {
        return Err(LayoutError::DuplicateField {
          layout: name,
          field: field_name,
        });
      }

      let size = match kind.checked_size() {
        Some(size) => size,
        None => return Err(LayoutError::SizeOverflow { layout: name }),
      };
      let align = packing.map_or(kind.align(), |packing| kind.align().min(packing));

      offset = match checked_align_to(offset, align) {
        Some(offset) => offset,
        None => return Err(LayoutError::SizeOverflow { layout: name }),
      };

      fields.push(FieldLayout {
        name: field_name,
        offset,
        size,
        align,
        kind,
      });

      offset = match offset.checked_add(size) {
        Some(offset) => offset,
        None => return Err(LayoutError::SizeOverflow { layout: name }),
      };
      struct_align = struct_align.max(align);
    }

    let size = match checked_align_to(offset, struct_align) {
      Some(size) => size,
      None => return Err(LayoutError::SizeOverflow { layout: name }),
    };

    Ok(StructLayout {
      name,
      size,
      align: struct_align,
      packing,
      fields,
    })
  }
}

/// Errors that might occur while computing a layout.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LayoutError {
  /// Two fields share the same name.
  DuplicateField { layout: String, field: String },
  /// The packing is not a power of two.
  InvalidPacking { layout: String, packing: usize },
  /// The size of a field or of the struct does not fit in `usize`.
  SizeOverflow { layout: String },
  /// The struct has no field.
  Empty { layout: String },
}

impl fmt::Display for LayoutError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      LayoutError::DuplicateField {
        ref layout,
        ref field,
      } => write!(f, "duplicate field {} in {}", field, layout),

      LayoutError::InvalidPacking {
        ref layout,
        packing,
      } => write!(
        f,
        "invalid packing for {} (packing = {}); must be a power of two",
        layout, packing
      ),

      LayoutError::SizeOverflow { ref layout } => write!(f, "size of {} overflows", layout),

      LayoutError::Empty { ref layout } => write!(f, "{} has no field", layout),
    }
  }
}

impl error::Error for LayoutError {}

/// First discrepancy found by [`StructLayout::verify`].
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LayoutMismatch {
  Size {
    layout: String,
    expected: usize,
    found: usize,
  },
  Align {
    layout: String,
    expected: usize,
    found: usize,
  },
  FieldCount {
    layout: String,
    expected: usize,
    found: usize,
  },
  FieldName {
    layout: String,
    index: usize,
    expected: String,
    found: String,
  },
  FieldOffset {
    layout: String,
    field: String,
    expected: usize,
    found: usize,
  },
  FieldSize {
    layout: String,
    field: String,
    expected: usize,
    found: usize,
  },
  FieldKind {
    layout: String,
    field: String,
    expected: String,
    found: String,
  },
}

impl fmt::Display for LayoutMismatch {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      LayoutMismatch::Size {
        ref layout,
        expected,
        found,
      } => write!(
        f,
        "size mismatch for {} (expected = {}, found = {})",
        layout, expected, found
      ),

      LayoutMismatch::Align {
        ref layout,
        expected,
        found,
      } => write!(
        f,
        "alignment mismatch for {} (expected = {}, found = {})",
        layout, expected, found
      ),

      LayoutMismatch::FieldCount {
        ref layout,
        expected,
        found,
      } => write!(
        f,
        "field count mismatch for {} (expected = {}, found = {})",
        layout, expected, found
      ),

      LayoutMismatch::FieldName {
        ref layout,
        index,
        ref expected,
        ref found,
      } => write!(
        f,
        "field #{} of {} is named {}, expected {}",
        index, layout, found, expected
      ),

      LayoutMismatch::FieldOffset {
        ref layout,
        ref field,
        expected,
        found,
      } => write!(
        f,
        "offset mismatch for {}.{} (expected = {}, found = {})",
        layout, field, expected, found
      ),

      LayoutMismatch::FieldSize {
        ref layout,
        ref field,
        expected,
        found,
      } => write!(
        f,
        "size mismatch for {}.{} (expected = {}, found = {})",
        layout, field, expected, found
      ),

      LayoutMismatch::FieldKind {
        ref layout,
        ref field,
        ref expected,
        ref found,
      } => write!(
        f,
        "kind mismatch for {}.{} (expected = {}, found = {})",
        layout, field, expected, found
      ),
    }
  }
}

impl error::Error for LayoutMismatch {}

#[cfg(test)]
mod tests {
  use super::*;

  const PTR: usize = std::mem::size_of::<usize>();

  fn scalar(kind: ScalarKind) -> FieldKind {
    FieldKind::Scalar(kind)
  }

  fn offsets(layout: &StructLayout) -> Vec<usize> {
    layout.fields().iter().map(FieldLayout::offset).collect()
  }

  #[test]
  fn pointer_and_two_u32() {
    let layout = LayoutBuilder::new("Example")
      .field("next", scalar(ScalarKind::Address))
      .field("a", scalar(ScalarKind::U32))
      .field("b", scalar(ScalarKind::U32))
      .build()
      .unwrap();

    if PTR == 8 {
      assert_eq!(offsets(&layout), vec![0, 8, 12]);
      assert_eq!(layout.size(), 16);
      assert_eq!(layout.align(), 8);
    }

    assert_eq!(layout.stride(), layout.size());
  }

  #[test]
  fn interior_and_trailing_padding() {
    let layout = LayoutBuilder::new("Padded")
      .field("a", scalar(ScalarKind::U8))
      .field("b", scalar(ScalarKind::U32))
      .field("c", scalar(ScalarKind::U8))
      .build()
      .unwrap();

    assert_eq!(offsets(&layout), vec![0, 4, 8]);
    assert_eq!(layout.size(), 12);
    assert_eq!(layout.align(), 4);
  }

  #[test]
  fn matches_rust_repr_c() {
    #[allow(dead_code)]
    #[repr(C)]
    struct Mixed {
      a: u16,
      b: f64,
      c: [u8; 3],
      d: i32,
    }

    let layout = LayoutBuilder::new("Mixed")
      .field("a", FieldKind::of::<u16>())
      .field("b", FieldKind::of::<f64>())
      .field("c", FieldKind::of::<[u8; 3]>())
      .field("d", FieldKind::of::<i32>())
      .build()
      .unwrap();

    assert_eq!(
      offsets(&layout),
      vec![
        std::mem::offset_of!(Mixed, a),
        std::mem::offset_of!(Mixed, b),
        std::mem::offset_of!(Mixed, c),
        std::mem::offset_of!(Mixed, d),
      ]
    );
    assert_eq!(layout.size(), std::mem::size_of::<Mixed>());
    assert_eq!(layout.align(), std::mem::align_of::<Mixed>());
  }

  #[test]
  fn nested_struct_alignment() {
    let inner = LayoutBuilder::new("Inner")
      .field("x", scalar(ScalarKind::U64))
      .field("y", scalar(ScalarKind::U8))
      .build()
      .unwrap();
    let inner_size = inner.size();
    let outer = LayoutBuilder::new("Outer")
      .field("tag", scalar(ScalarKind::U8))
      .field("inner", FieldKind::Struct(Arc::new(inner)))
      .build()
      .unwrap();

    let inner_field = outer.field("inner").unwrap();
    assert_eq!(inner_field.offset(), ScalarKind::U64.align());
    assert_eq!(inner_field.size(), inner_size);
    assert_eq!(outer.size(), inner_field.end());
  }

  #[test]
  fn packed() {
    let layout = LayoutBuilder::new("Packed")
      .packed(1)
      .field("a", scalar(ScalarKind::U8))
      .field("b", scalar(ScalarKind::U32))
      .build()
      .unwrap();

    assert_eq!(offsets(&layout), vec![0, 1]);
    assert_eq!(layout.size(), 5);
    assert_eq!(layout.align(), 1);
    assert_eq!(layout.packing(), Some(1));

    let layout = LayoutBuilder::new("Packed2")
      .packed(2)
      .field("a", scalar(ScalarKind::U8))
      .field("b", scalar(ScalarKind::U32))
      .build()
      .unwrap();

    assert_eq!(offsets(&layout), vec![0, 2]);
    assert_eq!(layout.size(), 6);
  }

  #[test]
  fn builder_errors() {
    let e = LayoutBuilder::new("A")
      .packed(3)
      .field("a", scalar(ScalarKind::U8))
      .build();
    assert_eq!(
      e,
      Err(LayoutError::InvalidPacking {
        layout: "A".to_owned(),
        packing: 3
      })
    );

    let e = LayoutBuilder::new("B")
      .field("a", scalar(ScalarKind::U8))
      .field("a", scalar(ScalarKind::U16))
      .build();
    assert_eq!(
      e,
      Err(LayoutError::DuplicateField {
        layout: "B".to_owned(),
        field: "a".to_owned()
      })
    );

    let e = LayoutBuilder::new("C").build();
    assert_eq!(e, Err(LayoutError::Empty { layout: "C".to_owned() }));

    let e = LayoutBuilder::new("D")
      .field(
        "huge",
        FieldKind::Array {
          element: Box::new(scalar(ScalarKind::U64)),
          len: usize::MAX,
        },
      )
      .build();
    assert_eq!(e, Err(LayoutError::SizeOverflow { layout: "D".to_owned() }));
  }

  #[test]
  fn select_nested() {
    let inner = LayoutBuilder::new("Inner")
      .field("a", scalar(ScalarKind::U32))
      .field("b", scalar(ScalarKind::U32))
      .build()
      .unwrap();
    let outer = LayoutBuilder::new("Outer")
      .field("x", scalar(ScalarKind::U64))
      .field("inner", FieldKind::Struct(Arc::new(inner)))
      .build()
      .unwrap();

    let b = outer.select(&["inner", "b"]).unwrap();
    assert_eq!(b.name(), "inner.b");
    assert_eq!(b.offset(), 8 + 4);
    assert_eq!(b.size(), 4);

    assert_eq!(
      outer.select(&["x", "a"]),
      Err(AccessError::NotAStruct {
        field: "x".to_owned()
      })
    );
    assert!(outer.select(&["inner", "c"]).is_err());
    assert!(outer.select(&[]).is_err());
  }

  #[test]
  fn verify() {
    let a = LayoutBuilder::new("A")
      .field("x", scalar(ScalarKind::U32))
      .field("y", scalar(ScalarKind::U32))
      .build()
      .unwrap();
    let same = LayoutBuilder::new("A2")
      .field("x", scalar(ScalarKind::U32))
      .field("y", scalar(ScalarKind::U32))
      .build()
      .unwrap();
    let signed = LayoutBuilder::new("A")
      .field("x", scalar(ScalarKind::U32))
      .field("y", scalar(ScalarKind::I32))
      .build()
      .unwrap();
    let renamed = LayoutBuilder::new("A")
      .field("x", scalar(ScalarKind::U32))
      .field("z", scalar(ScalarKind::U32))
      .build()
      .unwrap();
    let wider = LayoutBuilder::new("A")
      .field("x", scalar(ScalarKind::U64))
      .field("y", scalar(ScalarKind::U32))
      .build()
      .unwrap();

    assert_eq!(same.verify(&a), Ok(()));
    assert!(matches!(signed.verify(&a), Err(LayoutMismatch::FieldKind { .. })));
    assert!(matches!(renamed.verify(&a), Err(LayoutMismatch::FieldName { index: 1, .. })));
    assert!(matches!(wider.verify(&a), Err(LayoutMismatch::Size { .. })));
  }

  #[test]
  fn display() {
    let layout = LayoutBuilder::new("Example")
      .field("a", scalar(ScalarKind::U32))
      .field("b", FieldKind::of::<[u8; 4]>())
      .build()
      .unwrap();
    let text = layout.to_string();

    assert!(text.starts_with("struct Example { // size = 8, align = 4"));
    assert!(text.contains("u32 a;"));
    assert!(text.contains("[u8; 4] b;"));
  }

  #[test]
  fn align_to_const() {
    const X: usize = align_to(13, 8);
    assert_eq!(X, 16);
    assert_eq!(align_to(16, 8), 16);
    assert_eq!(align_to(0, 4), 0);
  }
}

//! Layout schemas.
//!
//! A schema is a machine-readable description of native structs, in JSON:
//!
//! ```json
//! {
//!   "structs": [
//!     {
//!       "name": "Example",
//!       "fields": [
//!         { "name": "next", "type": "pointer" },
//!         { "name": "values", "type": { "array": "u32", "len": 2 } }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! A field type is either the name of a scalar (`u32`, `int32_t`, `pointer`, …), the name of
//! another struct of the schema (embedded inline) or an array of any type. Structs can be
//! declared in any order; resolving a schema computes the layout of every struct with the same
//! rules as [`LayoutBuilder`](crate::layout::LayoutBuilder).

use crate::layout::{FieldKind, LayoutBuilder, LayoutError, StructLayout};
use crate::scalar::ScalarKind;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A set of struct declarations.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Schema {
  pub structs: Vec<StructDecl>,
}

/// Declaration of a struct.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StructDecl {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub packed: Option<usize>,
  pub fields: Vec<FieldDecl>,
}

/// Declaration of a field.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldDecl {
  pub name: String,
  #[serde(rename = "type")]
  pub ty: TypeRef,
}

/// Reference to a field type.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypeRef {
  /// A scalar or struct name.
  Named(String),
  /// A fixed-size array.
  Array { array: Box<TypeRef>, len: usize },
}

impl TypeRef {
  fn of_kind(kind: &FieldKind) -> Self {
    match *kind {
      FieldKind::Scalar(kind) => TypeRef::Named(kind.name().to_owned()),
      FieldKind::Array { ref element, len } => TypeRef::Array {
        array: Box::new(TypeRef::of_kind(element)),
        len,
      },
      FieldKind::Struct(ref layout) => TypeRef::Named(layout.name().to_owned()),
    }
  }
}

impl fmt::Display for TypeRef {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      TypeRef::Named(ref name) => f.write_str(name),
      TypeRef::Array { ref array, len } => write!(f, "[{}; {}]", array, len),
    }
  }
}

impl Schema {
  /// Parse a schema from its JSON representation.
  pub fn from_json(json: &str) -> Result<Self, SchemaError> {
    Ok(serde_json::from_str(json)?)
  }

  /// Read and parse a schema file.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| SchemaError::Io(path.to_owned(), e))?;

    Self::from_json(&json)
  }

  /// Describe existing layouts.
  ///
  /// Nested structs are referred to by name and are not declared unless they are part of
  /// `layouts` too.
  pub fn from_layouts<'a>(layouts: impl IntoIterator<Item = &'a StructLayout>) -> Self {
    let structs = layouts
      .into_iter()
      .map(|layout| StructDecl {
        name: layout.name().to_owned(),
        packed: layout.packing(),
        fields: layout
          .fields()
          .iter()
          .map(|field| FieldDecl {
            name: field.name().to_owned(),
            ty: TypeRef::of_kind(field.kind()),
          })
          .collect(),
      })
      .collect();

    Schema { structs }
  }

  /// JSON representation of the schema, pretty-printed.
  pub fn to_json(&self) -> Result<String, SchemaError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Compute the layout of every declared struct.
  pub fn resolve(&self) -> Result<Layouts, SchemaError> {
    let mut index = HashMap::with_capacity(self.structs.len());

    for (i, decl) in self.structs.iter().enumerate() {
      if index.insert(decl.name.as_str(), i).is_some() {
        return Err(SchemaError::DuplicateStruct {
          name: decl.name.clone(),
        });
      }
    }

    let mut resolver = Resolver {
      schema: self,
      index,
      resolved: vec![None; self.structs.len()],
      stack: Vec::new(),
    };

    for i in 0..self.structs.len() {
      resolver.resolve_struct(i)?;
    }

    let layouts = resolver
      .resolved
      .into_iter()
      .flatten()
      .collect::<Vec<_>>();

    log::debug!("resolved {} struct layout(s)", layouts.len());

    Ok(Layouts::new(layouts))
  }
}

// Depth-first resolution of struct declarations, with cycle detection.
struct Resolver<'a> {
  schema: &'a Schema,
  index: HashMap<&'a str, usize>,
  resolved: Vec<Option<Arc<StructLayout>>>,
  // declarations being resolved
  stack: Vec<usize>,
}

impl<'a> Resolver<'a> {
  fn resolve_struct(&mut self, i: usize) -> Result<Arc<StructLayout>, SchemaError> {
    if let Some(ref layout) = self.resolved[i] {
      return Ok(layout.clone());
    }

    let schema = self.schema;
    let decl = &schema.structs[i];

    if let Some(start) = self.stack.iter().position(|&j| j == i) {
      let mut path = self.stack[start..]
        .iter()
        .map(|&j| schema.structs[j].name.clone())
        .collect::<Vec<_>>();
      path.push(decl.name.clone());

      return Err(SchemaError::Cycle { path });
    }

    self.stack.push(i);

    let mut builder = LayoutBuilder::new(decl.name.as_str());

    if let Some(packing) = decl.packed {
      builder = builder.packed(packing);
    }

    for field in &decl.fields {
      let kind = self.resolve_type(&decl.name, &field.name, &field.ty)?;
      builder = builder.field(field.name.as_str(), kind);
    }

    self.stack.pop();

    let layout = Arc::new(builder.build()?);
    log::trace!("resolved {} (size = {})", layout.name(), layout.size());

    self.resolved[i] = Some(layout.clone());
    Ok(layout)
  }

  fn resolve_type(
    &mut self,
    structure: &str,
    field: &str,
    ty: &TypeRef,
  ) -> Result<FieldKind, SchemaError> {
    match *ty {
      TypeRef::Named(ref name) => {
        if let Some(kind) = ScalarKind::parse(name) {
          Ok(FieldKind::Scalar(kind))
        } else if let Some(&j) = self.index.get(name.as_str()) {
          Ok(FieldKind::Struct(self.resolve_struct(j)?))
        } else {
          Err(SchemaError::UnknownType {
            structure: structure.to_owned(),
            field: field.to_owned(),
            ty: name.clone(),
          })
        }
      }

      TypeRef::Array { ref array, len } => Ok(FieldKind::Array {
        element: Box::new(self.resolve_type(structure, field, array)?),
        len,
      }),
    }
  }
}

/// Layouts resolved from a [`Schema`], in declaration order.
#[derive(Clone, Debug)]
pub struct Layouts {
  layouts: Vec<Arc<StructLayout>>,
  by_name: HashMap<String, usize>,
}

impl Layouts {
  fn new(layouts: Vec<Arc<StructLayout>>) -> Self {
    let by_name = layouts
      .iter()
      .enumerate()
      .map(|(i, layout)| (layout.name().to_owned(), i))
      .collect();

    Layouts { layouts, by_name }
  }

  pub fn get(&self, name: &str) -> Option<&StructLayout> {
    self.by_name.get(name).map(|&i| &*self.layouts[i])
  }

  pub fn iter(&self) -> impl Iterator<Item = &StructLayout> {
    self.layouts.iter().map(|layout| &**layout)
  }

  pub fn len(&self) -> usize {
    self.layouts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.layouts.is_empty()
  }
}

/// Errors that might occur when loading or resolving a schema.
#[non_exhaustive]
#[derive(Debug)]
pub enum SchemaError {
  /// The schema file could not be read.
  Io(PathBuf, io::Error),
  /// The schema is not valid JSON or does not have the expected shape.
  Parse(serde_json::Error),
  /// A field refers to a type that is neither a scalar nor a declared struct.
  UnknownType {
    structure: String,
    field: String,
    ty: String,
  },
  /// Structs embed each other.
  Cycle { path: Vec<String> },
  /// Two structs share the same name.
  DuplicateStruct { name: String },
  /// The layout of a struct could not be computed.
  Layout(LayoutError),
}

impl fmt::Display for SchemaError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      SchemaError::Io(ref path, ref e) => write!(f, "cannot read {}: {}", path.display(), e),

      SchemaError::Parse(ref e) => write!(f, "schema parse error: {}", e),

      SchemaError::UnknownType {
        ref structure,
        ref field,
        ref ty,
      } => write!(f, "unknown type {} for {}.{}", ty, structure, field),

      SchemaError::Cycle { ref path } => write!(f, "cyclic struct embedding: {}", path.join(" -> ")),

      SchemaError::DuplicateStruct { ref name } => write!(f, "duplicate struct {}", name),

      SchemaError::Layout(ref e) => write!(f, "layout error: {}", e),
    }
  }
}

impl error::Error for SchemaError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match *self {
      SchemaError::Io(_, ref e) => Some(e),
      SchemaError::Parse(ref e) => Some(e),
      SchemaError::Layout(ref e) => Some(e),
      _ => None,
    }
  }
}

impl From<serde_json::Error> for SchemaError {
  fn from(e: serde_json::Error) -> Self {
    SchemaError::Parse(e)
  }
}

impl From<LayoutError> for SchemaError {
  fn from(e: LayoutError) -> Self {
    SchemaError::Layout(e)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PTR: usize = std::mem::size_of::<usize>();

  const CHAINED: &str = r#"{
    "structs": [
      {
        "name": "Entry",
        "fields": [
          { "name": "nextInChain", "type": "pointer" },
          { "name": "binding", "type": "uint32_t" },
          { "name": "inner", "type": "Inner" },
          { "name": "tail", "type": { "array": "u8", "len": 3 } }
        ]
      },
      {
        "name": "Inner",
        "fields": [
          { "name": "a", "type": "u64" },
          { "name": "b", "type": "u32" }
        ]
      }
    ]
  }"#;

  #[test]
  fn resolve_forward_references() {
    let layouts = Schema::from_json(CHAINED).unwrap().resolve().unwrap();

    assert_eq!(layouts.len(), 2);
    assert_eq!(
      layouts.iter().map(StructLayout::name).collect::<Vec<_>>(),
      vec!["Entry", "Inner"]
    );

    let inner = layouts.get("Inner").unwrap();
    let entry = layouts.get("Entry").unwrap();
    let inner_field = entry.field("inner").unwrap();

    assert_eq!(inner_field.size(), inner.size());
    assert_eq!(inner_field.offset() % inner.align(), 0);
    assert_eq!(entry.field("binding").unwrap().offset(), PTR);
    assert_eq!(
      entry.field("tail").unwrap().kind(),
      &FieldKind::of::<[u8; 3]>()
    );
    assert_eq!(entry.select(&["inner", "b"]).unwrap().offset(), inner_field.offset() + 8);
  }

  #[test]
  fn packed_struct() {
    let json = r#"{ "structs": [ { "name": "P", "packed": 1, "fields": [
      { "name": "a", "type": "u8" },
      { "name": "b", "type": "u32" }
    ] } ] }"#;
    let layouts = Schema::from_json(json).unwrap().resolve().unwrap();
    let p = layouts.get("P").unwrap();

    assert_eq!(p.size(), 5);
    assert_eq!(p.field("b").unwrap().offset(), 1);
  }

  #[test]
  fn unknown_type() {
    let json = r#"{ "structs": [ { "name": "A", "fields": [ { "name": "x", "type": "B" } ] } ] }"#;

    match Schema::from_json(json).unwrap().resolve() {
      Err(SchemaError::UnknownType {
        structure,
        field,
        ty,
      }) => {
        assert_eq!(structure, "A");
        assert_eq!(field, "x");
        assert_eq!(ty, "B");
      }
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn cycle() {
    let json = r#"{ "structs": [
      { "name": "A", "fields": [ { "name": "b", "type": "B" } ] },
      { "name": "B", "fields": [ { "name": "a", "type": { "array": "A", "len": 1 } } ] }
    ] }"#;

    match Schema::from_json(json).unwrap().resolve() {
      Err(SchemaError::Cycle { path }) => assert_eq!(path, vec!["A", "B", "A"]),
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn duplicate_and_layout_errors() {
    let json = r#"{ "structs": [
      { "name": "A", "fields": [ { "name": "x", "type": "u8" } ] },
      { "name": "A", "fields": [ { "name": "y", "type": "u8" } ] }
    ] }"#;
    assert!(matches!(
      Schema::from_json(json).unwrap().resolve(),
      Err(SchemaError::DuplicateStruct { .. })
    ));

    let json = r#"{ "structs": [ { "name": "E", "fields": [] } ] }"#;
    assert!(matches!(
      Schema::from_json(json).unwrap().resolve(),
      Err(SchemaError::Layout(LayoutError::Empty { .. }))
    ));
  }

  #[test]
  fn parse_errors() {
    assert!(matches!(
      Schema::from_json("{ \"structs\": 3 }"),
      Err(SchemaError::Parse(_))
    ));
    assert!(matches!(
      Schema::from_path("/nonexistent/structview/schema.json"),
      Err(SchemaError::Io(..))
    ));
  }

  #[test]
  fn export_and_resolve_again() {
    let layouts = Schema::from_json(CHAINED).unwrap().resolve().unwrap();
    let exported = Schema::from_layouts(layouts.iter());
    let json = exported.to_json().unwrap();

    assert!(json.contains("\"nextInChain\""));
    assert!(json.contains("\"pointer\""));

    let again = Schema::from_json(&json).unwrap().resolve().unwrap();
    for layout in layouts.iter() {
      assert_eq!(again.get(layout.name()).unwrap().verify(layout), Ok(()));
    }
  }
}

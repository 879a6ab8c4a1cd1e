use structview::layout::LayoutMismatch;
use structview::schema::{Schema, TypeRef};
use structview::{Arena, NativeStruct};
use structview_wgpu::{bound_layouts, find, BindGroupLayoutEntry, BufferBindingLayout, SCHEMA};

#[test]
fn schema_declares_every_bound_struct() {
  let layouts = Schema::from_json(SCHEMA).unwrap().resolve().unwrap();

  assert_eq!(layouts.len(), bound_layouts().len());

  for bound in bound_layouts() {
    let resolved = layouts.get(bound.name()).unwrap();
    assert_eq!(resolved.verify(bound), Ok(()), "{}", bound.name());
  }
}

#[test]
fn exported_schema_matches_the_embedded_one() {
  let exported = Schema::from_layouts(bound_layouts());
  let embedded = Schema::from_json(SCHEMA).unwrap();

  // the embedded schema uses C type names, the exported one Rust names
  let exported = exported.resolve().unwrap();
  for layout in embedded.resolve().unwrap().iter() {
    assert_eq!(exported.get(layout.name()).unwrap().verify(layout), Ok(()));
  }
}

#[test]
fn drifted_schema_is_detected() {
  let mut schema = Schema::from_json(SCHEMA).unwrap();

  let buffer = schema
    .structs
    .iter_mut()
    .find(|decl| decl.name == "WGPUBufferBindingLayout")
    .unwrap();
  let has_dynamic_offset = buffer
    .fields
    .iter_mut()
    .find(|field| field.name == "hasDynamicOffset")
    .unwrap();
  has_dynamic_offset.ty = TypeRef::Named("bool".to_owned());

  let layouts = schema.resolve().unwrap();
  let entry = find("WGPUBindGroupLayoutEntry").unwrap();

  assert!(matches!(
    layouts.get("WGPUBufferBindingLayout").unwrap().verify(BufferBindingLayout::layout()),
    Err(LayoutMismatch::FieldSize { .. })
  ));
  assert!(layouts
    .get("WGPUBindGroupLayoutEntry")
    .unwrap()
    .verify(entry)
    .is_err());
}

#[test]
fn dynamic_access_through_the_schema() {
  let layouts = Schema::from_json(SCHEMA).unwrap().resolve().unwrap();
  let entry_layout = layouts.get("WGPUBindGroupLayoutEntry").unwrap();
  let arena = Arena::new();
  let mut entry = BindGroupLayoutEntry::allocate(&arena).unwrap();

  BindGroupLayoutEntry::set_binding(&mut entry, 3);
  BufferBindingLayout::set_min_binding_size(&mut BindGroupLayoutEntry::buffer_mut(&mut entry), 256);

  let min_binding_size = entry_layout.select(&["buffer", "minBindingSize"]).unwrap();
  let binding = entry_layout.get("binding").unwrap();

  assert_eq!(min_binding_size.read::<u64>(&entry.as_region()), Ok(256));
  assert_eq!(binding.read::<u32>(&entry.as_region()), Ok(3));
}

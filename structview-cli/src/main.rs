//! `structview`: inspect and verify the layouts of native structs.

use std::{error, fmt, path::PathBuf, process::ExitCode};
use structopt::StructOpt;
use structview::{
  layout::FieldKind,
  schema::{Schema, SchemaError},
  AccessError, AllocError, Arena, NativeStruct, Region, StructLayout,
};
use structview_wgpu::{
  bound_layouts, find, BindGroupLayoutEntry, BufferBindingLayout, BufferBindingType,
  SamplerBindingLayout, SamplerBindingType, ShaderStage, StorageTextureAccess,
  StorageTextureBindingLayout, TextureBindingLayout, TextureFormat, TextureSampleType,
  TextureViewDimension, SCHEMA,
};

#[derive(Debug, StructOpt)]
#[structopt(name = "structview")]
pub struct CLIOpts {
  #[structopt(subcommand)]
  command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
  /// List the compiled-in structs.
  List,

  /// Print compiled-in layouts.
  Dump {
    /// Native name of the struct to print; all structs if absent.
    name: Option<String>,
  },

  /// Resolve a schema file and print its layouts.
  Schema {
    /// JSON schema to resolve.
    file: PathBuf,
  },

  /// Check a schema against the compiled-in layouts.
  Verify {
    /// JSON schema to check; the embedded WebGPU schema if absent.
    file: Option<PathBuf>,
  },

  /// Fill an array of bind group layout entries and print it back.
  Demo {
    #[structopt(short, long, default_value = "4")]
    /// Number of entries.
    count: usize,
  },
}

/// Errors that might stop a command.
#[derive(Debug)]
enum CliError {
  UnknownStruct(String),
  Schema(SchemaError),
  Alloc(AllocError),
  Access(AccessError),
}

impl fmt::Display for CliError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      CliError::UnknownStruct(ref name) => write!(f, "unknown struct: {}", name),
      CliError::Schema(ref e) => write!(f, "schema error: {}", e),
      CliError::Alloc(ref e) => write!(f, "allocation error: {}", e),
      CliError::Access(ref e) => write!(f, "access error: {}", e),
    }
  }
}

impl error::Error for CliError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      CliError::UnknownStruct(_) => None,
      CliError::Schema(e) => Some(e),
      CliError::Alloc(e) => Some(e),
      CliError::Access(e) => Some(e),
    }
  }
}

impl From<SchemaError> for CliError {
  fn from(e: SchemaError) -> Self {
    CliError::Schema(e)
  }
}

impl From<AllocError> for CliError {
  fn from(e: AllocError) -> Self {
    CliError::Alloc(e)
  }
}

impl From<AccessError> for CliError {
  fn from(e: AccessError) -> Self {
    CliError::Access(e)
  }
}

fn main() -> ExitCode {
  env_logger::init();

  let cli_opts = CLIOpts::from_args();
  log::debug!("{:?}", cli_opts);

  exit_code(run(cli_opts.command))
}

fn exit_code(result: Result<bool, CliError>) -> ExitCode {
  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      log::error!("{}", e);
      ExitCode::FAILURE
    }
  }
}

// Run a command; `Ok(false)` reports a failed verification.
fn run(command: Command) -> Result<bool, CliError> {
  match command {
    Command::List => {
      for layout in bound_layouts() {
        println!("{}", layout.name());
      }
    }

    Command::Dump { name: Some(name) } => {
      let layout = find(&name).ok_or(CliError::UnknownStruct(name))?;
      println!("{}", layout);
    }

    Command::Dump { name: None } => print_layouts(bound_layouts()),

    Command::Schema { file } => {
      let layouts = Schema::from_path(file)?.resolve()?;
      print_layouts(layouts.iter());
    }

    Command::Verify { file } => return verify(file),

    Command::Demo { count } => demo(count)?,
  }

  Ok(true)
}

fn print_layouts<'a>(layouts: impl IntoIterator<Item = &'a StructLayout>) {
  for (i, layout) in layouts.into_iter().enumerate() {
    if i > 0 {
      println!();
    }

    println!("{}", layout);
  }
}

fn verify(file: Option<PathBuf>) -> Result<bool, CliError> {
  let schema = match file {
    Some(path) => Schema::from_path(path)?,
    None => Schema::from_json(SCHEMA)?,
  };
  let layouts = schema.resolve()?;
  let mut verified = true;
  let mut checked = 0;

  for layout in layouts.iter() {
    let compiled = match find(layout.name()) {
      Some(compiled) => compiled,
      None => {
        log::warn!("{} is not compiled in; skipping", layout.name());
        continue;
      }
    };

    checked += 1;

    match layout.verify(compiled) {
      Ok(()) => println!("ok       {}", layout.name()),
      Err(mismatch) => {
        println!("mismatch {}: {}", layout.name(), mismatch);
        verified = false;
      }
    }
  }

  // a schema sharing nothing with the compiled-in structs verifies nothing
  if checked == 0 {
    log::warn!("no struct of the schema is compiled in");
    return Ok(false);
  }

  Ok(verified)
}

fn demo(count: usize) -> Result<(), CliError> {
  let arena = Arena::new();
  let mut entries = BindGroupLayoutEntry::allocate_array(count, &arena)?;

  for i in 0..count {
    let mut entry = BindGroupLayoutEntry::element_at_mut(&mut entries, i);
    BindGroupLayoutEntry::set_binding(&mut entry, i as u32);

    // cycle through the four kinds of bindings
    match i % 4 {
      0 => {
        BindGroupLayoutEntry::set_stages(&mut entry, ShaderStage::VERTEX | ShaderStage::FRAGMENT);
        let mut buffer = BindGroupLayoutEntry::buffer_mut(&mut entry);
        BufferBindingLayout::set_binding_type(&mut buffer, BufferBindingType::Uniform);
        BufferBindingLayout::set_min_binding_size(&mut buffer, 64);
      }

      1 => {
        BindGroupLayoutEntry::set_stages(&mut entry, ShaderStage::FRAGMENT);
        let mut sampler = BindGroupLayoutEntry::sampler_mut(&mut entry);
        SamplerBindingLayout::set_binding_type(&mut sampler, SamplerBindingType::Filtering);
      }

      2 => {
        BindGroupLayoutEntry::set_stages(&mut entry, ShaderStage::FRAGMENT);
        let mut texture = BindGroupLayoutEntry::texture_mut(&mut entry);
        TextureBindingLayout::set_sample_kind(&mut texture, TextureSampleType::Float);
        TextureBindingLayout::set_dimension(&mut texture, TextureViewDimension::D2);
      }

      _ => {
        BindGroupLayoutEntry::set_stages(&mut entry, ShaderStage::COMPUTE);
        let mut storage = BindGroupLayoutEntry::storage_texture_mut(&mut entry);
        StorageTextureBindingLayout::set_access_mode(&mut storage, StorageTextureAccess::WriteOnly);
        StorageTextureBindingLayout::set_texel_format(&mut storage, TextureFormat::RGBA8Unorm);
        StorageTextureBindingLayout::set_dimension(&mut storage, TextureViewDimension::D2);
      }
    }
  }

  let entries = entries.into_region();
  log::info!(
    "{} entries at {} ({} bytes in {} blocks)",
    count,
    entries.address(),
    arena.allocated_bytes(),
    arena.allocated_blocks()
  );

  for i in 0..count {
    let entry = BindGroupLayoutEntry::element_at(&entries, i);

    println!("[{}] {} @ {}", i, BindGroupLayoutEntry::NAME, entry.address());
    print_values(BindGroupLayoutEntry::layout(), &entry, 1)?;
  }

  Ok(())
}

// Print every field of a struct through the dynamic accessors, nested structs indented.
fn print_values(layout: &StructLayout, region: &Region, depth: usize) -> Result<(), CliError> {
  let indent = "  ".repeat(depth);

  for field in layout.fields() {
    match field.kind() {
      FieldKind::Struct(nested) => {
        println!("{}{}:", indent, field.name());
        print_values(nested, &field.view(region)?, depth + 1)?;
      }

      _ => println!("{}{} = {}", indent, field.name(), field.value(region)?),
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use structview::schema::TypeRef;
  use tempfile::TempDir;

  fn is_failure(code: ExitCode) -> bool {
    format!("{:?}", code) == format!("{:?}", ExitCode::FAILURE)
  }

  // Write a schema to a file of a temporary directory.
  fn write_schema(dir: &TempDir, schema: &Schema) -> PathBuf {
    let path = dir.path().join("schema.json");
    fs::write(&path, schema.to_json().unwrap()).unwrap();
    path
  }

  #[test]
  fn embedded_schema_verifies() {
    assert!(verify(None).unwrap());
  }

  #[test]
  fn drifted_schema_fails() {
    let dir = TempDir::new().unwrap();
    let mut schema = Schema::from_json(SCHEMA).unwrap();

    let entry = schema
      .structs
      .iter_mut()
      .find(|decl| decl.name == "WGPUBindGroupLayoutEntry")
      .unwrap();
    entry.fields[1].ty = TypeRef::Named("uint64_t".to_owned());

    let path = write_schema(&dir, &schema);
    assert!(!verify(Some(path)).unwrap());
  }

  #[test]
  fn unrelated_schema_fails() {
    let dir = TempDir::new().unwrap();
    let schema = Schema::from_json(
      r#"{ "structs": [ { "name": "Unrelated", "fields": [ { "name": "a", "type": "u32" } ] } ] }"#,
    )
    .unwrap();

    let path = write_schema(&dir, &schema);
    assert!(!verify(Some(path)).unwrap());
  }

  #[test]
  fn failed_verification_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    let schema = Schema::from_json(
      r#"{ "structs": [ { "name": "WGPUChainedStruct", "fields": [ { "name": "next", "type": "u8" } ] } ] }"#,
    )
    .unwrap();

    let path = write_schema(&dir, &schema);
    let verified = run(Command::Verify { file: Some(path) }).unwrap();

    assert!(!verified);
    assert!(is_failure(exit_code(Ok(verified))));
    assert!(!is_failure(exit_code(Ok(true))));
  }

  #[test]
  fn missing_schema_file() {
    let dir = TempDir::new().unwrap();
    let err = verify(Some(dir.path().join("missing.json"))).unwrap_err();

    assert!(matches!(err, CliError::Schema(SchemaError::Io(..))));
    assert!(is_failure(exit_code(Err(err))));
  }

  #[test]
  fn unknown_struct_to_dump() {
    let err = run(Command::Dump {
      name: Some("WGPUNothing".to_owned()),
    })
    .unwrap_err();

    assert!(matches!(err, CliError::UnknownStruct(ref name) if name == "WGPUNothing"));
  }

  #[test]
  fn demo_runs() {
    assert!(run(Command::Demo { count: 5 }).unwrap());
  }
}

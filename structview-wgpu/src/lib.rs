//! WebGPU native structs.
//!
//! Native structs of `webgpu.h` describing bind group layout entries, bound with
//! [structview]. Every struct mirrors its C declaration field by field; the derive checks at
//! compile time that the C layout rules and the Rust compiler agree on every offset.
//!
//! ```
//! use structview::{Arena, NativeStruct};
//! use structview_wgpu::{BindGroupLayoutEntry, BufferBindingLayout, BufferBindingType, ShaderStage};
//!
//! let arena = Arena::new();
//! let mut entry = BindGroupLayoutEntry::allocate(&arena).unwrap();
//!
//! BindGroupLayoutEntry::set_binding(&mut entry, 0);
//! BindGroupLayoutEntry::set_stages(&mut entry, ShaderStage::VERTEX | ShaderStage::FRAGMENT);
//! BufferBindingLayout::set_binding_type(
//!   &mut BindGroupLayoutEntry::buffer_mut(&mut entry),
//!   BufferBindingType::Uniform,
//! );
//!
//! let buffer = BindGroupLayoutEntry::buffer(&entry.as_region());
//! assert_eq!(BufferBindingLayout::binding_type(&buffer), Some(BufferBindingType::Uniform));
//! ```
//!
//! The same structs are described by a [schema](SCHEMA), which can be resolved at runtime and
//! verified against the compiled-in layouts.
//!
//! [structview]: structview

pub mod enums;

pub use crate::enums::{
  BufferBindingType, SamplerBindingType, ShaderStage, StorageTextureAccess, TextureFormat,
  TextureSampleType, TextureViewDimension,
};

use structview::{Address, NativeStruct, Region, RegionMut, StructLayout};
use structview_derive::NativeStruct;

/// Schema of every struct of this crate, in JSON.
pub const SCHEMA: &str = include_str!("../wgpu.json");

/// Header of the extension structs chained through `nextInChain`.
#[derive(Copy, Clone, Debug, NativeStruct)]
#[native(name = "WGPUChainedStruct")]
#[repr(C)]
pub struct ChainedStruct {
  pub next: Address,
  #[native(name = "sType")]
  pub s_type: u32,
}

#[derive(Copy, Clone, Debug, NativeStruct)]
#[native(name = "WGPUBufferBindingLayout")]
#[repr(C)]
pub struct BufferBindingLayout {
  #[native(name = "nextInChain")]
  pub next_in_chain: Address,
  #[native(name = "type")]
  pub ty: u32,
  /// `WGPUBool`.
  #[native(name = "hasDynamicOffset")]
  pub has_dynamic_offset: u32,
  #[native(name = "minBindingSize")]
  pub min_binding_size: u64,
}

#[derive(Copy, Clone, Debug, NativeStruct)]
#[native(name = "WGPUSamplerBindingLayout")]
#[repr(C)]
pub struct SamplerBindingLayout {
  #[native(name = "nextInChain")]
  pub next_in_chain: Address,
  #[native(name = "type")]
  pub ty: u32,
}

#[derive(Copy, Clone, Debug, NativeStruct)]
#[native(name = "WGPUTextureBindingLayout")]
#[repr(C)]
pub struct TextureBindingLayout {
  #[native(name = "nextInChain")]
  pub next_in_chain: Address,
  #[native(name = "sampleType")]
  pub sample_type: u32,
  #[native(name = "viewDimension")]
  pub view_dimension: u32,
  /// `WGPUBool`.
  pub multisampled: u32,
}

#[derive(Copy, Clone, Debug, NativeStruct)]
#[native(name = "WGPUStorageTextureBindingLayout")]
#[repr(C)]
pub struct StorageTextureBindingLayout {
  #[native(name = "nextInChain")]
  pub next_in_chain: Address,
  pub access: u32,
  pub format: u32,
  #[native(name = "viewDimension")]
  pub view_dimension: u32,
}

/// Entry of a bind group layout.
///
/// Only one of the `buffer`, `sampler`, `texture` and `storageTexture` members is expected to be
/// used; the others have their type set to `Undefined` (which zeroed memory is).
#[derive(Copy, Clone, Debug, NativeStruct)]
#[native(name = "WGPUBindGroupLayoutEntry")]
#[repr(C)]
pub struct BindGroupLayoutEntry {
  #[native(name = "nextInChain")]
  pub next_in_chain: Address,
  pub binding: u32,
  /// `WGPUShaderStageFlags`.
  pub visibility: u32,
  #[native(nested)]
  pub buffer: BufferBindingLayout,
  #[native(nested)]
  pub sampler: SamplerBindingLayout,
  #[native(nested)]
  pub texture: TextureBindingLayout,
  #[native(name = "storageTexture", nested)]
  pub storage_texture: StorageTextureBindingLayout,
}

impl BufferBindingLayout {
  pub fn binding_type(region: &Region) -> Option<BufferBindingType> {
    BufferBindingType::from_raw(Self::ty(region))
  }

  pub fn set_binding_type(region: &mut RegionMut, binding_type: BufferBindingType) {
    Self::set_ty(region, binding_type.to_raw())
  }
}

impl SamplerBindingLayout {
  pub fn binding_type(region: &Region) -> Option<SamplerBindingType> {
    SamplerBindingType::from_raw(Self::ty(region))
  }

  pub fn set_binding_type(region: &mut RegionMut, binding_type: SamplerBindingType) {
    Self::set_ty(region, binding_type.to_raw())
  }
}

impl TextureBindingLayout {
  pub fn sample_kind(region: &Region) -> Option<TextureSampleType> {
    TextureSampleType::from_raw(Self::sample_type(region))
  }

  pub fn set_sample_kind(region: &mut RegionMut, sample_type: TextureSampleType) {
    Self::set_sample_type(region, sample_type.to_raw())
  }

  pub fn dimension(region: &Region) -> Option<TextureViewDimension> {
    TextureViewDimension::from_raw(Self::view_dimension(region))
  }

  pub fn set_dimension(region: &mut RegionMut, dimension: TextureViewDimension) {
    Self::set_view_dimension(region, dimension.to_raw())
  }
}

impl StorageTextureBindingLayout {
  pub fn access_mode(region: &Region) -> Option<StorageTextureAccess> {
    StorageTextureAccess::from_raw(Self::access(region))
  }

  pub fn set_access_mode(region: &mut RegionMut, access: StorageTextureAccess) {
    Self::set_access(region, access.to_raw())
  }

  pub fn texel_format(region: &Region) -> Option<TextureFormat> {
    TextureFormat::from_raw(Self::format(region))
  }

  pub fn set_texel_format(region: &mut RegionMut, format: TextureFormat) {
    Self::set_format(region, format.to_raw())
  }

  pub fn dimension(region: &Region) -> Option<TextureViewDimension> {
    TextureViewDimension::from_raw(Self::view_dimension(region))
  }

  pub fn set_dimension(region: &mut RegionMut, dimension: TextureViewDimension) {
    Self::set_view_dimension(region, dimension.to_raw())
  }
}

impl BindGroupLayoutEntry {
  /// Shader stages the binding is visible to; `None` if unknown stage bits are set.
  pub fn stages(region: &Region) -> Option<ShaderStage> {
    ShaderStage::from_bits(Self::visibility(region))
  }

  pub fn set_stages(region: &mut RegionMut, stages: ShaderStage) {
    Self::set_visibility(region, stages.bits())
  }
}

/// Layouts of every struct of this crate, nested structs first.
pub fn bound_layouts() -> Vec<&'static StructLayout> {
  vec![
    ChainedStruct::layout(),
    BufferBindingLayout::layout(),
    SamplerBindingLayout::layout(),
    TextureBindingLayout::layout(),
    StorageTextureBindingLayout::layout(),
    BindGroupLayoutEntry::layout(),
  ]
}

/// Find the layout of a struct of this crate by native name.
pub fn find(name: &str) -> Option<&'static StructLayout> {
  bound_layouts()
    .into_iter()
    .find(|layout| layout.name() == name)
}

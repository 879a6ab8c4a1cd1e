//! Native enumerations and flags used by the bound structs.
//!
//! Native structs store enumerations as plain `u32`. The Rust enums below convert from and to
//! those raw values; a raw value that is not a known variant converts to `None`, as a newer
//! native library might send values this crate does not know about.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

// Declare a native enumeration with its raw values and native names.
macro_rules! native_enum {
  (
    $(#[$meta:meta])*
    $name:ident = $native:literal {
      $(
        $(#[$variant_meta:meta])*
        $variant:ident = $value:literal => $variant_native:literal
      ),* $(,)?
    }
  ) => {
    $(#[$meta])*
    #[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
    #[repr(u32)]
    pub enum $name {
      $(
        $(#[$variant_meta])*
        $variant = $value
      ),*
    }

    impl $name {
      /// Name of the enumeration in the native header.
      pub const NATIVE_NAME: &'static str = $native;

      /// Every variant, in raw value order.
      pub const ALL: &'static [$name] = &[$($name::$variant),*];

      /// Raw value of the variant, as stored in native structs.
      pub const fn to_raw(self) -> u32 {
        self as u32
      }

      pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
          $($value => Some($name::$variant),)*
          _ => None,
        }
      }

      /// Name of the variant in the native header.
      pub fn native_name(self) -> &'static str {
        match self {
          $($name::$variant => $variant_native),*
        }
      }
    }

    impl From<$name> for u32 {
      fn from(e: $name) -> Self {
        e.to_raw()
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str(self.native_name())
      }
    }
  };
}

native_enum! {
  /// How a buffer is bound.
  BufferBindingType = "WGPUBufferBindingType" {
    /// The binding is not a buffer.
    Undefined = 0 => "WGPUBufferBindingType_Undefined",
    Uniform = 1 => "WGPUBufferBindingType_Uniform",
    Storage = 2 => "WGPUBufferBindingType_Storage",
    ReadOnlyStorage = 3 => "WGPUBufferBindingType_ReadOnlyStorage",
  }
}

native_enum! {
  /// How a sampler is bound.
  SamplerBindingType = "WGPUSamplerBindingType" {
    /// The binding is not a sampler.
    Undefined = 0 => "WGPUSamplerBindingType_Undefined",
    Filtering = 1 => "WGPUSamplerBindingType_Filtering",
    NonFiltering = 2 => "WGPUSamplerBindingType_NonFiltering",
    Comparison = 3 => "WGPUSamplerBindingType_Comparison",
  }
}

native_enum! {
  /// Type of the samples of a sampled texture.
  TextureSampleType = "WGPUTextureSampleType" {
    /// The binding is not a sampled texture.
    Undefined = 0 => "WGPUTextureSampleType_Undefined",
    Float = 1 => "WGPUTextureSampleType_Float",
    UnfilterableFloat = 2 => "WGPUTextureSampleType_UnfilterableFloat",
    Depth = 3 => "WGPUTextureSampleType_Depth",
    Sint = 4 => "WGPUTextureSampleType_Sint",
    Uint = 5 => "WGPUTextureSampleType_Uint",
  }
}

native_enum! {
  /// Dimension of a texture view.
  TextureViewDimension = "WGPUTextureViewDimension" {
    Undefined = 0 => "WGPUTextureViewDimension_Undefined",
    D1 = 1 => "WGPUTextureViewDimension_1D",
    D2 = 2 => "WGPUTextureViewDimension_2D",
    D2Array = 3 => "WGPUTextureViewDimension_2DArray",
    Cube = 4 => "WGPUTextureViewDimension_Cube",
    CubeArray = 5 => "WGPUTextureViewDimension_CubeArray",
    D3 = 6 => "WGPUTextureViewDimension_3D",
  }
}

native_enum! {
  /// Access mode of a storage texture.
  StorageTextureAccess = "WGPUStorageTextureAccess" {
    /// The binding is not a storage texture.
    Undefined = 0 => "WGPUStorageTextureAccess_Undefined",
    WriteOnly = 1 => "WGPUStorageTextureAccess_WriteOnly",
    ReadOnly = 2 => "WGPUStorageTextureAccess_ReadOnly",
    ReadWrite = 3 => "WGPUStorageTextureAccess_ReadWrite",
  }
}

native_enum! {
  /// Texel formats usable by storage textures.
  ///
  /// Only the 8-bit and 32-bit color formats are listed.
  TextureFormat = "WGPUTextureFormat" {
    Undefined = 0 => "WGPUTextureFormat_Undefined",
    R8Unorm = 1 => "WGPUTextureFormat_R8Unorm",
    R8Snorm = 2 => "WGPUTextureFormat_R8Snorm",
    R8Uint = 3 => "WGPUTextureFormat_R8Uint",
    R8Sint = 4 => "WGPUTextureFormat_R8Sint",
    R32Float = 12 => "WGPUTextureFormat_R32Float",
    R32Uint = 13 => "WGPUTextureFormat_R32Uint",
    R32Sint = 14 => "WGPUTextureFormat_R32Sint",
    RGBA8Unorm = 18 => "WGPUTextureFormat_RGBA8Unorm",
    RGBA8UnormSrgb = 19 => "WGPUTextureFormat_RGBA8UnormSrgb",
    RGBA8Snorm = 20 => "WGPUTextureFormat_RGBA8Snorm",
    RGBA8Uint = 21 => "WGPUTextureFormat_RGBA8Uint",
    RGBA8Sint = 22 => "WGPUTextureFormat_RGBA8Sint",
    BGRA8Unorm = 23 => "WGPUTextureFormat_BGRA8Unorm",
    BGRA8UnormSrgb = 24 => "WGPUTextureFormat_BGRA8UnormSrgb",
  }
}

/// Shader stages a binding is visible to (`WGPUShaderStageFlags`).
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ShaderStage(u32);

impl ShaderStage {
  pub const NONE: Self = ShaderStage(0);
  pub const VERTEX: Self = ShaderStage(1);
  pub const FRAGMENT: Self = ShaderStage(2);
  pub const COMPUTE: Self = ShaderStage(4);

  const NAMES: [(ShaderStage, &'static str); 3] = [
    (ShaderStage::VERTEX, "VERTEX"),
    (ShaderStage::FRAGMENT, "FRAGMENT"),
    (ShaderStage::COMPUTE, "COMPUTE"),
  ];

  const ALL_BITS: u32 = 1 | 2 | 4;

  /// Build from raw bits; unknown bits yield `None`.
  pub const fn from_bits(bits: u32) -> Option<Self> {
    if bits & !Self::ALL_BITS == 0 {
      Some(ShaderStage(bits))
    } else {
      None
    }
  }

  pub const fn bits(self) -> u32 {
    self.0
  }

  pub const fn contains(self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }
}

impl BitOr for ShaderStage {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self {
    ShaderStage(self.0 | rhs.0)
  }
}

impl BitOrAssign for ShaderStage {
  fn bitor_assign(&mut self, rhs: Self) {
    self.0 |= rhs.0;
  }
}

impl From<ShaderStage> for u32 {
  fn from(stage: ShaderStage) -> Self {
    stage.bits()
  }
}

impl fmt::Display for ShaderStage {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    if self.is_empty() {
      return f.write_str("NONE");
    }

    let mut first = true;

    for &(stage, name) in &Self::NAMES {
      if self.contains(stage) {
        if !first {
          f.write_str(" | ")?;
        }

        f.write_str(name)?;
        first = false;
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn raw_values() {
    assert_eq!(BufferBindingType::Uniform.to_raw(), 1);
    assert_eq!(u32::from(TextureViewDimension::D3), 6);
    assert_eq!(TextureFormat::from_raw(23), Some(TextureFormat::BGRA8Unorm));
    assert_eq!(SamplerBindingType::from_raw(42), None);

    for &sample_type in TextureSampleType::ALL {
      assert_eq!(TextureSampleType::from_raw(sample_type.to_raw()), Some(sample_type));
    }
  }

  #[test]
  fn native_names() {
    assert_eq!(
      StorageTextureAccess::WriteOnly.to_string(),
      "WGPUStorageTextureAccess_WriteOnly"
    );
    assert_eq!(TextureViewDimension::D2Array.native_name(), "WGPUTextureViewDimension_2DArray");
    assert_eq!(BufferBindingType::NATIVE_NAME, "WGPUBufferBindingType");
  }

  #[test]
  fn shader_stages() {
    let mut stages = ShaderStage::VERTEX | ShaderStage::FRAGMENT;

    assert_eq!(stages.bits(), 3);
    assert!(stages.contains(ShaderStage::VERTEX));
    assert!(!stages.contains(ShaderStage::COMPUTE));
    assert_eq!(stages.to_string(), "VERTEX | FRAGMENT");

    stages |= ShaderStage::COMPUTE;
    assert_eq!(ShaderStage::from_bits(stages.bits()), Some(stages));
    assert_eq!(ShaderStage::from_bits(8), None);
    assert_eq!(ShaderStage::NONE.to_string(), "NONE");
  }
}

//! Derive procedural macros for [structview].
//!
//! # `NativeStruct`
//!
//! Derive [`NativeStruct`] on a `#[repr(C)]` Rust mirror of a native C struct:
//!
//! ```
//! use structview::{Address, Arena, NativeStruct};
//! use structview_derive::NativeStruct;
//!
//! #[derive(NativeStruct)]
//! #[native(name = "WGPUSamplerBindingLayout")]
//! #[repr(C)]
//! pub struct SamplerBindingLayout {
//!   #[native(name = "nextInChain")]
//!   pub next_in_chain: Address,
//!   #[native(name = "type")]
//!   pub ty: u32,
//! }
//!
//! let arena = Arena::new();
//! let mut sampler = SamplerBindingLayout::allocate(&arena).unwrap();
//! SamplerBindingLayout::set_ty(&mut sampler, 2);
//!
//! assert_eq!(SamplerBindingLayout::ty(&sampler.as_region()), 2);
//!
//! let ty = SamplerBindingLayout::layout().field("type").unwrap();
//! assert_eq!(ty.offset(), SamplerBindingLayout::TY.offset());
//! ```
//!
//! The following is generated:
//!
//! - The [`NativeStruct`] implementation, whose layout is computed with the C layout rules from
//!   the field types and cached.
//! - For every field, an associated constant named after the field in upper case, holding its
//!   accessor, plus accessor functions:
//!   - Scalar fields: `field(&Region) -> T` and `set_field(&mut RegionMut, T)`.
//!   - Nested struct fields, marked with `#[native(nested)]`: `field(&Region) -> Region` (a
//!     view), `field_mut(&mut RegionMut) -> RegionMut` and `set_field(&mut RegionMut, &Region)`
//!     (a copy).
//! - Compile-time assertions checking that the offsets computed with the C layout rules are the
//!   offsets the Rust compiler gave to the fields, and that the sizes and alignments agree.
//! - A check, run once when the layout is built, that the layout agrees with the compiler. Nested
//!   structs bound by hand might not.
//!
//! # Attributes
//!
//! - `#[native(name = "…")]`, on the struct or on a field: name of the struct or field in the
//!   native header. Defaults to the Rust name.
//! - `#[native(nested)]`, on a field: the field is a nested native struct.
//!
//! # Rejected structs
//!
//! Only `#[repr(C)]` structs with named fields and no generic parameter can be derived:
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! struct NotC {
//!   a: u32,
//! }
//! ```
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct Pair(u32, u32);
//! ```
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct Unit;
//! ```
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct Empty {}
//! ```
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! enum Kind {
//!   A,
//! }
//! ```
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct Generic<T> {
//!   a: T,
//! }
//! ```
//!
//! Over-alignment is not part of the C layout rules:
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C, align(16))]
//! struct Wide {
//!   a: u64,
//! }
//! ```
//!
//! Attributes must be known, used once, in their own form and at their own level:
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct UnknownKey {
//!   #[native(inline)]
//!   a: u32,
//! }
//! ```
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct TwoNames {
//!   #[native(name = "a", name = "b")]
//!   a: u32,
//! }
//! ```
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct NameWithoutValue {
//!   #[native(name)]
//!   a: u32,
//! }
//! ```
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[native(nested)]
//! #[repr(C)]
//! struct NestedStruct {
//!   a: u32,
//! }
//! ```
//!
//! ```compile_fail
//! # use structview_derive::NativeStruct;
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct SameNativeName {
//!   #[native(name = "a")]
//!   first: u32,
//!   #[native(name = "a")]
//!   second: u32,
//! }
//! ```
//!
//! A scalar whose declared size is not its Rust size fails the layout assertions:
//!
//! ```compile_fail,E0080
//! # use structview::{FieldKind, Scalar, ScalarKind};
//! # use structview_derive::NativeStruct;
//! #[derive(Clone, Copy)]
//! struct Short(u32);
//!
//! impl Scalar for Short {
//!   const SIZE: usize = 2;
//!   const ALIGN: usize = 4;
//!
//!   fn kind() -> FieldKind {
//!     FieldKind::Scalar(ScalarKind::U16)
//!   }
//!
//!   fn decode(_: &[u8]) -> Self {
//!     Short(0)
//!   }
//!
//!   fn encode(self, _: &mut [u8]) {}
//! }
//!
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct HoldsShort {
//!   short: Short,
//! }
//! ```
//!
//! [structview]: https://docs.rs/structview
//! [`NativeStruct`]: https://docs.rs/structview/latest/structview/native/trait.NativeStruct.html

extern crate proc_macro;

mod attrib;
mod native_struct;

use crate::native_struct::generate_native_struct_impl;
use proc_macro::TokenStream;
use quote::quote;
use std::fmt;
use syn::{self, parse_macro_input, Data, DeriveInput};

#[proc_macro_derive(NativeStruct, attributes(native))]
pub fn derive_native_struct(input: TokenStream) -> TokenStream {
  let di: DeriveInput = parse_macro_input!(input);

  match di.data {
    // for now, we only handle structs
    Data::Struct(struct_) => {
      match generate_native_struct_impl(di.ident, &di.attrs, &di.generics, struct_) {
        Ok(impl_) => impl_.into(),
        Err(e) => compile_error(e),
      }
    }

    _ => compile_error("only structs are currently supported for deriving NativeStruct"),
  }
}

fn compile_error(msg: impl fmt::Display) -> TokenStream {
  let msg = msg.to_string();
  quote!(compile_error!(#msg);).into()
}

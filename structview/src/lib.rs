//! # Typed projection of native C structures onto raw memory
//!
//! Native libraries exchange data through C structs: blocks of memory whose fields live at
//! offsets fixed by the C ABI of the target. structview is one generic mechanism to read and
//! write such blocks from Rust, instead of one hand-written binding file per struct:
//!
//! - A [`StructLayout`](layout::StructLayout) describes a struct: size, alignment and, for every
//!   field, its offset, size and kind. Layouts are computed with the C layout rules by a
//!   [`LayoutBuilder`](layout::LayoutBuilder), never written by hand.
//! - Field accessors read and write fields in a [region](region) of memory: [`Field`] for
//!   scalars, [`Nested`] for nested structs (zero-copy views or bulk copies).
//! - [Allocators](alloc) hand out zeroed regions sized for one or several instances of a struct;
//!   an [`Arena`] owns what it allocates and releases everything when dropped.
//! - [Reinterpretation](arena::Arena::reinterpret) binds memory allocated by the native library
//!   to an arena. It is the only `unsafe` entry point of the crate.
//!
//! The per-struct surface is obtained by implementing [`NativeStruct`], typically with the
//! `#[derive(NativeStruct)]` procedural macro of `structview-derive`:
//!
//! ```ignore
//! #[derive(NativeStruct)]
//! #[repr(C)]
//! struct WGPUChainedStruct {
//!   next: Address,
//!   #[native(name = "sType")]
//!   s_type: u32,
//! }
//!
//! let arena = Arena::new();
//! let mut region = WGPUChainedStruct::allocate(&arena)?;
//! WGPUChainedStruct::set_s_type(&mut region, 3);
//! ```
//!
//! # Regions and safety
//!
//! Regions are borrowed byte spans. Every field access is bounds-checked against the region it is
//! performed on: accessing a field past the end of a region panics instead of touching memory
//! that does not belong to it. The borrow checker guarantees that a region never outlives the
//! allocator it comes from, and is never read and written at the same time.
//!
//! # Feature flags
//!
//! - `schema` (default): load struct descriptions from JSON with [`schema::Schema`] and compute
//!   their layouts at runtime.

pub mod alloc;
pub mod arena;
pub mod field;
pub mod layout;
pub mod native;
pub mod region;
pub mod scalar;
#[cfg(feature = "schema")]
pub mod schema;

pub use crate::alloc::{AllocError, Allocator, SlicingAllocator};
pub use crate::arena::Arena;
pub use crate::field::{AccessError, Field, Nested};
pub use crate::layout::{FieldKind, FieldLayout, LayoutBuilder, StructLayout};
pub use crate::native::NativeStruct;
pub use crate::region::{Region, RegionMut};
pub use crate::scalar::{Address, Scalar, ScalarKind, Value};

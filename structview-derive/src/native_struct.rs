use crate::attrib::{get_field_flag_once, get_field_str_once, AttrError};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::fmt;
use syn::{Attribute, DataStruct, Fields, Generics, Ident, Lit, Meta, NestedMeta};

// Sub keys of the native attribute, on fields and on the struct.
const KNOWN_SUBKEYS: &[&str] = &["name", "nested"];
const STRUCT_SUBKEYS: &[&str] = &["name"];

#[derive(Debug)]
pub(crate) enum StructImplError {
  NameError(AttrError),
  FieldError(AttrError),
  UnsupportedUnnamed,
  UnsupportedUnit,
  UnsupportedGenerics,
  MissingReprC,
  InvalidPacking,
  UnsupportedAlign,
  Empty,
  DuplicateName(String),
}

impl fmt::Display for StructImplError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      StructImplError::NameError(ref e) => write!(f, "error with native struct name; {}", e),
      StructImplError::FieldError(ref e) => write!(f, "error with native field; {}", e),
      StructImplError::UnsupportedUnnamed => f.write_str("unsupported unnamed fields"),
      StructImplError::UnsupportedUnit => f.write_str("unsupported unit struct"),
      StructImplError::UnsupportedGenerics => f.write_str("unsupported generic struct"),
      StructImplError::MissingReprC => f.write_str("native structs must be #[repr(C)]"),
      StructImplError::InvalidPacking => f.write_str("cannot parse #[repr(packed(…))]"),
      StructImplError::UnsupportedAlign => {
        f.write_str("unsupported #[repr(align(…))]; native structs are aligned by their fields")
      }
      StructImplError::Empty => f.write_str("native structs must have at least one field"),
      StructImplError::DuplicateName(ref name) => write!(f, "duplicate native field name {}", name),
    }
  }
}

/// Look for `#[repr(C)]` and return the packing of the struct, if any.
fn repr_c_packing(attrs: &[Attribute]) -> Result<Option<usize>, StructImplError> {
  let mut repr_c = false;
  let mut packing = None;

  for attr in attrs.iter().filter(|attr| attr.path.is_ident("repr")) {
    if let Ok(Meta::List(ml)) = attr.parse_meta() {
      for nested in ml.nested {
        match nested {
          NestedMeta::Meta(Meta::Path(ref path)) if path.is_ident("C") => repr_c = true,

          NestedMeta::Meta(Meta::Path(ref path)) if path.is_ident("packed") => packing = Some(1),

          NestedMeta::Meta(Meta::List(ref packed)) if packed.path.is_ident("packed") => {
            let n = match packed.nested.first() {
              Some(NestedMeta::Lit(Lit::Int(ref n))) => n
                .base10_parse::<usize>()
                .map_err(|_| StructImplError::InvalidPacking)?,
              _ => return Err(StructImplError::InvalidPacking),
            };

            packing = Some(n);
          }

          NestedMeta::Meta(ref meta) if meta.path().is_ident("align") => {
            return Err(StructImplError::UnsupportedAlign);
          }

          _ => (),
        }
      }
    }
  }

  if repr_c {
    Ok(packing)
  } else {
    Err(StructImplError::MissingReprC)
  }
}

/// Generate the NativeStruct impl, the accessors and the layout assertions for a struct.
pub(crate) fn generate_native_struct_impl(
  ident: Ident,
  attrs: &[Attribute],
  generics: &Generics,
  struct_: DataStruct,
) -> Result<TokenStream, StructImplError> {
  if !generics.params.is_empty() {
    return Err(StructImplError::UnsupportedGenerics);
  }

  let packing = repr_c_packing(attrs)?;

  // the native name defaults to the Rust one
  let native_name = get_field_str_once(&ident, attrs, "native", "name", STRUCT_SUBKEYS)
    .or_else(|e| match e {
      AttrError::CannotFindAttribute(..) => Ok(ident.to_string()),
      _ => Err(e),
    })
    .map_err(StructImplError::NameError)?;

  let named_fields = match struct_.fields {
    Fields::Named(named_fields) => named_fields,
    Fields::Unnamed(_) => return Err(StructImplError::UnsupportedUnnamed),
    Fields::Unit => return Err(StructImplError::UnsupportedUnit),
  };

  if named_fields.named.is_empty() {
    return Err(StructImplError::Empty);
  }

  let mut names = Vec::new();
  let mut layout_fields = Vec::new();
  let mut accessors = Vec::new();
  let mut checks = Vec::new();
  let mut offsets = Vec::new();

  // alignment of a field, capped by the packing of the struct
  let field_align = |ty: &syn::Type| match packing {
    Some(packing) => quote! {
      if ::core::mem::align_of::<#ty>() > #packing {
        #packing
      } else {
        ::core::mem::align_of::<#ty>()
      }
    },
    None => quote! { ::core::mem::align_of::<#ty>() },
  };

  for field in named_fields.named {
    let field_ident = match field.ident {
      Some(ref field_ident) => field_ident.clone(),
      None => return Err(StructImplError::UnsupportedUnnamed),
    };
    let rust_name = field_ident.to_string().trim_start_matches("r#").to_owned();

    let field_name = get_field_str_once(
      &field_ident,
      field.attrs.iter(),
      "native",
      "name",
      KNOWN_SUBKEYS,
    )
    .or_else(|e| match e {
      AttrError::CannotFindAttribute(..) => Ok(rust_name.clone()),
      _ => Err(e),
    })
    .map_err(StructImplError::FieldError)?;

    let nested = get_field_flag_once(
      &field_ident,
      field.attrs.iter(),
      "native",
      "nested",
      KNOWN_SUBKEYS,
    )
    .map_err(StructImplError::FieldError)?;

    if names.contains(&field_name) {
      return Err(StructImplError::DuplicateName(field_name));
    }

    let ty = field.ty;
    let vis = field.vis;
    let const_ident = format_ident!("{}", rust_name.to_uppercase());
    let setter = format_ident!("set_{}", rust_name);
    let offset = quote! { ::core::mem::offset_of!(#ident, #field_ident) };

    if nested {
      let getter_mut = format_ident!("{}_mut", rust_name);
      let const_doc = format!("Accessor of the nested `{}` struct.", field_name);

      layout_fields.push(quote! {
        .field(#field_name, ::structview::FieldKind::of_struct::<#ty>())
      });

      accessors.push(quote! {
        #[doc = #const_doc]
        #vis const #const_ident: ::structview::Nested<#ty> = ::structview::Nested::new(#offset);

        #vis fn #field_ident<'a>(region: &::structview::Region<'a>) -> ::structview::Region<'a> {
          Self::#const_ident.view(region)
        }

        #vis fn #getter_mut<'r>(
          region: &'r mut ::structview::RegionMut<'_>,
        ) -> ::structview::RegionMut<'r> {
          Self::#const_ident.view_mut(region)
        }

        #vis fn #setter(region: &mut ::structview::RegionMut, source: &::structview::Region) {
          Self::#const_ident.set(region, source)
        }
      });
    } else {
      let const_doc = format!("Accessor of the `{}` field.", field_name);
      let size_msg = format!(
        "{}.{}: scalar size differs from the Rust size",
        native_name, field_name
      );

      layout_fields.push(quote! {
        .field(#field_name, ::structview::FieldKind::of::<#ty>())
      });

      accessors.push(quote! {
        #[doc = #const_doc]
        #vis const #const_ident: ::structview::Field<#ty> = ::structview::Field::new(#offset);

        #vis fn #field_ident(region: &::structview::Region) -> #ty {
          Self::#const_ident.read(region)
        }

        #vis fn #setter(region: &mut ::structview::RegionMut, value: #ty) {
          Self::#const_ident.write(region, value)
        }
      });

      checks.push(quote! {
        assert!(
          <#ty as ::structview::Scalar>::SIZE == ::core::mem::size_of::<#ty>(),
          #size_msg
        );
      });
    }

    let align = field_align(&ty);
    let offset_msg = format!(
      "{}.{}: C layout offset differs from the Rust offset",
      native_name, field_name
    );

    checks.push(quote! {
      let field_align = #align;
      offset = ::structview::layout::align_to(offset, field_align);
      assert!(offset == #offset, #offset_msg);
      offset += ::core::mem::size_of::<#ty>();

      if field_align > align {
        align = field_align;
      }
    });

    offsets.push(offset);
    names.push(field_name);
  }

  let packed = packing.map(|packing| quote! { .packed(#packing) });
  let struct_size_msg = format!(
    "{}: C layout size differs from the Rust size",
    native_name
  );
  let struct_align_msg = format!(
    "{}: C layout alignment differs from the Rust alignment",
    native_name
  );

  let impl_ = quote! {
    unsafe impl ::structview::NativeStruct for #ident {
      const NAME: &'static str = #native_name;

      fn layout() -> &'static ::structview::StructLayout {
        static LAYOUT: ::std::sync::OnceLock<::structview::StructLayout> =
          ::std::sync::OnceLock::new();

        ::structview::native::cached_layout(&LAYOUT, || {
          let layout = ::structview::LayoutBuilder::new(#native_name)
            #packed
            #(#layout_fields)*
            .build()?;

          ::structview::native::expect_abi(
            &layout,
            ::core::mem::size_of::<Self>(),
            ::core::mem::align_of::<Self>(),
            &[#(#offsets),*],
          );

          Ok(layout)
        })
      }
    }

    impl #ident {
      #(#accessors)*
    }

    // the C layout algorithm must agree with the compiler
    const _: () = {
      let mut offset = 0usize;
      let mut align = 1usize;

      #(#checks)*

      assert!(
        ::structview::layout::align_to(offset, align) == ::core::mem::size_of::<#ident>(),
        #struct_size_msg
      );
      assert!(align == ::core::mem::align_of::<#ident>(), #struct_align_msg);
    };
  };

  Ok(impl_)
}

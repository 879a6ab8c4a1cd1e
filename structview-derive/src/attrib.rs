use std::error;
use std::fmt;
use syn::{Attribute, Ident, Lit, Meta, NestedMeta};

#[derive(Debug)]
pub(crate) enum AttrError {
  Several(Ident, String, String),
  CannotFindAttribute(Ident, String, String),
  CannotParseAttribute(Ident, String, String),
  UnknownSubKey(Ident, String, String),
  WrongForm(Ident, String, String),
}

impl AttrError {
  pub(crate) fn several(field: Ident, key: impl Into<String>, sub_key: impl Into<String>) -> Self {
    AttrError::Several(field, key.into(), sub_key.into())
  }

  pub(crate) fn cannot_find_attribute(
    field: Ident,
    key: impl Into<String>,
    sub_key: impl Into<String>,
  ) -> Self {
    AttrError::CannotFindAttribute(field, key.into(), sub_key.into())
  }

  pub(crate) fn cannot_parse_attribute(
    field: Ident,
    key: impl Into<String>,
    sub_key: impl Into<String>,
  ) -> Self {
    AttrError::CannotParseAttribute(field, key.into(), sub_key.into())
  }

  pub(crate) fn unknown_sub_key(
    field: Ident,
    key: impl Into<String>,
    sub_key: impl Into<String>,
  ) -> Self {
    AttrError::UnknownSubKey(field, key.into(), sub_key.into())
  }

  pub(crate) fn wrong_form(field: Ident, key: impl Into<String>, sub_key: impl Into<String>) -> Self {
    AttrError::WrongForm(field, key.into(), sub_key.into())
  }
}

impl fmt::Display for AttrError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      AttrError::Several(ref field, ref key, ref sub_key) => write!(
        f,
        "expected one pair {}({}) for {}, got several",
        key, sub_key, field
      ),
      AttrError::CannotFindAttribute(ref field, ref key, ref sub_key) => {
        write!(f, "no attribute found {}({}) for {}", key, sub_key, field)
      }
      AttrError::CannotParseAttribute(ref field, ref key, ref sub_key) => write!(
        f,
        "cannot parse attribute {}({}) for {}; expected a C identifier",
        key, sub_key, field
      ),
      AttrError::UnknownSubKey(ref field, ref key, ref sub_key) => {
        write!(f, "unknown sub key “{}” in {}(…) for {}", sub_key, key, field)
      }
      AttrError::WrongForm(ref field, ref key, ref sub_key) => write!(
        f,
        "sub key “{}” in {}(…) for {} is not used in its expected form",
        sub_key, key, field
      ),
    }
  }
}

impl error::Error for AttrError {}

// Name of the first segment of a path, used to report unknown sub keys.
fn path_name(path: &syn::Path) -> String {
  path
    .segments
    .first()
    .map(|seg| seg.ident.to_string())
    .unwrap_or_default()
}

// Whether a string can be used as a C identifier.
fn is_c_identifier(name: &str) -> bool {
  let mut chars = name.chars();

  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => {
      chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
    _ => false,
  }
}

// Check a sub key that is not the one looked for: it must be known.
fn check_other_sub_key(
  field_ident: &Ident,
  key: &str,
  path: &syn::Path,
  known_subkeys: &[&str],
) -> Result<(), AttrError> {
  let ident_str = path_name(path);

  if known_subkeys.contains(&ident_str.as_str()) {
    Ok(())
  } else {
    Err(AttrError::unknown_sub_key(field_ident.clone(), key, ident_str))
  }
}

/// Get a C identifier on a struct or a field that must appear only once with the following
/// syntax:
///
///   #[key(sub_key = "lit")]
///
/// The literal is kept as a string, so that names that are Rust keywords (`type`) are accepted.
pub(crate) fn get_field_str_once<'a, A>(
  field_ident: &Ident,
  attrs: A,
  key: &str,
  sub_key: &str,
  known_subkeys: &[&str],
) -> Result<String, AttrError>
where
  A: IntoIterator<Item = &'a Attribute>,
{
  let mut lit = None;

  for attr in attrs.into_iter() {
    match attr.parse_meta() {
      Ok(Meta::List(ref ml)) if ml.path.is_ident(key) => {
        for nested in ml.nested.iter() {
          match nested {
            NestedMeta::Meta(Meta::NameValue(ref mnv)) if mnv.path.is_ident(sub_key) => {
              if lit.is_some() {
                return Err(AttrError::several(field_ident.clone(), key, sub_key));
              }

              match mnv.lit {
                Lit::Str(ref strlit) if is_c_identifier(&strlit.value()) => {
                  lit = Some(strlit.value());
                }

                _ => {
                  return Err(AttrError::cannot_parse_attribute(
                    field_ident.clone(),
                    key,
                    sub_key,
                  ))
                }
              }
            }

            // the right sub key in the wrong form, such as #[key(sub_key)]
            NestedMeta::Meta(ref meta) if meta.path().is_ident(sub_key) => {
              return Err(AttrError::wrong_form(field_ident.clone(), key, sub_key));
            }

            NestedMeta::Meta(ref meta) => {
              check_other_sub_key(field_ident, key, meta.path(), known_subkeys)?
            }

            NestedMeta::Lit(_) => {
              return Err(AttrError::wrong_form(field_ident.clone(), key, sub_key));
            }
          }
        }
      }

      _ => (), // ignore things that might not be ours
    }
  }

  lit.ok_or_else(|| AttrError::cannot_find_attribute(field_ident.clone(), key, sub_key))
}

/// Get a flag on a field that must appear only once with the following syntax:
///
///   #[key(sub_key)]
pub(crate) fn get_field_flag_once<'a, A>(
  field_ident: &Ident,
  attrs: A,
  key: &str,
  sub_key: &str,
  known_subkeys: &[&str],
) -> Result<bool, AttrError>
where
  A: IntoIterator<Item = &'a Attribute>,
{
  let mut flag = false;

  for attr in attrs.into_iter() {
    match attr.parse_meta() {
      Ok(Meta::List(ref ml)) if ml.path.is_ident(key) => {
        for nested in ml.nested.iter() {
          match nested {
            NestedMeta::Meta(Meta::Path(ref path)) if path.is_ident(sub_key) => {
              if flag {
                return Err(AttrError::several(field_ident.clone(), key, sub_key));
              }

              flag = true;
            }

            // the right sub key in the wrong form, such as #[key(sub_key = "…")]
            NestedMeta::Meta(ref meta) if meta.path().is_ident(sub_key) => {
              return Err(AttrError::wrong_form(field_ident.clone(), key, sub_key));
            }

            NestedMeta::Meta(ref meta) => {
              check_other_sub_key(field_ident, key, meta.path(), known_subkeys)?
            }

            NestedMeta::Lit(_) => {
              return Err(AttrError::wrong_form(field_ident.clone(), key, sub_key));
            }
          }
        }
      }

      _ => (), // ignore things that might not be ours
    }
  }

  Ok(flag)
}

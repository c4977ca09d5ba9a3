//! Derive macros for rowforge
//!
//! Provides `#[derive(Mapped)]` and `#[derive(MappedEnum)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod common;
mod mapped;
mod mapped_enum;

/// Derive `Mapped` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use rowforge::Mapped;
///
/// #[derive(Debug, Default, Mapped)]
/// #[orm(table = "users", auto_increment)]
/// struct User {
///     id: i64,
///     username: String,
///     #[orm(column = "email_address")]
///     email: Option<String>,
///     #[orm(relation)]
///     posts: Vec<Post>,
/// }
/// ```
///
/// # Struct attributes
///
/// - `#[orm(table = "name")]` - Table name (defaults to the type name)
/// - `#[orm(primary_key = "a, b")]` - Primary key columns
/// - `#[orm(auto_increment)]` - The key is generated by the database
/// - `#[orm(sequence = "name")]` - Sequence backing the key
/// - `#[orm(no_default)]` - The type cannot be built from rows
///
/// # Field attributes
///
/// - `#[orm(id)]` - Mark the field as (part of) the primary key
/// - `#[orm(column = "name")]` - Map the field to a different column name
/// - `#[orm(result)]` - Read-only result column, never written
/// - `#[orm(no_select)]` - Left out of generated select lists
/// - `#[orm(insert = "...")]`, `#[orm(update = "...")]` - Write templates
/// - `#[orm(relation)]` - `Vec<T>` or `Option<T>` filled when linking rows
/// - `#[orm(ignore)]` - Not a column
///
/// Without `primary_key` or `id`, a field named `id` is the key.
#[proc_macro_derive(Mapped, attributes(orm))]
pub fn derive_mapped(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    mapped::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive column conversions for a fieldless enum.
///
/// # Example
///
/// ```ignore
/// use rowforge::MappedEnum;
///
/// #[derive(Debug, Clone, Copy, PartialEq, MappedEnum)]
/// enum Status {
///     Active,
///     #[orm(rename = "on_hold")]
///     OnHold,
/// }
/// ```
#[proc_macro_derive(MappedEnum, attributes(orm))]
pub fn derive_mapped_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    mapped_enum::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

//! `#[derive(MappedEnum)]` implementation.
//!
//! Enum members are stored by variant name and read back by name
//! (case-insensitive) or by ordinal.

use crate::attrs::VariantAttrs;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let enum_name = name.to_string();

    let data = match &input.data {
        Data::Enum(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "MappedEnum can only be derived for enums",
            ));
        }
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            &input,
            "MappedEnum requires at least one variant",
        ));
    }

    let mut idents = Vec::new();
    let mut names = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "MappedEnum only supports unit variants",
            ));
        }
        let attrs = VariantAttrs::parse(&variant.attrs)?;
        names.push(attrs.rename.unwrap_or_else(|| variant.ident.to_string()));
        idents.push(&variant.ident);
    }
    let ordinals: Vec<i64> = (0..idents.len() as i64).collect();

    Ok(quote! {
        impl ::rowforge::ColumnType for #name {
            fn kind() -> ::rowforge::ValueKind {
                ::rowforge::ValueKind::Enum(::rowforge::EnumInfo {
                    name: #enum_name,
                    variants: &[#(#names),*],
                })
            }
        }

        impl ::rowforge::ToValue for #name {
            fn to_value(&self) -> ::rowforge::Value {
                let name = match self {
                    #(Self::#idents => #names,)*
                };
                ::rowforge::Value::Text(name.to_string())
            }
        }

        impl ::rowforge::FromValue for #name {
            fn from_value(value: ::rowforge::Value) -> ::rowforge::OrmResult<Self> {
                match value {
                    ::rowforge::Value::Int(ordinal) => match ordinal {
                        #(#ordinals => ::std::result::Result::Ok(Self::#idents),)*
                        _ => ::std::result::Result::Err(
                            ::rowforge::OrmError::enum_value_not_found(ordinal.to_string(), #enum_name),
                        ),
                    },
                    ::rowforge::Value::Text(text) => {
                        let trimmed = text.trim();
                        #(
                            if trimmed.eq_ignore_ascii_case(#names) {
                                return ::std::result::Result::Ok(Self::#idents);
                            }
                        )*
                        ::std::result::Result::Err(
                            ::rowforge::OrmError::enum_value_not_found(text, #enum_name),
                        )
                    }
                    other => ::std::result::Result::Err(::rowforge::OrmError::decode(
                        "",
                        ::std::format!("cannot convert {} value to {}", other.type_name(), #enum_name),
                    )),
                }
            }
        }

        impl ::std::convert::From<#name> for ::rowforge::Value {
            fn from(value: #name) -> Self {
                ::rowforge::ToValue::to_value(&value)
            }
        }

        impl ::std::convert::From<#name> for ::rowforge::Arg {
            fn from(value: #name) -> Self {
                ::rowforge::Arg::Scalar(::rowforge::ToValue::to_value(&value))
            }
        }
    })
}

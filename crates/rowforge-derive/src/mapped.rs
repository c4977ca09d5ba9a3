//! `#[derive(Mapped)]` implementation.

use crate::attrs::{FieldAttrs, StructAttrs};
use crate::common::syn_types::{box_inner, option_inner, vec_inner};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

enum RelationShape {
    Many,
    One,
    BoxedOne,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let struct_attrs = StructAttrs::parse(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Mapped can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Mapped can only be derived for structs",
            ));
        }
    };

    let mut column_descriptors = Vec::new();
    let mut set_arms = Vec::new();
    let mut get_arms = Vec::new();
    let mut relation_descriptors = Vec::new();
    let mut attach_arms = Vec::new();
    let mut marked_keys = Vec::new();
    let mut has_id_field = false;

    for field in fields {
        let attrs = FieldAttrs::parse(&field.attrs)?;
        if attrs.ignore {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let member = ident.to_string();
        let ty = &field.ty;

        if attrs.relation {
            let relation_index = relation_descriptors.len();
            let (shape, target) = if let Some(inner) = vec_inner(ty) {
                (RelationShape::Many, inner)
            } else if let Some(inner) = option_inner(ty) {
                match box_inner(inner) {
                    Some(boxed) => (RelationShape::BoxedOne, boxed),
                    None => (RelationShape::One, inner),
                }
            } else {
                return Err(syn::Error::new_spanned(
                    ty,
                    "relation fields must be Vec<T>, Option<T> or Option<Box<T>>",
                ));
            };

            let (constructor, store) = match shape {
                RelationShape::Many => (quote!(many), quote!(self.#ident.push(*child))),
                RelationShape::One => (quote!(one), quote!(self.#ident = Some(*child))),
                RelationShape::BoxedOne => (quote!(one), quote!(self.#ident = Some(child))),
            };
            relation_descriptors.push(quote! {
                ::rowforge::RelationDescriptor::#constructor::<#target>(#member, #relation_index)
            });
            attach_arms.push(quote! {
                #relation_index => match child.downcast::<#target>() {
                    Ok(child) => {
                        #store;
                        true
                    }
                    Err(_) => false,
                }
            });
            continue;
        }

        let member_index = column_descriptors.len();
        let column_name = attrs.column.clone().unwrap_or_else(|| member.clone());
        if attrs.id {
            marked_keys.push(column_name.clone());
        }
        if member == "id" {
            has_id_field = true;
        }

        let mut descriptor = quote! {
            ::rowforge::ColumnDescriptor::of::<#ty>(#member, #member_index)
        };
        if let Some(column) = &attrs.column {
            descriptor = quote!(#descriptor.named(#column));
        }
        if attrs.result {
            descriptor = quote!(#descriptor.result());
        }
        if attrs.no_select {
            descriptor = quote!(#descriptor.no_select());
        }
        if let Some(template) = &attrs.insert {
            descriptor = quote!(#descriptor.insert_template(#template));
        }
        if let Some(template) = &attrs.update {
            descriptor = quote!(#descriptor.update_template(#template));
        }
        column_descriptors.push(descriptor);

        set_arms.push(quote! {
            #member_index => {
                self.#ident = <#ty as ::rowforge::FromValue>::from_value(value)?;
            }
        });
        get_arms.push(quote! {
            #member_index => ::rowforge::ToValue::to_value(&self.#ident),
        });
    }

    let primary_key = if !struct_attrs.primary_key.is_empty() {
        if !marked_keys.is_empty() {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "use either #[orm(primary_key = ...)] or #[orm(id)], not both",
            ));
        }
        struct_attrs.primary_key.clone()
    } else if !marked_keys.is_empty() {
        marked_keys
    } else if has_id_field {
        vec!["id".to_string()]
    } else {
        Vec::new()
    };

    let type_name = name.to_string();
    let table = struct_attrs.table.as_ref().map(|t| quote!(.table(#t)));
    let primary_key = (!primary_key.is_empty()).then(|| quote!(.primary_key(&[#(#primary_key),*])));
    let auto_increment = struct_attrs.auto_increment;
    let sequence = struct_attrs.sequence.as_ref().map(|s| quote!(.sequence(#s)));
    let constructible = !struct_attrs.no_default;

    let construct_body = if constructible {
        quote!(::std::option::Option::Some(<Self as ::std::default::Default>::default()))
    } else {
        quote!(::std::option::Option::None)
    };

    let attach_fn = if attach_arms.is_empty() {
        quote!()
    } else {
        quote! {
            fn attach(
                &mut self,
                relation_index: usize,
                child: ::std::boxed::Box<dyn ::std::any::Any + ::std::marker::Send>,
            ) -> bool {
                match relation_index {
                    #(#attach_arms,)*
                    _ => false,
                }
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::rowforge::Mapped for #name #ty_generics #where_clause {
            fn describe() -> ::rowforge::TypeDescription {
                ::rowforge::TypeDescription::new(#type_name)
                    #table
                    #primary_key
                    .auto_increment(#auto_increment)
                    #sequence
                    #(.column(#column_descriptors))*
                    #(.relation(#relation_descriptors))*
                    .constructible(#constructible)
            }

            fn construct() -> ::std::option::Option<Self> {
                #construct_body
            }

            #[allow(unreachable_code, unused_variables)]
            fn set_member(
                &mut self,
                member_index: usize,
                value: ::rowforge::Value,
            ) -> ::rowforge::OrmResult<()> {
                match member_index {
                    #(#set_arms)*
                    _ => {}
                }
                ::std::result::Result::Ok(())
            }

            fn get_member(&self, member_index: usize) -> ::rowforge::Value {
                match member_index {
                    #(#get_arms)*
                    _ => ::rowforge::Value::Null,
                }
            }

            #attach_fn
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand_str(input: DeriveInput) -> String {
        expand(input).unwrap().to_string()
    }

    #[test]
    fn describes_columns_and_key() {
        let out = expand_str(parse_quote! {
            #[orm(table = "posts", auto_increment)]
            struct Post {
                id: i64,
                #[orm(column = "Headline")]
                title: String,
                #[orm(ignore)]
                scratch: u8,
            }
        });
        assert!(out.contains("table (\"posts\")"));
        assert!(out.contains("primary_key (& [\"id\"])"));
        assert!(out.contains("named (\"Headline\")"));
        assert!(!out.contains("scratch"));
    }

    #[test]
    fn marked_id_uses_column_name() {
        let out = expand_str(parse_quote! {
            struct Account {
                #[orm(id, column = "account_no")]
                number: i64,
            }
        });
        assert!(out.contains("primary_key (& [\"account_no\"])"));
    }

    #[test]
    fn relations_get_attach_arms() {
        let out = expand_str(parse_quote! {
            struct Author {
                id: i64,
                #[orm(relation)]
                books: Vec<Book>,
                #[orm(relation)]
                agent: Option<Box<Agent>>,
            }
        });
        assert!(out.contains("RelationDescriptor :: many :: < Book >"));
        assert!(out.contains("RelationDescriptor :: one :: < Agent >"));
        assert!(out.contains("fn attach"));
    }

    #[test]
    fn no_default_is_not_constructible() {
        let out = expand_str(parse_quote! {
            #[orm(no_default)]
            struct Handle {
                fd: i32,
            }
        });
        assert!(out.contains("constructible (false)"));
        assert!(out.contains(":: std :: option :: Option :: None"));
    }

    #[test]
    fn rejects_tuple_structs() {
        let input: DeriveInput = parse_quote! {
            struct Pair(i32, i32);
        };
        assert!(expand(input).is_err());
    }

    #[test]
    fn rejects_plain_relation_fields() {
        let input: DeriveInput = parse_quote! {
            struct Author {
                #[orm(relation)]
                book: Book,
            }
        };
        assert!(expand(input).is_err());
    }

    #[test]
    fn rejects_conflicting_keys() {
        let input: DeriveInput = parse_quote! {
            #[orm(primary_key = "a")]
            struct Pair {
                #[orm(id)]
                b: i32,
            }
        };
        assert!(expand(input).is_err());
    }
}

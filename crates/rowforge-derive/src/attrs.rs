//! Parsing of `#[orm(...)]` attributes.

use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, ExprLit, Lit, Meta, Result};

/// Struct-level `#[orm(...)]` settings.
#[derive(Default)]
pub(crate) struct StructAttrs {
    pub table: Option<String>,
    pub primary_key: Vec<String>,
    pub auto_increment: bool,
    pub sequence: Option<String>,
    pub no_default: bool,
}

/// Field-level `#[orm(...)]` settings.
#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub id: bool,
    pub column: Option<String>,
    pub result: bool,
    pub no_select: bool,
    pub ignore: bool,
    pub relation: bool,
    pub insert: Option<String>,
    pub update: Option<String>,
}

/// Variant-level `#[orm(rename = "...")]`.
#[derive(Default)]
pub(crate) struct VariantAttrs {
    pub rename: Option<String>,
}

fn orm_metas(attrs: &[Attribute]) -> Result<Vec<Meta>> {
    let mut metas = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let nested = attr.parse_args_with(Punctuated::<Meta, syn::Token![,]>::parse_terminated)?;
        metas.extend(nested);
    }
    Ok(metas)
}

fn string_value(meta: &Meta) -> Result<String> {
    if let Meta::NameValue(nv) = meta {
        if let Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) = &nv.value
        {
            return Ok(s.value());
        }
    }
    Err(syn::Error::new_spanned(meta, "expected `name = \"...\"`"))
}

fn flag(meta: &Meta) -> Result<bool> {
    match meta {
        Meta::Path(_) => Ok(true),
        _ => Err(syn::Error::new_spanned(meta, "expected a bare flag")),
    }
}

fn key(meta: &Meta) -> String {
    meta.path()
        .get_ident()
        .map(|ident| ident.to_string())
        .unwrap_or_default()
}

impl StructAttrs {
    pub(crate) fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();
        for meta in orm_metas(attrs)? {
            match key(&meta).as_str() {
                "table" => out.table = Some(string_value(&meta)?),
                "primary_key" => {
                    out.primary_key = string_value(&meta)?
                        .split(',')
                        .map(|part| part.trim().to_string())
                        .filter(|part| !part.is_empty())
                        .collect();
                }
                "auto_increment" => out.auto_increment = flag(&meta)?,
                "sequence" => out.sequence = Some(string_value(&meta)?),
                "no_default" => out.no_default = flag(&meta)?,
                _ => return Err(syn::Error::new_spanned(meta, "unknown orm attribute")),
            }
        }
        Ok(out)
    }
}

impl FieldAttrs {
    pub(crate) fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();
        for meta in orm_metas(attrs)? {
            match key(&meta).as_str() {
                "id" => out.id = flag(&meta)?,
                "column" => out.column = Some(string_value(&meta)?),
                "result" => out.result = flag(&meta)?,
                "no_select" => out.no_select = flag(&meta)?,
                "ignore" => out.ignore = flag(&meta)?,
                "relation" => out.relation = flag(&meta)?,
                "insert" => out.insert = Some(string_value(&meta)?),
                "update" => out.update = Some(string_value(&meta)?),
                _ => return Err(syn::Error::new_spanned(meta, "unknown orm attribute")),
            }
        }
        Ok(out)
    }
}

impl VariantAttrs {
    pub(crate) fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();
        for meta in orm_metas(attrs)? {
            match key(&meta).as_str() {
                "rename" => out.rename = Some(string_value(&meta)?),
                _ => return Err(syn::Error::new_spanned(meta, "unknown orm attribute")),
            }
        }
        Ok(out)
    }
}

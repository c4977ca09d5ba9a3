//! Row factories and their cache.
//!
//! A row factory is compiled once per (row shape, schema, column range) and
//! reused for every row with that shape:
//!
//! ```ignore
//! use rowforge::{factory, row, schema_registry, default_mapper};
//!
//! let shape = row::shape(["id", "name"]);
//! let schema = schema_registry().schema_for::<User>(&default_mapper());
//! let factory = factory::get_row_factory::<User>(&shape, &schema, 0, shape.len())?;
//! let user = factory.build(&current_row)?;
//! ```

mod cache;
mod combine;
mod multi;
mod single;

#[cfg(test)]
mod tests;

pub use cache::{FactoryCache, FactoryKey, factory_cache, flush_factory_cache};
pub use combine::{AutoLink, Combiner, FnCombiner, OneToMany, Relate, Step, combine, relate};
pub use multi::{Link, LinkPlan, MultiMapped, MultiRowFactory, split_columns};
pub use single::RowFactory;

use crate::error::OrmResult;
use crate::mapped::Mapped;
use crate::row::RowShape;
use crate::schema::TypeSchema;
use std::any::TypeId;
use std::sync::Arc;

/// The statement a factory is compiled for; part of every cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactoryScope {
    pub connection: Arc<str>,
    pub sql: Arc<str>,
}

impl FactoryScope {
    pub fn new(connection: impl Into<Arc<str>>, sql: impl Into<Arc<str>>) -> Self {
        Self {
            connection: connection.into(),
            sql: sql.into(),
        }
    }
}

impl Default for FactoryScope {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// Get or compile the single-type factory for `shape[offset..offset + count]`.
pub fn get_row_factory<T: Mapped>(
    shape: &RowShape,
    schema: &Arc<TypeSchema>,
    offset: usize,
    count: usize,
) -> OrmResult<Arc<RowFactory<T>>> {
    get_row_factory_in(&FactoryScope::default(), shape, schema, offset, count)
}

/// [`get_row_factory`] for a specific statement scope.
pub fn get_row_factory_in<T: Mapped>(
    scope: &FactoryScope,
    shape: &RowShape,
    schema: &Arc<TypeSchema>,
    offset: usize,
    count: usize,
) -> OrmResult<Arc<RowFactory<T>>> {
    let key = FactoryKey {
        connection: scope.connection.clone(),
        sql: scope.sql.clone(),
        shape: shape.clone(),
        types: vec![TypeId::of::<T>()],
        schemas: vec![schema.id()],
        offset,
        count,
    };
    factory_cache().get_or_compile(key, || {
        RowFactory::compile(shape, schema, offset, count)
    })
}

/// Get or compile the multi-type factory for `shape` and `schemas`.
pub fn get_multi_row_factory<T: MultiMapped>(
    shape: &RowShape,
    schemas: &[Arc<TypeSchema>],
) -> OrmResult<Arc<MultiRowFactory<T>>> {
    get_multi_row_factory_in(&FactoryScope::default(), shape, schemas)
}

/// [`get_multi_row_factory`] for a specific statement scope.
pub fn get_multi_row_factory_in<T: MultiMapped>(
    scope: &FactoryScope,
    shape: &RowShape,
    schemas: &[Arc<TypeSchema>],
) -> OrmResult<Arc<MultiRowFactory<T>>> {
    let key = FactoryKey {
        connection: scope.connection.clone(),
        sql: scope.sql.clone(),
        shape: shape.clone(),
        types: T::type_ids(),
        schemas: schemas.iter().map(|s| s.id()).collect(),
        offset: 0,
        count: shape.len(),
    };
    factory_cache().get_or_compile(key, || MultiRowFactory::compile(shape, schemas))
}

//! Lazy materialization over a [`RowCursor`].
//!
//! Factories are resolved before the first row is read, so compile-time errors
//! surface before any row is consumed. A per-row error is yielded once and ends
//! the iteration; rows already yielded stay valid.

use crate::error::OrmResult;
use crate::factory::{
    Combiner, FactoryScope, MultiMapped, MultiRowFactory, RowFactory, Step,
    get_multi_row_factory_in, get_row_factory_in,
};
use crate::mapped::Mapped;
use crate::row::RowCursor;
use crate::schema::{Mapper, schema_registry};
use std::sync::Arc;

/// Yields one `T` per row.
pub struct Materialize<C, T> {
    cursor: C,
    factory: Arc<RowFactory<T>>,
    done: bool,
}

/// Materialize every row of `cursor` as `T`.
pub fn materialize<T: Mapped, C: RowCursor>(
    cursor: C,
    mapper: &Arc<dyn Mapper>,
    scope: &FactoryScope,
) -> OrmResult<Materialize<C, T>> {
    let schema = schema_registry().schema_for::<T>(mapper);
    let shape = cursor.column_names().clone();
    let factory = get_row_factory_in::<T>(scope, &shape, &schema, 0, shape.len())?;
    Ok(Materialize {
        cursor,
        factory,
        done: false,
    })
}

impl<C: RowCursor, T: Mapped> Iterator for Materialize<C, T> {
    type Item = OrmResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.cursor.advance() {
            Ok(true) => self.factory.build(&self.cursor),
            Ok(false) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e),
        };
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

/// Yields combined results of joined rows.
pub struct MaterializeMulti<C, T: MultiMapped, K> {
    cursor: C,
    factory: Arc<MultiRowFactory<T>>,
    combiner: K,
    done: bool,
}

/// Materialize joined rows of `cursor` as `T` tuples passed through `combiner`.
pub fn materialize_multi<T, C, K>(
    cursor: C,
    mapper: &Arc<dyn Mapper>,
    scope: &FactoryScope,
    mut combiner: K,
) -> OrmResult<MaterializeMulti<C, T, K>>
where
    T: MultiMapped,
    C: RowCursor,
    K: Combiner<T>,
{
    let schemas = T::schemas(schema_registry(), mapper);
    let shape = cursor.column_names().clone();
    let factory = get_multi_row_factory_in::<T>(scope, &shape, &schemas)?;
    combiner.prepare(factory.link_plan());
    Ok(MaterializeMulti {
        cursor,
        factory,
        combiner,
        done: false,
    })
}

impl<C, T, K> Iterator for MaterializeMulti<C, T, K>
where
    C: RowCursor,
    T: MultiMapped,
    K: Combiner<T>,
{
    type Item = OrmResult<K::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let step = match self.cursor.advance() {
                Ok(true) => self
                    .factory
                    .build(&self.cursor)
                    .and_then(|item| self.combiner.combine(item)),
                Ok(false) => {
                    self.done = true;
                    return self.combiner.finish().transpose();
                }
                Err(e) => Err(e),
            };
            match step {
                Ok(Step::Emit(result)) => return Some(Ok(result)),
                Ok(Step::Pending) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

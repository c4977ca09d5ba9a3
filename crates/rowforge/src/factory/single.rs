use crate::coerce::coerce;
use crate::error::{OrmError, OrmResult};
use crate::mapped::Mapped;
use crate::row::RowAccess;
use crate::schema::{ColumnDescriptor, TypeSchema};
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

struct Binding {
    row_index: usize,
    column: ColumnDescriptor,
}

/// A compiled row-to-instance function for one row shape and schema.
///
/// Holds only the columns that matched a descriptor, in row order; building an
/// instance is a straight walk over them.
pub struct RowFactory<T> {
    bindings: Vec<Binding>,
    type_name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Mapped> RowFactory<T> {
    /// Bind `shape[offset..offset + count]` against `schema`.
    ///
    /// Columns are matched by case-insensitive name; unmatched columns are
    /// ignored. Fails with [`OrmError::UnconstructibleType`] when the schema
    /// cannot produce instances.
    pub fn compile(
        shape: &[String],
        schema: &TypeSchema,
        offset: usize,
        count: usize,
    ) -> OrmResult<Self> {
        if schema.type_id() != TypeId::of::<T>() {
            return Err(OrmError::validation(format!(
                "schema for '{}' used to build '{}'",
                schema.type_name(),
                std::any::type_name::<T>()
            )));
        }
        if !schema.is_constructible() {
            return Err(OrmError::UnconstructibleType {
                type_name: schema.type_name().to_string(),
            });
        }

        let bindings: Vec<Binding> = shape
            .iter()
            .enumerate()
            .skip(offset)
            .take(count)
            .filter_map(|(row_index, name)| {
                schema.column(name).map(|column| Binding {
                    row_index,
                    column: column.clone(),
                })
            })
            .collect();

        tracing::trace!(
            target: "rowforge.factory",
            type_name = schema.type_name(),
            offset,
            count,
            bound = bindings.len(),
            "compiled row factory"
        );

        Ok(Self {
            bindings,
            type_name: schema.type_name(),
            _marker: PhantomData,
        })
    }

    /// Build one instance from the current row.
    pub fn build<R: RowAccess + ?Sized>(&self, row: &R) -> OrmResult<T> {
        let mut instance = T::construct().ok_or_else(|| OrmError::UnconstructibleType {
            type_name: self.type_name.to_string(),
        })?;

        for binding in &self.bindings {
            let column = &binding.column;
            let raw = row.get_value(binding.row_index)?;
            let value = match &column.from_storage {
                Some(convert) => convert(raw),
                None => coerce(raw, &column.kind, column.nullable),
            }
            .map_err(|e| e.with_column(&column.name))?;
            instance
                .set_member(column.member_index, value)
                .map_err(|e| e.with_column(&column.name))?;
        }

        Ok(instance)
    }

    /// Row indices this factory reads, in order.
    pub fn bound_columns(&self) -> impl Iterator<Item = (usize, &str)> {
        self.bindings
            .iter()
            .map(|b| (b.row_index, b.column.member))
    }
}

impl<T> fmt::Debug for RowFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowFactory")
            .field("type_name", &self.type_name)
            .field("bound", &self.bindings.len())
            .finish()
    }
}

use super::single::RowFactory;
use crate::error::{OrmError, OrmResult};
use crate::mapped::{ErasedMapped, Mapped};
use crate::row::RowAccess;
use crate::schema::{Mapper, SchemaRegistry, TypeSchema};
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// A tuple of 2 to 5 [`Mapped`] types read from one joined row.
pub trait MultiMapped: Sized + Send + 'static {
    /// The first type; automatic linking yields instances of it.
    type Root: Mapped;
    /// One compiled factory per tuple element.
    type Factories: Send + Sync + 'static;

    const ARITY: usize;

    fn type_ids() -> Vec<TypeId>;

    fn schemas(registry: &SchemaRegistry, mapper: &Arc<dyn Mapper>) -> Vec<Arc<TypeSchema>>;

    fn compile_factories(
        shape: &[String],
        schemas: &[Arc<TypeSchema>],
        spans: &[Range<usize>],
    ) -> OrmResult<Self::Factories>;

    fn build<R: RowAccess + ?Sized>(factories: &Self::Factories, row: &R) -> OrmResult<Self>;

    fn into_erased(self) -> Vec<Box<dyn ErasedMapped>>;
}

macro_rules! impl_multi_mapped {
    ($first:ident : $fidx:tt $(, $name:ident : $idx:tt)+; $arity:expr) => {
        impl<$first: Mapped $(, $name: Mapped)+> MultiMapped for ($first, $($name,)+) {
            type Root = $first;
            type Factories = (RowFactory<$first>, $(RowFactory<$name>,)+);

            const ARITY: usize = $arity;

            fn type_ids() -> Vec<TypeId> {
                vec![TypeId::of::<$first>() $(, TypeId::of::<$name>())+]
            }

            fn schemas(
                registry: &SchemaRegistry,
                mapper: &Arc<dyn Mapper>,
            ) -> Vec<Arc<TypeSchema>> {
                vec![
                    registry.schema_for::<$first>(mapper)
                    $(, registry.schema_for::<$name>(mapper))+
                ]
            }

            fn compile_factories(
                shape: &[String],
                schemas: &[Arc<TypeSchema>],
                spans: &[Range<usize>],
            ) -> OrmResult<Self::Factories> {
                Ok((
                    RowFactory::<$first>::compile(
                        shape,
                        &schemas[$fidx],
                        spans[$fidx].start,
                        spans[$fidx].len(),
                    )?,
                    $(
                        RowFactory::<$name>::compile(
                            shape,
                            &schemas[$idx],
                            spans[$idx].start,
                            spans[$idx].len(),
                        )?,
                    )+
                ))
            }

            fn build<R: RowAccess + ?Sized>(
                factories: &Self::Factories,
                row: &R,
            ) -> OrmResult<Self> {
                Ok((factories.$fidx.build(row)?, $(factories.$idx.build(row)?,)+))
            }

            fn into_erased(self) -> Vec<Box<dyn ErasedMapped>> {
                vec![
                    Box::new(self.$fidx) as Box<dyn ErasedMapped>
                    $(, Box::new(self.$idx) as Box<dyn ErasedMapped>)+
                ]
            }
        }
    };
}

impl_multi_mapped!(A: 0, B: 1; 2);
impl_multi_mapped!(A: 0, B: 1, C: 2; 3);
impl_multi_mapped!(A: 0, B: 1, C: 2, D: 3; 4);
impl_multi_mapped!(A: 0, B: 1, C: 2, D: 3, E: 4; 5);

/// Split `shape` into one contiguous column range per schema.
///
/// Every group but the last takes columns while they belong to its schema, are
/// not repeated within the group, and the schema's column count is not yet
/// reached. The last group takes whatever remains.
pub fn split_columns(shape: &[String], schemas: &[Arc<TypeSchema>]) -> Vec<Range<usize>> {
    let mut spans = Vec::with_capacity(schemas.len());
    let mut pos = 0;

    for (i, schema) in schemas.iter().enumerate() {
        let start = pos;
        if i + 1 == schemas.len() {
            pos = shape.len();
        } else {
            let mut seen = HashSet::new();
            while pos < shape.len() && pos - start < schema.column_count() {
                let name = shape[pos].to_ascii_lowercase();
                if !schema.has_column(&name) || !seen.insert(name) {
                    break;
                }
                pos += 1;
            }
        }
        spans.push(start..pos);
    }

    spans
}

/// Where one tuple element attaches during automatic linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Tuple index of the instance receiving the child.
    pub parent: usize,
    pub relation_index: usize,
}

/// Inferred parent links for each tuple element after the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    links: Vec<Option<Link>>,
}

impl LinkPlan {
    /// For each element `i > 0`, search elements `i - 1` down to `0` for a relation
    /// member targeting element `i`'s type. Elements with no such member get no
    /// link and are dropped when the plan is applied.
    pub fn infer(schemas: &[Arc<TypeSchema>]) -> Self {
        let mut links = vec![None; schemas.len()];
        for i in 1..schemas.len() {
            let target = schemas[i].type_id();
            links[i] = (0..i).rev().find_map(|j| {
                schemas[j].relation_to(target).map(|relation| Link {
                    parent: j,
                    relation_index: relation.relation_index,
                })
            });
        }
        Self { links }
    }

    pub fn link(&self, index: usize) -> Option<Link> {
        self.links.get(index).copied().flatten()
    }

    /// Attach every linked element to its parent, last element first, and return
    /// the root.
    pub fn apply<T: MultiMapped>(&self, item: T) -> OrmResult<T::Root> {
        let mut slots: Vec<Option<Box<dyn ErasedMapped>>> =
            item.into_erased().into_iter().map(Some).collect();

        for i in (1..slots.len()).rev() {
            let Some(link) = self.link(i) else {
                continue;
            };
            let Some(child) = slots[i].take() else {
                continue;
            };
            if let Some(parent) = slots[link.parent].as_mut() {
                if !parent.attach_erased(link.relation_index, child.into_any()) {
                    tracing::trace!(
                        target: "rowforge.factory",
                        child = i,
                        parent = link.parent,
                        "relation rejected child instance"
                    );
                }
            }
        }

        slots
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| OrmError::Other("multi-row item has no root".into()))?
            .into_any()
            .downcast::<T::Root>()
            .map(|root| *root)
            .map_err(|_| OrmError::Other("multi-row root has an unexpected type".into()))
    }
}

/// A compiled factory for one joined row shape and 2 to 5 schemas.
pub struct MultiRowFactory<T: MultiMapped> {
    spans: Vec<Range<usize>>,
    factories: T::Factories,
    plan: LinkPlan,
}

impl<T: MultiMapped> MultiRowFactory<T> {
    pub fn compile(shape: &[String], schemas: &[Arc<TypeSchema>]) -> OrmResult<Self> {
        if schemas.len() != T::ARITY {
            return Err(OrmError::validation(format!(
                "expected {} schemas, got {}",
                T::ARITY,
                schemas.len()
            )));
        }
        for (schema, type_id) in schemas.iter().zip(T::type_ids()) {
            if schema.type_id() != type_id {
                return Err(OrmError::validation(format!(
                    "schema for '{}' does not match its tuple position",
                    schema.type_name()
                )));
            }
        }

        let spans = split_columns(shape, schemas);
        let factories = T::compile_factories(shape, schemas, &spans)?;
        let plan = LinkPlan::infer(schemas);

        tracing::trace!(
            target: "rowforge.factory",
            arity = T::ARITY,
            spans = ?spans,
            "compiled multi-row factory"
        );

        Ok(Self {
            spans,
            factories,
            plan,
        })
    }

    /// Build the tuple for the current row.
    pub fn build<R: RowAccess + ?Sized>(&self, row: &R) -> OrmResult<T> {
        T::build(&self.factories, row)
    }

    /// Build the tuple and stitch it into its root.
    pub fn build_linked<R: RowAccess + ?Sized>(&self, row: &R) -> OrmResult<T::Root> {
        self.plan.apply(self.build(row)?)
    }

    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    pub fn link_plan(&self) -> &LinkPlan {
        &self.plan
    }
}

impl<T: MultiMapped> fmt::Debug for MultiRowFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiRowFactory")
            .field("spans", &self.spans)
            .field("plan", &self.plan)
            .finish()
    }
}

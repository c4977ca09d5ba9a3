//! The [`Mapped`] trait: what a row factory needs from a type.

use crate::arg::NamedArgs;
use crate::error::OrmResult;
use crate::schema::TypeDescription;
use crate::value::Value;
use std::any::Any;

/// A type that can be materialized from rows and written back.
///
/// Usually derived with `#[derive(Mapped)]`:
///
/// ```ignore
/// #[derive(Debug, Default, Mapped)]
/// #[orm(table = "posts", primary_key = "id", auto_increment)]
/// struct Post {
///     id: i64,
///     title: String,
///     #[orm(column = "author_id")]
///     author: i64,
///     #[orm(relation)]
///     comments: Vec<Comment>,
/// }
/// ```
pub trait Mapped: Send + 'static {
    /// Static description of columns, table and relations.
    fn describe() -> TypeDescription;

    /// Create a blank instance, or `None` if the type cannot be built from rows.
    fn construct() -> Option<Self>
    where
        Self: Sized;

    /// Store a coerced value in the member with `member_index`.
    fn set_member(&mut self, member_index: usize, value: Value) -> OrmResult<()>;

    /// Read the member with `member_index`.
    fn get_member(&self, member_index: usize) -> Value;

    /// Attach a related instance to relation `relation_index`.
    ///
    /// Returns `false` if the child is not of the relation's target type.
    fn attach(&mut self, relation_index: usize, child: Box<dyn Any + Send>) -> bool {
        let _ = (relation_index, child);
        false
    }
}

/// Object-safe view of a [`Mapped`] value, used when stitching related instances.
pub trait ErasedMapped: Send {
    fn attach_erased(&mut self, relation_index: usize, child: Box<dyn Any + Send>) -> bool;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Mapped> ErasedMapped for T {
    fn attach_erased(&mut self, relation_index: usize, child: Box<dyn Any + Send>) -> bool {
        self.attach(relation_index, child)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Expose every member of `value` as a named argument, keyed by member name.
pub fn to_named_args<T: Mapped>(value: &T) -> NamedArgs {
    let description = T::describe();
    let mut args = NamedArgs::new();
    for column in &description.columns {
        args.insert(column.member, value.get_member(column.member_index));
    }
    args
}

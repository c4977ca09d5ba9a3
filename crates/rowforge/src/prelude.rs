//! Convenient imports for typical `rowforge` usage.
//!
//! ```ignore
//! use rowforge::prelude::*;
//! ```

pub use crate::{
    Arg, Database, GenericClient, Mapped, NamedArgs, OrmError, OrmResult, Page, Sql, Value, args,
    named, sql,
};

pub use crate::{AutoLink, OneToMany, combine, relate};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};

#[cfg(feature = "derive")]
pub use crate::MappedEnum;

//! # rowforge
//!
//! SQL templating and cached row materialization for Postgres.
//!
//! ## Features
//!
//! - **Templates**: `@0` positional and `@name` named placeholders, sequence
//!   expansion for `IN (...)`, clause-aware fragment joining
//! - **Materialization**: rows become typed values through factories compiled
//!   once per result shape and cached process-wide
//! - **Joins**: one row split into a tuple of types, linked automatically through
//!   relation members or combined with an explicit combiner
//! - **Dialects**: the `@N` form is rendered for the target database at the
//!   last moment
//!
//! ## Templates
//!
//! ```ignore
//! use rowforge::{Sql, args, named};
//!
//! let mut sql = Sql::new();
//! sql.select(&["id", "name"])
//!     .from_(&["users"])
//!     .where_("age > @0", args![18])
//!     .where_("city = @city", args![named! { city: "Oslo" }]);
//! // SELECT id, name
//! // FROM users
//! // WHERE (age > @0)
//! // AND (city = @1)
//! let compiled = sql.compile()?;
//! ```
//!
//! ## Fetching
//!
//! ```ignore
//! use rowforge::{Database, Mapped, args};
//!
//! #[derive(Debug, Default, Mapped)]
//! #[orm(table = "users", primary_key = "id", auto_increment)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let db = Database::new(client);
//! let users: Vec<User> = db.fetch(("WHERE name LIKE @0", args!["a%"])).await?;
//! ```

extern crate self as rowforge;

pub mod arg;
pub mod client;
pub mod coerce;
pub mod config;
pub mod database;
pub mod dialect;
pub mod error;
pub mod factory;
pub mod fetch;
pub mod mapped;
pub mod paging;
pub mod pg;
pub mod prelude;
pub mod row;
pub mod schema;
pub mod sql;
pub mod value;
pub mod write;

pub use arg::{Arg, NamedArgs};
pub use client::{GenericClient, RowStream, StreamingClient};
pub use config::{DatabaseConfig, SqlLogging};
pub use database::{Database, MappedStream};
pub use dialect::{AnsiDialect, Dialect, PostgresDialect};
pub use error::{OrmError, OrmResult};
pub use factory::{
    AutoLink, Combiner, FactoryScope, MultiMapped, MultiRowFactory, OneToMany, RowFactory, Step,
    combine, flush_factory_cache, get_multi_row_factory, get_row_factory, relate,
};
pub use fetch::{materialize, materialize_multi};
pub use mapped::{Mapped, to_named_args};
pub use paging::Page;
pub use row::{Row, RowAccess, RowCursor, RowShape, Rows};
pub use schema::{
    ColumnDescriptor, ConventionMapper, DefaultMapper, EnumInfo, Mapper, NameCase,
    RelationDescriptor, RelationKind, TableInfo, TypeDescription, TypeSchema, ValueKind,
    default_mapper, schema_registry,
};
pub use sql::{CompiledSql, Sql, compile_sql, sql};
pub use value::{ColumnType, FromValue, ToValue, Value};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config};

#[cfg(feature = "derive")]
pub use rowforge_derive::{Mapped, MappedEnum};

//! The [`Database`] facade: templates in, typed results out.
//!
//! Every statement goes through the same pipeline: compile the template to
//! `@N` form, render it for the dialect, execute it on the client, and
//! materialize rows through cached factories.
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
//!
//! // "WHERE ..." is prefixed with SELECT "id", "name" FROM "users"
//! let adults: Vec<User> = db.fetch(("WHERE age >= @0", args![18])).await?;
//!
//! let mut user = User { name: "alice".into(), ..Default::default() };
//! db.insert(&mut user).await?;
//! ```

mod execute;
mod stream;


pub use stream::MappedStream;

use crate::client::{GenericClient, StreamingClient};
use crate::coerce::coerce;
use crate::config::DatabaseConfig;
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::{OrmError, OrmResult};
use crate::factory::{AutoLink, Combiner, FactoryScope, MultiMapped};
use crate::fetch::{materialize, materialize_multi};
use crate::mapped::Mapped;
use crate::paging::{Page, SqlParts};
use crate::pg::{PgRows, decode_column};
use crate::schema::{Mapper, TypeSchema, default_mapper, schema_registry};
use crate::sql::{CompiledSql, Sql};
use crate::value::{FromValue, Value};
use crate::write;
use std::sync::Arc;
use tokio_postgres::Row;

/// Templated queries and row materialization over a [`GenericClient`].
pub struct Database<C> {
    client: C,
    dialect: Arc<dyn Dialect>,
    mapper: Arc<dyn Mapper>,
    config: DatabaseConfig,
}

impl<C: GenericClient> Database<C> {
    /// Postgres dialect, default mapper, default config.
    pub fn new(client: C) -> Self {
        Self {
            client,
            dialect: Arc::new(PostgresDialect),
            mapper: default_mapper(),
            config: DatabaseConfig::default(),
        }
    }

    pub fn with_dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Arc::new(dialect);
        self
    }

    /// Map types through `mapper`. Schemas are registered per mapper, so types
    /// seen through different mappers do not share schemas or factories.
    pub fn with_mapper(mut self, mapper: Arc<dyn Mapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_config(mut self, config: DatabaseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn mapper(&self) -> &Arc<dyn Mapper> {
        &self.mapper
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The schema of `T` as seen through this database's mapper.
    pub fn schema<T: Mapped>(&self) -> Arc<TypeSchema> {
        schema_registry().schema_for::<T>(&self.mapper)
    }

    fn scope(&self, sql: &str) -> FactoryScope {
        FactoryScope::new(self.config.connection_label.as_str(), sql)
    }

    /// Compile `query` and, if enabled, complete it into a `SELECT` for `T`.
    pub fn prepare_select<T: Mapped>(&self, query: impl Into<Sql>) -> OrmResult<CompiledSql> {
        let compiled = query.into().compile()?;
        if !self.config.auto_select {
            return Ok(compiled);
        }
        let (sql, args) = compiled.into_parts();
        let sql = execute::auto_select(self.dialect.as_ref(), &self.schema::<T>(), &sql);
        Ok(CompiledSql::from_parts(sql, args))
    }

    // ==================== Reads ====================

    /// All rows of `query` as `T`.
    pub async fn fetch<T: Mapped>(&self, query: impl Into<Sql>) -> OrmResult<Vec<T>> {
        let compiled = self.prepare_select::<T>(query)?;
        let rows = self.run_query(compiled.sql(), compiled.args()).await?;
        self.materialize_rows(compiled.sql(), rows)
    }

    fn materialize_rows<T: Mapped>(&self, sql: &str, rows: Vec<Row>) -> OrmResult<Vec<T>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let scope = self.scope(sql);
        materialize::<T, _>(PgRows::new(rows), &self.mapper, &scope)?.collect()
    }

    /// The first row of `query`. Zero rows is [`OrmError::NotFound`].
    pub async fn first<T: Mapped>(&self, query: impl Into<Sql>) -> OrmResult<T> {
        self.first_opt(query)
            .await?
            .ok_or_else(|| OrmError::not_found("Expected one row, got none"))
    }

    /// The first row of `query`, if any.
    pub async fn first_opt<T: Mapped>(&self, query: impl Into<Sql>) -> OrmResult<Option<T>> {
        Ok(self.fetch(query).await?.into_iter().next())
    }

    /// Exactly one row of `query`.
    pub async fn single<T: Mapped>(&self, query: impl Into<Sql>) -> OrmResult<T> {
        let mut items = self.fetch::<T>(query).await?;
        match items.len() {
            0 => Err(OrmError::not_found("Expected 1 row, got 0")),
            1 => Ok(items.remove(0)),
            got => Err(OrmError::too_many_rows(1, got)),
        }
    }

    /// One page of `query`. Pages are numbered from 1.
    pub async fn page<T: Mapped>(
        &self,
        page: i64,
        items_per_page: i64,
        query: impl Into<Sql>,
    ) -> OrmResult<Page<T>> {
        if page < 1 || items_per_page < 1 {
            return Err(OrmError::validation(
                "page and items_per_page must be at least 1",
            ));
        }

        let compiled = self.prepare_select::<T>(query)?;
        let parts = SqlParts::split(compiled.sql())?;

        // The count query may drop references (e.g. in the select list);
        // recompiling keeps only the arguments it still uses.
        let count = execute::recompile(&parts.count_sql(), compiled.args())?;
        let total_items = self.scalar_compiled::<i64>(&count).await?;

        let mut args = compiled.args().to_vec();
        let skip = (page - 1) * items_per_page;
        let paged = self
            .dialect
            .build_paged_query(skip, items_per_page, &parts, &mut args);
        let rows = self.run_query(&paged, &args).await?;
        let items = self.materialize_rows(&paged, rows)?;

        Ok(Page::new(page, items_per_page, total_items, items))
    }

    /// Joined rows of `query`, each split into a tuple and passed through `combiner`.
    pub async fn fetch_multi<T, K>(
        &self,
        query: impl Into<Sql>,
        combiner: K,
    ) -> OrmResult<Vec<K::Output>>
    where
        T: MultiMapped,
        K: Combiner<T>,
    {
        let compiled = query.into().compile()?;
        let rows = self.run_query(compiled.sql(), compiled.args()).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let scope = self.scope(compiled.sql());
        materialize_multi::<T, _, _>(PgRows::new(rows), &self.mapper, &scope, combiner)?.collect()
    }

    /// Joined rows of `query` with later tuple elements attached to earlier ones
    /// through their relation members.
    pub async fn fetch_linked<T: MultiMapped>(
        &self,
        query: impl Into<Sql>,
    ) -> OrmResult<Vec<T::Root>> {
        self.fetch_multi::<T, _>(query, AutoLink::<T>::new()).await
    }

    /// The first column of the first row of `query`. No rows reads as NULL.
    pub async fn scalar<V: FromValue>(&self, query: impl Into<Sql>) -> OrmResult<V> {
        let compiled = query.into().compile()?;
        self.scalar_compiled(&compiled).await
    }

    async fn scalar_compiled<V: FromValue>(&self, compiled: &CompiledSql) -> OrmResult<V> {
        let rows = self.run_query(compiled.sql(), compiled.args()).await?;
        let value = match rows.first() {
            Some(row) => decode_column(row, 0)?,
            None => Value::Null,
        };
        V::from_value(value)
    }

    /// Whether a row of `T` with primary key `key` exists.
    pub async fn exists<T: Mapped>(&self, key: impl Into<crate::Arg>) -> OrmResult<bool> {
        let compiled = write::exists(self.dialect.as_ref(), &self.schema::<T>(), key)?;
        Ok(self.scalar_compiled::<i64>(&compiled).await? > 0)
    }

    // ==================== Writes ====================

    /// Execute `query` and return the number of affected rows.
    pub async fn execute(&self, query: impl Into<Sql>) -> OrmResult<u64> {
        let compiled = query.into().compile()?;
        self.run_execute(compiled.sql(), compiled.args()).await
    }

    /// Insert `value`. A database-generated key is read back into `value`.
    pub async fn insert<T: Mapped>(&self, value: &mut T) -> OrmResult<u64> {
        let schema = self.schema::<T>();
        let (compiled, returning) = write::insert(self.dialect.as_ref(), &schema, value)?;

        match write::generated_key(&schema) {
            Some(key) if returning => {
                let rows = self.run_query(compiled.sql(), compiled.args()).await?;
                let row = rows
                    .first()
                    .ok_or_else(|| OrmError::not_found("INSERT returned no key"))?;
                let id = coerce(decode_column(row, 0)?, &key.kind, key.nullable)
                    .map_err(|e| e.with_column(&key.name))?;
                value.set_member(key.member_index, id)?;
                Ok(rows.len() as u64)
            }
            _ => self.run_execute(compiled.sql(), compiled.args()).await,
        }
    }

    /// Update the row of `value` by primary key.
    pub async fn update<T: Mapped>(&self, value: &T) -> OrmResult<u64> {
        let compiled = write::update(self.dialect.as_ref(), &self.schema::<T>(), value)?;
        self.run_execute(compiled.sql(), compiled.args()).await
    }

    /// Delete the row of `value` by primary key.
    pub async fn delete<T: Mapped>(&self, value: &T) -> OrmResult<u64> {
        let compiled = write::delete(self.dialect.as_ref(), &self.schema::<T>(), value)?;
        self.run_execute(compiled.sql(), compiled.args()).await
    }
}

impl<C: StreamingClient> Database<C> {
    /// Rows of `query` as `T`, decoded as they arrive.
    ///
    /// The factory is resolved from the first row's columns.
    pub async fn stream<T: Mapped>(&self, query: impl Into<Sql>) -> OrmResult<MappedStream<T>> {
        let compiled = self.prepare_select::<T>(query)?;
        let rendered = self.render(compiled.sql(), compiled.args().len());
        let params = crate::pg::params(compiled.args());
        let rows = self
            .with_timeout(self.client.query_stream(&rendered, &params))
            .await?;
        Ok(MappedStream::new(
            rows,
            self.mapper.clone(),
            self.scope(compiled.sql()),
        ))
    }
}

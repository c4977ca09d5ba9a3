//! Schema registry and mappers.

use super::{ColumnDescriptor, Converter, TableInfo, TypeSchema};
use crate::error::OrmResult;
use crate::mapped::Mapped;
use crate::value::Value;
use heck::{ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Adjusts a type's self-description before its schema is built.
///
/// A mapper is part of the schema identity: the same type registered through two
/// mappers yields two schemas.
pub trait Mapper: Send + Sync + 'static {
    /// Adjust table metadata.
    fn table_info(&self, type_name: &str, table: &mut TableInfo) {
        let _ = (type_name, table);
    }

    /// Adjust one column.
    fn column_info(&self, type_name: &str, column: &mut ColumnDescriptor) {
        let _ = (type_name, column);
    }
}

/// Uses each type's description as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMapper;

impl Mapper for DefaultMapper {}

/// Naming styles for [`ConventionMapper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameCase {
    #[default]
    Unchanged,
    Snake,
    LowerCamel,
    UpperCamel,
    ScreamingSnake,
}

impl NameCase {
    pub fn apply(self, name: &str) -> String {
        match self {
            NameCase::Unchanged => name.to_string(),
            NameCase::Snake => name.to_snake_case(),
            NameCase::LowerCamel => name.to_lower_camel_case(),
            NameCase::UpperCamel => name.to_upper_camel_case(),
            NameCase::ScreamingSnake => name.to_shouty_snake_case(),
        }
    }
}

/// A mapper driven by naming conventions and per-member converters.
///
/// Names set explicitly on the type (`#[orm(table = "...")]`,
/// `#[orm(column = "...")]`) are never rewritten.
///
/// ```ignore
/// let mapper = ConventionMapper::new()
///     .table_case(NameCase::Snake)
///     .table_prefix("app_")
///     .from_storage("User", "email", |v| Ok(lowercase(v)));
/// ```
#[derive(Clone, Default)]
pub struct ConventionMapper {
    table_case: NameCase,
    column_case: NameCase,
    table_prefix: String,
    from_storage: HashMap<(String, String), Converter>,
    to_storage: HashMap<(String, String), Converter>,
}

impl ConventionMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_case(mut self, case: NameCase) -> Self {
        self.table_case = case;
        self
    }

    pub fn column_case(mut self, case: NameCase) -> Self {
        self.column_case = case;
        self
    }

    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Convert values read for `type_name.member` before they are stored.
    pub fn from_storage(
        mut self,
        type_name: &str,
        member: &str,
        f: impl Fn(Value) -> OrmResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.from_storage
            .insert((type_name.to_string(), member.to_string()), Arc::new(f));
        self
    }

    /// Convert values of `type_name.member` before they are written.
    pub fn to_storage(
        mut self,
        type_name: &str,
        member: &str,
        f: impl Fn(Value) -> OrmResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.to_storage
            .insert((type_name.to_string(), member.to_string()), Arc::new(f));
        self
    }
}

impl Mapper for ConventionMapper {
    fn table_info(&self, _type_name: &str, table: &mut TableInfo) {
        if !table.explicit_name {
            table.table_name = format!(
                "{}{}",
                self.table_prefix,
                self.table_case.apply(&table.table_name)
            );
        }
    }

    fn column_info(&self, type_name: &str, column: &mut ColumnDescriptor) {
        if !column.explicit_name {
            column.name = self.column_case.apply(&column.name);
        }
        let key = (type_name.to_string(), column.member.to_string());
        if let Some(f) = self.from_storage.get(&key) {
            column.from_storage = Some(f.clone());
        }
        if let Some(f) = self.to_storage.get(&key) {
            column.to_storage = Some(f.clone());
        }
    }
}

/// The process-wide default mapper.
pub fn default_mapper() -> Arc<dyn Mapper> {
    static DEFAULT: OnceLock<Arc<dyn Mapper>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(DefaultMapper)).clone()
}

fn mapper_key(mapper: &Arc<dyn Mapper>) -> usize {
    Arc::as_ptr(mapper) as *const () as usize
}

struct Entry {
    // Holding the mapper keeps its address from being reused while the key lives.
    _mapper: Arc<dyn Mapper>,
    schema: Arc<TypeSchema>,
}

/// Cache of [`TypeSchema`]s keyed by (type, mapper).
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<(TypeId, usize), Entry>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the schema of `T` under `mapper`, building it on first use.
    ///
    /// Racing first calls may both build a schema; the first one stored wins and
    /// every caller receives it.
    pub fn schema_for<T: Mapped>(&self, mapper: &Arc<dyn Mapper>) -> Arc<TypeSchema> {
        let key = (TypeId::of::<T>(), mapper_key(mapper));
        {
            let schemas = self.schemas.read().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = schemas.get(&key) {
                return entry.schema.clone();
            }
        }

        let built = Arc::new(build_schema::<T>(mapper.as_ref()));
        let mut schemas = self.schemas.write().unwrap_or_else(|e| e.into_inner());
        let entry = schemas.entry(key).or_insert_with(|| {
            tracing::debug!(
                target: "rowforge.schema",
                type_name = built.type_name(),
                table = %built.table().table_name,
                columns = built.column_count(),
                "registered schema"
            );
            Entry {
                _mapper: mapper.clone(),
                schema: built.clone(),
            }
        });
        entry.schema.clone()
    }

    pub fn len(&self) -> usize {
        self.schemas.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached schema.
    pub fn flush(&self) {
        self.schemas
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

fn build_schema<T: Mapped>(mapper: &dyn Mapper) -> TypeSchema {
    let mut description = T::describe();
    let type_name = description.type_name;

    // Key entries may name either the member or the pre-mapping column.
    let key_members: Vec<Option<&'static str>> = description
        .table
        .primary_key
        .iter()
        .map(|key| {
            description
                .columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(key) || c.member.eq_ignore_ascii_case(key))
                .map(|c| c.member)
        })
        .collect();

    mapper.table_info(type_name, &mut description.table);
    for column in &mut description.columns {
        mapper.column_info(type_name, column);
    }

    for (key, member) in description.table.primary_key.iter_mut().zip(key_members) {
        if let Some(column) = member.and_then(|m| description.columns.iter().find(|c| c.member == m)) {
            *key = column.name.clone();
        }
    }

    TypeSchema::new(TypeId::of::<T>(), description)
}

/// The process-wide schema registry.
pub fn schema_registry() -> &'static SchemaRegistry {
    static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
    REGISTRY.get_or_init(SchemaRegistry::new)
}

//! Static type schemas.
//!
//! A [`TypeSchema`] describes how one Rust type maps to a table: its columns,
//! primary key and relation members. Schemas are built once per (type, mapper)
//! by the [`SchemaRegistry`] and shared as `Arc`s afterwards.

mod registry;


pub use registry::{
    ConventionMapper, DefaultMapper, Mapper, NameCase, SchemaRegistry, default_mapper,
    schema_registry,
};

use crate::error::OrmResult;
use crate::value::{ColumnType, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Static description of an enum stored by variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumInfo {
    pub name: &'static str,
    pub variants: &'static [&'static str],
}

/// The declared kind of a mapped member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Text,
    Bytes,
    Uuid,
    Date,
    Timestamp,
    TimestampTz,
    Json,
    Enum(EnumInfo),
    /// No coercion; the raw value is passed through.
    Any,
}

impl ValueKind {
    /// The value a non-nullable member receives for a `NULL` column.
    pub fn default_value(&self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::I16 | ValueKind::I32 | ValueKind::I64 | ValueKind::Enum(_) => Value::Int(0),
            ValueKind::F32 | ValueKind::F64 => Value::Float(0.0),
            ValueKind::Text => Value::Text(String::new()),
            ValueKind::Bytes => Value::Bytes(Vec::new()),
            ValueKind::Uuid => Value::Uuid(uuid::Uuid::nil()),
            ValueKind::Date => Value::Date(NaiveDate::default()),
            ValueKind::Timestamp => Value::Timestamp(NaiveDateTime::default()),
            ValueKind::TimestampTz => Value::TimestampTz(DateTime::default()),
            ValueKind::Json => Value::Json(serde_json::Value::Null),
            ValueKind::Any => Value::Null,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Uuid => "uuid",
            ValueKind::Date => "date",
            ValueKind::Timestamp => "timestamp",
            ValueKind::TimestampTz => "timestamptz",
            ValueKind::Json => "json",
            ValueKind::Enum(info) => info.name,
            ValueKind::Any => "any",
        };
        f.write_str(name)
    }
}

/// A per-value conversion hook.
pub type Converter = Arc<dyn Fn(Value) -> OrmResult<Value> + Send + Sync>;

/// One mapped member of a type.
#[derive(Clone)]
pub struct ColumnDescriptor {
    /// Column name in result sets and statements.
    pub name: String,
    /// Whether `name` was set explicitly (mappers leave explicit names alone).
    pub explicit_name: bool,
    /// Rust member the column is stored in.
    pub member: &'static str,
    /// Index passed to [`Mapped::set_member`](crate::Mapped::set_member).
    pub member_index: usize,
    pub kind: ValueKind,
    pub nullable: bool,
    /// Read-only or computed; never written by insert/update.
    pub result_column: bool,
    /// Part of auto-generated `SELECT` lists.
    pub include_in_select: bool,
    pub from_storage: Option<Converter>,
    pub to_storage: Option<Converter>,
    /// Replaces the value expression in `INSERT`; `{value}` is the bound value.
    pub insert_template: Option<String>,
    /// Replaces `column = value` in `UPDATE`; `{column}` and `{value}` are substituted.
    pub update_template: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(member: &'static str, member_index: usize, kind: ValueKind, nullable: bool) -> Self {
        Self {
            name: member.to_string(),
            explicit_name: false,
            member,
            member_index,
            kind,
            nullable,
            result_column: false,
            include_in_select: true,
            from_storage: None,
            to_storage: None,
            insert_template: None,
            update_template: None,
        }
    }

    /// Describe a member from its Rust type.
    pub fn of<T: ColumnType>(member: &'static str, member_index: usize) -> Self {
        Self::new(member, member_index, T::kind(), T::nullable())
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.explicit_name = true;
        self
    }

    pub fn result(mut self) -> Self {
        self.result_column = true;
        self
    }

    pub fn no_select(mut self) -> Self {
        self.include_in_select = false;
        self
    }

    pub fn insert_template(mut self, template: impl Into<String>) -> Self {
        self.insert_template = Some(template.into());
        self
    }

    pub fn update_template(mut self, template: impl Into<String>) -> Self {
        self.update_template = Some(template.into());
        self
    }

    pub fn with_from_storage(
        mut self,
        f: impl Fn(Value) -> OrmResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.from_storage = Some(Arc::new(f));
        self
    }

    pub fn with_to_storage(
        mut self,
        f: impl Fn(Value) -> OrmResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.to_storage = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("member", &self.member)
            .field("member_index", &self.member_index)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("result_column", &self.result_column)
            .field("include_in_select", &self.include_in_select)
            .field("from_storage", &self.from_storage.is_some())
            .field("to_storage", &self.to_storage.is_some())
            .finish()
    }
}

/// Table-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableInfo {
    pub table_name: String,
    pub explicit_name: bool,
    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,
    /// The key is generated by the database.
    pub auto_increment: bool,
    pub sequence: Option<String>,
}

/// Whether a relation member holds one child or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    One,
    Many,
}

/// A member that holds instances of another mapped type.
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    pub member: &'static str,
    /// Index passed to [`Mapped::attach`](crate::Mapped::attach).
    pub relation_index: usize,
    pub target: TypeId,
    pub target_name: &'static str,
    pub kind: RelationKind,
}

impl RelationDescriptor {
    pub fn one<T: 'static>(member: &'static str, relation_index: usize) -> Self {
        Self::new::<T>(member, relation_index, RelationKind::One)
    }

    pub fn many<T: 'static>(member: &'static str, relation_index: usize) -> Self {
        Self::new::<T>(member, relation_index, RelationKind::Many)
    }

    fn new<T: 'static>(member: &'static str, relation_index: usize, kind: RelationKind) -> Self {
        Self {
            member,
            relation_index,
            target: TypeId::of::<T>(),
            target_name: std::any::type_name::<T>(),
            kind,
        }
    }
}

/// What a type says about itself before a [`Mapper`] is applied.
#[derive(Debug, Clone)]
pub struct TypeDescription {
    pub type_name: &'static str,
    pub table: TableInfo,
    pub columns: Vec<ColumnDescriptor>,
    pub relations: Vec<RelationDescriptor>,
    /// `false` when the type has no way to create a blank instance.
    pub constructible: bool,
}

impl TypeDescription {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            table: TableInfo {
                table_name: type_name.to_string(),
                ..TableInfo::default()
            },
            columns: Vec::new(),
            relations: Vec::new(),
            constructible: true,
        }
    }

    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table.table_name = name.into();
        self.table.explicit_name = true;
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.table.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.table.auto_increment = auto_increment;
        self
    }

    pub fn sequence(mut self, sequence: impl Into<String>) -> Self {
        self.table.sequence = Some(sequence.into());
        self
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn constructible(mut self, constructible: bool) -> Self {
        self.constructible = constructible;
        self
    }
}

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

/// The compiled, immutable mapping of one type.
#[derive(Debug)]
pub struct TypeSchema {
    id: u64,
    type_id: TypeId,
    type_name: &'static str,
    table: TableInfo,
    columns: Vec<ColumnDescriptor>,
    lookup: HashMap<String, usize>,
    relations: Vec<RelationDescriptor>,
    constructible: bool,
}

impl TypeSchema {
    /// Build a schema for `type_id` from an already-mapped description.
    ///
    /// Every call allocates a fresh schema id; factories compiled against one
    /// schema are never reused for another.
    pub fn new(type_id: TypeId, description: TypeDescription) -> Self {
        let mut lookup = HashMap::with_capacity(description.columns.len());
        for (index, column) in description.columns.iter().enumerate() {
            lookup.entry(column.name.to_ascii_lowercase()).or_insert(index);
        }

        Self {
            id: NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed),
            type_id,
            type_name: description.type_name,
            table: description.table,
            columns: description.columns,
            lookup,
            relations: description.relations,
            constructible: description.constructible,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table(&self) -> &TableInfo {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column lookup ignoring ASCII case, the rule [`Row::get`](crate::row::Row::get) uses.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        match self.lookup.get(name) {
            Some(&i) => Some(&self.columns[i]),
            None => self
                .lookup
                .get(&name.to_ascii_lowercase())
                .map(|&i| &self.columns[i]),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    /// First relation member whose target is `target`.
    pub fn relation_to(&self, target: TypeId) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.target == target)
    }

    pub fn is_constructible(&self) -> bool {
        self.constructible
    }

    /// Primary key descriptors, in key order. Unknown key names are skipped.
    pub fn primary_key_columns(&self) -> Vec<&ColumnDescriptor> {
        self.table
            .primary_key
            .iter()
            .filter_map(|name| self.column(name))
            .collect()
    }

    pub fn is_primary_key(&self, column: &ColumnDescriptor) -> bool {
        self.table
            .primary_key
            .iter()
            .any(|k| k.eq_ignore_ascii_case(&column.name))
    }
}

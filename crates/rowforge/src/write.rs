//! INSERT / UPDATE / DELETE generation from a [`TypeSchema`].
//!
//! Statements come out as [`CompiledSql`] in the `@N` form, ready for a
//! [`Dialect`] to render.

use crate::arg::Arg;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::mapped::Mapped;
use crate::schema::{ColumnDescriptor, TypeSchema};
use crate::sql::CompiledSql;
use crate::value::Value;
use std::fmt::Write as _;

/// The stored form of one member: `to_storage` applied when present.
fn storage_value<T: Mapped>(value: &T, column: &ColumnDescriptor) -> OrmResult<Value> {
    let raw = value.get_member(column.member_index);
    match &column.to_storage {
        Some(convert) => convert(raw).map_err(|e| e.with_column(&column.name)),
        None => Ok(raw),
    }
}

fn key_filter<T: Mapped>(
    dialect: &dyn Dialect,
    schema: &TypeSchema,
    value: &T,
    sql: &mut String,
    args: &mut Vec<Arg>,
) -> OrmResult<()> {
    let keys = schema.primary_key_columns();
    if keys.is_empty() {
        return Err(OrmError::validation(format!(
            "'{}' has no primary key",
            schema.type_name()
        )));
    }

    sql.push_str(" WHERE ");
    for (n, column) in keys.into_iter().enumerate() {
        if n > 0 {
            sql.push_str(" AND ");
        }
        let _ = write!(
            sql,
            "{} = @{}",
            dialect.escape_identifier(&column.name),
            args.len()
        );
        args.push(Arg::Scalar(storage_value(value, column)?));
    }
    Ok(())
}

fn finish(sql: String, args: Vec<Arg>) -> OrmResult<CompiledSql> {
    let mut compiled = CompiledSql::new();
    compiled.append(&sql, &args)?;
    Ok(compiled)
}

/// The primary key column generated by the database, if any.
pub fn generated_key(schema: &TypeSchema) -> Option<&ColumnDescriptor> {
    let table = schema.table();
    if !table.auto_increment || table.primary_key.len() != 1 {
        return None;
    }
    schema.primary_key_columns().into_iter().next()
}

/// `INSERT INTO table (...) VALUES (...)`.
///
/// Result columns and a database-generated key are skipped. An insert template
/// replaces the value expression; `{value}` inside it is the member's value.
///
/// The flag is `true` when the statement returns the generated key as its only
/// column.
pub fn insert<T: Mapped>(
    dialect: &dyn Dialect,
    schema: &TypeSchema,
    value: &T,
) -> OrmResult<(CompiledSql, bool)> {
    let table = schema.table();
    let generated = generated_key(schema).map(|c| c.member_index);

    let mut names = Vec::new();
    let mut values = Vec::new();
    let mut args = Vec::new();
    for column in schema.columns() {
        if column.result_column || Some(column.member_index) == generated {
            continue;
        }
        let placeholder = format!("@{}", args.len());
        args.push(Arg::Scalar(storage_value(value, column)?));
        names.push(dialect.escape_identifier(&column.name));
        values.push(match &column.insert_template {
            Some(template) => template.replace("{value}", &placeholder),
            None => placeholder,
        });
    }

    let mut sql = format!("INSERT INTO {}", dialect.escape_table_name(&table.table_name));
    if names.is_empty() {
        sql.push_str(" DEFAULT VALUES");
    } else {
        let _ = write!(sql, " ({}) VALUES ({})", names.join(", "), values.join(", "));
    }

    let returning = match generated_key(schema) {
        Some(key) => dialect.insert_returning(&mut sql, &key.name),
        None => false,
    };

    Ok((finish(sql, args)?, returning))
}

/// `UPDATE table SET ... WHERE key = ...`.
///
/// Key and result columns are never set. An update template replaces the whole
/// `column = value` assignment; `{column}` and `{value}` are substituted.
pub fn update<T: Mapped>(
    dialect: &dyn Dialect,
    schema: &TypeSchema,
    value: &T,
) -> OrmResult<CompiledSql> {
    let mut assignments = Vec::new();
    let mut args = Vec::new();
    for column in schema.columns() {
        if column.result_column || schema.is_primary_key(column) {
            continue;
        }
        let name = dialect.escape_identifier(&column.name);
        let placeholder = format!("@{}", args.len());
        args.push(Arg::Scalar(storage_value(value, column)?));
        assignments.push(match &column.update_template {
            Some(template) => template
                .replace("{column}", &name)
                .replace("{value}", &placeholder),
            None => format!("{name} = {placeholder}"),
        });
    }

    if assignments.is_empty() {
        return Err(OrmError::validation(format!(
            "'{}' has no updatable columns",
            schema.type_name()
        )));
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.escape_table_name(&schema.table().table_name),
        assignments.join(", ")
    );
    key_filter(dialect, schema, value, &mut sql, &mut args)?;
    finish(sql, args)
}

/// `DELETE FROM table WHERE key = ...`.
pub fn delete<T: Mapped>(
    dialect: &dyn Dialect,
    schema: &TypeSchema,
    value: &T,
) -> OrmResult<CompiledSql> {
    let mut sql = format!(
        "DELETE FROM {}",
        dialect.escape_table_name(&schema.table().table_name)
    );
    let mut args = Vec::new();
    key_filter(dialect, schema, value, &mut sql, &mut args)?;
    finish(sql, args)
}

/// `SELECT COUNT(*) FROM table WHERE key = ...` for a single-column key.
pub fn exists(
    dialect: &dyn Dialect,
    schema: &TypeSchema,
    key: impl Into<Arg>,
) -> OrmResult<CompiledSql> {
    let keys = schema.primary_key_columns();
    let [column] = keys.as_slice() else {
        return Err(OrmError::validation(format!(
            "'{}' needs a single-column primary key",
            schema.type_name()
        )));
    };
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = @0",
        dialect.escape_table_name(&schema.table().table_name),
        dialect.escape_identifier(&column.name)
    );
    finish(sql, vec![key.into()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{AnsiDialect, PostgresDialect};
    use crate::schema::TypeDescription;
    use crate::value::FromValue;
    use std::any::TypeId;

    #[derive(Default)]
    struct Line {
        order_id: i64,
        line_no: i32,
        sku: String,
        total: i64,
    }

    impl Mapped for Line {
        fn describe() -> TypeDescription {
            TypeDescription::new("Line")
                .table("sales.order_lines")
                .primary_key(&["order_id", "line_no"])
                .column(ColumnDescriptor::of::<i64>("order_id", 0))
                .column(ColumnDescriptor::of::<i32>("line_no", 1))
                .column(ColumnDescriptor::of::<String>("sku", 2).insert_template("upper({value})"))
                .column(ColumnDescriptor::of::<i64>("total", 3).result())
        }

        fn construct() -> Option<Self> {
            Some(Self::default())
        }

        fn set_member(&mut self, member_index: usize, value: Value) -> OrmResult<()> {
            match member_index {
                0 => self.order_id = i64::from_value(value)?,
                1 => self.line_no = i32::from_value(value)?,
                2 => self.sku = String::from_value(value)?,
                3 => self.total = i64::from_value(value)?,
                _ => {}
            }
            Ok(())
        }

        fn get_member(&self, member_index: usize) -> Value {
            match member_index {
                0 => Value::Int(self.order_id),
                1 => Value::Int(self.line_no.into()),
                2 => Value::Text(self.sku.clone()),
                3 => Value::Int(self.total),
                _ => Value::Null,
            }
        }
    }

    fn schema(description: TypeDescription) -> TypeSchema {
        TypeSchema::new(TypeId::of::<Line>(), description)
    }

    fn line() -> Line {
        Line {
            order_id: 9,
            line_no: 2,
            sku: "ab-1".into(),
            total: 100,
        }
    }

    #[test]
    fn insert_applies_templates_and_skips_results() {
        let schema = schema(Line::describe());
        let (sql, returning) = insert(&PostgresDialect, &schema, &line()).unwrap();
        assert_eq!(
            sql.sql(),
            r#"INSERT INTO "sales"."order_lines" ("order_id", "line_no", "sku") VALUES (@0, @1, upper(@2))"#
        );
        assert_eq!(sql.args().len(), 3);
        // Composite keys are never generated.
        assert!(!returning);
    }

    #[test]
    fn insert_without_columns_uses_default_values() {
        let schema = schema(
            TypeDescription::new("Line")
                .table("counters")
                .primary_key(&["order_id"])
                .auto_increment(true)
                .column(ColumnDescriptor::of::<i64>("order_id", 0)),
        );
        let (sql, returning) = insert(&AnsiDialect, &schema, &line()).unwrap();
        assert_eq!(sql.sql(), r#"INSERT INTO "counters" DEFAULT VALUES"#);
        assert!(!returning);

        let (sql, returning) = insert(&PostgresDialect, &schema, &line()).unwrap();
        assert_eq!(sql.sql(), r#"INSERT INTO "counters" DEFAULT VALUES RETURNING "order_id""#);
        assert!(returning);
    }

    #[test]
    fn update_filters_on_every_key_column() {
        let schema = schema(
            TypeDescription::new("Line")
                .table("sales.order_lines")
                .primary_key(&["order_id", "line_no"])
                .column(ColumnDescriptor::of::<i64>("order_id", 0))
                .column(ColumnDescriptor::of::<i32>("line_no", 1))
                .column(ColumnDescriptor::of::<String>("sku", 2))
                .column(
                    ColumnDescriptor::of::<i64>("total", 3)
                        .update_template("{column} = {column} + {value}"),
                ),
        );
        let sql = update(&PostgresDialect, &schema, &line()).unwrap();
        assert_eq!(
            sql.sql(),
            r#"UPDATE "sales"."order_lines" SET "sku" = @0, "total" = "total" + @1 WHERE "order_id" = @2 AND "line_no" = @3"#
        );
        assert_eq!(sql.args()[2], Value::Int(9));
    }

    #[test]
    fn update_needs_columns_and_key() {
        let keys_only = schema(
            TypeDescription::new("Line")
                .primary_key(&["order_id"])
                .column(ColumnDescriptor::of::<i64>("order_id", 0)),
        );
        assert!(matches!(
            update(&PostgresDialect, &keys_only, &line()),
            Err(OrmError::Validation(_))
        ));

        let keyless = schema(TypeDescription::new("Line").column(ColumnDescriptor::of::<String>("sku", 2)));
        assert!(delete(&PostgresDialect, &keyless, &line()).is_err());
    }

    #[test]
    fn to_storage_applies_to_written_values() {
        let sku = ColumnDescriptor::of::<String>("sku", 2)
            .with_to_storage(|v| Ok(Value::Text(v.to_string().to_uppercase())));
        let schema = schema(
            TypeDescription::new("Line")
                .primary_key(&["order_id"])
                .column(ColumnDescriptor::of::<i64>("order_id", 0))
                .column(sku),
        );
        let (sql, _) = insert(&PostgresDialect, &schema, &line()).unwrap();
        assert_eq!(sql.args()[1], Value::Text("AB-1".into()));
    }

    #[test]
    fn exists_requires_single_key() {
        let composite = schema(Line::describe());
        assert!(exists(&PostgresDialect, &composite, 1i64).is_err());

        let single = schema(
            TypeDescription::new("Line")
                .table("lines")
                .primary_key(&["order_id"])
                .column(ColumnDescriptor::of::<i64>("order_id", 0)),
        );
        let sql = exists(&PostgresDialect, &single, 1i64).unwrap();
        assert_eq!(sql.sql(), r#"SELECT COUNT(*) FROM "lines" WHERE "order_id" = @0"#);
        assert_eq!(sql.args(), [Value::Int(1)]);
    }
}

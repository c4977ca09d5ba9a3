//! SQL dialects.
//!
//! Compiled templates use `@0, @1, ...` regardless of the target database. A
//! [`Dialect`] renders that form into driver syntax and supplies the escaping
//! and paging rules the higher-level helpers need.

use crate::paging::SqlParts;
use crate::sql::lexer::lex;
use crate::value::Value;
use std::fmt::{self, Write as _};

/// Database-specific SQL rules.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Quote one identifier.
    fn escape_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quote a possibly schema-qualified table name.
    fn escape_table_name(&self, name: &str) -> String {
        name.split('.')
            .map(|part| self.escape_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Driver placeholder for zero-based argument `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Wrap a query with paging, appending the paging arguments to `args`.
    fn build_paged_query(&self, skip: i64, take: i64, parts: &SqlParts, args: &mut Vec<Value>)
    -> String;

    /// Append a clause returning `key_column` from an INSERT. Returns `false` if
    /// the dialect has no such clause.
    fn insert_returning(&self, sql: &mut String, key_column: &str) -> bool {
        let _ = (sql, key_column);
        false
    }

    /// Render compiled `@N` SQL into driver syntax.
    ///
    /// `@N` becomes [`Dialect::placeholder`]. A run of two or more `@` is a
    /// native variable and each `@@` pair in it collapses to `@`. Quoted
    /// literals and comments are copied unchanged.
    fn render(&self, sql: &str) -> String {
        let mut out = String::with_capacity(sql.len() + 8);
        for lexeme in lex(sql) {
            let text = &sql[lexeme.span.clone()];
            if lexeme.is_code() {
                render_code(self, text, &mut out);
            } else {
                out.push_str(text);
            }
        }
        out
    }
}

fn render_code<D: Dialect + ?Sized>(dialect: &D, code: &str, out: &mut String) {
    let mut chars = code.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '@' {
            out.push(c);
            continue;
        }
        let mut run = 1;
        while matches!(chars.peek(), Some((_, '@'))) {
            chars.next();
            run += 1;
        }
        if run > 1 {
            for _ in 0..(run / 2 + run % 2) {
                out.push('@');
            }
            continue;
        }

        let start = pos + 1;
        let mut end = start;
        while let Some(&(i, next)) = chars.peek() {
            if !next.is_ascii_digit() {
                break;
            }
            end = i + 1;
            chars.next();
        }
        match code[start..end].parse::<usize>() {
            Ok(index) => out.push_str(&dialect.placeholder(index)),
            Err(_) => out.push_str(&code[pos..end]),
        }
    }
}

/// PostgreSQL: `$1` placeholders, `LIMIT/OFFSET` paging, `RETURNING`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index + 1)
    }

    fn build_paged_query(
        &self,
        skip: i64,
        take: i64,
        parts: &SqlParts,
        args: &mut Vec<Value>,
    ) -> String {
        let mut sql = parts.sql.clone();
        let _ = write!(sql, "\nLIMIT @{} OFFSET @{}", args.len(), args.len() + 1);
        args.push(Value::Int(take));
        args.push(Value::Int(skip));
        sql
    }

    fn insert_returning(&self, sql: &mut String, key_column: &str) -> bool {
        sql.push_str(" RETURNING ");
        sql.push_str(&self.escape_identifier(key_column));
        true
    }
}

/// ANSI SQL:2008: `@N` placeholders and `OFFSET ... FETCH NEXT` paging.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@{index}")
    }

    fn build_paged_query(
        &self,
        skip: i64,
        take: i64,
        parts: &SqlParts,
        args: &mut Vec<Value>,
    ) -> String {
        let mut sql = parts.sql.clone();
        // OFFSET/FETCH is only valid after an ORDER BY.
        if parts.order_by.is_none() {
            sql.push_str("\nORDER BY (SELECT NULL)");
        }
        let _ = write!(
            sql,
            "\nOFFSET @{} ROWS FETCH NEXT @{} ROWS ONLY",
            args.len(),
            args.len() + 1
        );
        args.push(Value::Int(skip));
        args.push(Value::Int(take));
        sql
    }
}

use crate::arg::Arg;
use crate::client::GenericClient;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::schema::TypeSchema;
use crate::sql::{CompiledSql, starts_with_keyword, strip_sql_prefix};
use crate::value::Value;
use tokio_postgres::Row;

// ============================================================================
// Internal helpers
// ============================================================================

/// Statements that already produce rows on their own.
const SELF_CONTAINED: [&str; 4] = ["SELECT", "WITH", "EXECUTE", "CALL"];

fn is_keyword(sql: &str, keyword: &str) -> bool {
    starts_with_keyword(sql, keyword)
        && !sql[keyword.len()..].starts_with(|c: char| c.is_alphanumeric() || c == '_')
}

/// Complete a partial query into a `SELECT` over `schema`'s table.
///
/// A query starting with `FROM` only gets the select list; anything else that
/// does not start a statement (typically `WHERE ...` or empty) gets the list and
/// the `FROM` clause.
pub(super) fn auto_select(dialect: &dyn Dialect, schema: &TypeSchema, sql: &str) -> String {
    let head = strip_sql_prefix(sql);
    if SELF_CONTAINED.iter().any(|k| is_keyword(head, k)) {
        return sql.to_string();
    }

    let columns = schema
        .columns()
        .iter()
        .filter(|c| c.include_in_select)
        .map(|c| dialect.escape_identifier(&c.name))
        .collect::<Vec<_>>();
    let columns = if columns.is_empty() {
        "NULL".to_string()
    } else {
        columns.join(", ")
    };

    let prefix = if is_keyword(head, "FROM") {
        format!("SELECT {columns}")
    } else {
        format!(
            "SELECT {columns} FROM {}",
            dialect.escape_table_name(&schema.table().table_name)
        )
    };

    if sql.trim().is_empty() {
        prefix
    } else {
        format!("{prefix} {}", sql.trim_start())
    }
}

/// Recompile `@N` text against `args`, keeping only the referenced arguments.
pub(super) fn recompile(sql: &str, args: &[Value]) -> OrmResult<CompiledSql> {
    let args = args.iter().cloned().map(Arg::Scalar).collect::<Vec<_>>();
    let mut compiled = CompiledSql::new();
    compiled.append(sql, &args)?;
    Ok(compiled)
}

impl<C: GenericClient> super::Database<C> {
    /// Render `@N` text for the dialect and log it.
    pub(super) fn render(&self, sql: &str, param_count: usize) -> String {
        let rendered = self.dialect.render(sql);
        if let Some(logging) = &self.config.sql_logging {
            logging.emit(&rendered, param_count);
        }
        rendered
    }

    pub(super) async fn with_timeout<T, F>(&self, future: F) -> OrmResult<T>
    where
        F: std::future::Future<Output = OrmResult<T>> + Send,
    {
        match self.config.query_timeout {
            Some(timeout) => {
                tokio::pin!(future);
                tokio::select! {
                    result = &mut future => result,
                    _ = tokio::time::sleep(timeout) => {
                        if let Some(cancel_token) = self.client.cancel_token() {
                            tokio::spawn(async move {
                                let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
                            });
                        }
                        Err(OrmError::Timeout(timeout))
                    }
                }
            }
            None => future.await,
        }
    }

    pub(super) async fn run_query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let rendered = self.render(sql, args.len());
        let params = crate::pg::params(args);
        self.with_timeout(self.client.query(&rendered, &params)).await
    }

    pub(super) async fn run_execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        let rendered = self.render(sql, args.len());
        let params = crate::pg::params(args);
        self.with_timeout(self.client.execute(&rendered, &params)).await
    }
}

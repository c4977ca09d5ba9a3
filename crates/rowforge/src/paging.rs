//! Paging support: splitting a `SELECT` into parts and the [`Page`] result.

use crate::error::{OrmError, OrmResult};
use crate::sql::lexer::{Lexeme, LexemeKind, lex};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

fn keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(SELECT|DISTINCT|FROM|GROUP\s+BY|ORDER\s+BY)\b").expect("valid regex")
    })
}

/// A `SELECT` statement split at its top-level keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlParts {
    /// The original statement.
    pub sql: String,
    /// Text between `SELECT` and the top-level `FROM`.
    pub columns: String,
    /// From the top-level `FROM` up to (not including) a trailing `ORDER BY`.
    pub body: String,
    /// The trailing top-level `ORDER BY` clause, if any.
    pub order_by: Option<String>,
    pub distinct: bool,
    pub grouped: bool,
}

impl SqlParts {
    /// Split `sql`. Fails if no top-level `SELECT ... FROM` is found.
    pub fn split(sql: &str) -> OrmResult<Self> {
        let depths = paren_depths(sql);
        let top: Vec<(usize, usize, String)> = keyword_regex()
            .find_iter(sql)
            .filter(|m| depths[m.start()] == Some(0))
            .map(|m| {
                let word = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
                (m.start(), m.end(), word.to_ascii_uppercase())
            })
            .collect();

        let unparsable = || OrmError::validation(format!("unable to parse SQL for paging: {sql}"));

        let select = top.iter().find(|(_, _, w)| w == "SELECT").ok_or_else(unparsable)?;
        let from = top
            .iter()
            .find(|(start, _, w)| w == "FROM" && *start > select.0)
            .ok_or_else(unparsable)?;
        let distinct = top
            .iter()
            .any(|(start, _, w)| w == "DISTINCT" && *start > select.0 && *start < from.0);
        let grouped = top
            .iter()
            .any(|(start, _, w)| w == "GROUP BY" && *start > from.0);
        let order = top
            .iter()
            .rev()
            .find(|(start, _, w)| w == "ORDER BY" && *start > from.0);

        let body_end = order.map(|o| o.0).unwrap_or(sql.len());
        Ok(Self {
            sql: sql.to_string(),
            columns: sql[select.1..from.0].trim().to_string(),
            body: sql[from.0..body_end].trim_end().to_string(),
            order_by: order.map(|o| sql[o.0..].trim().to_string()),
            distinct,
            grouped,
        })
    }

    /// A statement counting the rows of the unpaged query.
    pub fn count_sql(&self) -> String {
        if self.distinct || self.grouped {
            let inner = match &self.order_by {
                Some(_) => format!("SELECT {} {}", self.columns, self.body),
                None => self.sql.clone(),
            };
            let close = if ends_in_line_comment(&inner) { "\n" } else { "" };
            format!("SELECT COUNT(*) FROM ({inner}{close}) paged_inner")
        } else {
            format!("SELECT COUNT(*) {}", self.body)
        }
    }
}

fn ends_in_line_comment(sql: &str) -> bool {
    lex(sql)
        .last()
        .is_some_and(|l| l.kind == LexemeKind::Comment && sql[l.span.clone()].starts_with("--"))
}

/// Byte-indexed parenthesis depth of code. Bytes inside literals and comments
/// are `None` and never count as top level.
fn paren_depths(sql: &str) -> Vec<Option<u32>> {
    let mut depths = vec![None; sql.len() + 1];
    let mut depth = 0u32;
    for lexeme in lex(sql).into_iter().filter(Lexeme::is_code) {
        for (i, c) in sql[lexeme.span.clone()].char_indices() {
            let at = lexeme.span.start + i;
            let own = match c {
                '(' => {
                    depth += 1;
                    depth - 1
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    depth
                }
                _ => depth,
            };
            for slot in &mut depths[at..at + c.len_utf8()] {
                *slot = Some(own);
            }
        }
    }
    depths
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub current_page: i64,
    pub items_per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(current_page: i64, items_per_page: i64, total_items: i64, items: Vec<T>) -> Self {
        let total_pages = if items_per_page > 0 {
            (total_items + items_per_page - 1) / items_per_page
        } else {
            0
        };
        Self {
            current_page,
            items_per_page,
            total_items,
            total_pages,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_select() {
        let parts = SqlParts::split("SELECT id, name FROM users WHERE age > @0 ORDER BY name").unwrap();
        assert_eq!(parts.columns, "id, name");
        assert_eq!(parts.body, "FROM users WHERE age > @0");
        assert_eq!(parts.order_by.as_deref(), Some("ORDER BY name"));
        assert_eq!(parts.count_sql(), "SELECT COUNT(*) FROM users WHERE age > @0");
    }

    #[test]
    fn ignores_nested_keywords() {
        let parts = SqlParts::split(
            "SELECT a, (SELECT max(b) FROM t2 ORDER BY b) AS m FROM t1 ORDER BY a",
        )
        .unwrap();
        assert_eq!(parts.columns, "a, (SELECT max(b) FROM t2 ORDER BY b) AS m");
        assert_eq!(parts.body, "FROM t1");
        assert_eq!(parts.order_by.as_deref(), Some("ORDER BY a"));
    }

    #[test]
    fn ignores_keywords_in_literals_and_comments() {
        let parts = SqlParts::split("SELECT 'from' AS src, id FROM t WHERE note <> 'order by x'").unwrap();
        assert_eq!(parts.columns, "'from' AS src, id");
        assert_eq!(parts.body, "FROM t WHERE note <> 'order by x'");
        assert_eq!(parts.order_by, None);
        assert_eq!(
            parts.count_sql(),
            "SELECT COUNT(*) FROM t WHERE note <> 'order by x'"
        );

        let parts = SqlParts::split(
            "SELECT DISTINCT id /* select from */ FROM t -- order by id\nORDER BY \"from\"",
        )
        .unwrap();
        assert_eq!(parts.columns, "DISTINCT id /* select from */");
        assert_eq!(parts.body, "FROM t -- order by id");
        assert_eq!(parts.order_by.as_deref(), Some("ORDER BY \"from\""));
        assert_eq!(
            parts.count_sql(),
            "SELECT COUNT(*) FROM (SELECT DISTINCT id /* select from */ FROM t -- order by id\n) paged_inner"
        );
    }

    #[test]
    fn distinct_counts_over_subquery() {
        let parts = SqlParts::split("SELECT DISTINCT city FROM users").unwrap();
        assert!(parts.distinct);
        assert_eq!(
            parts.count_sql(),
            "SELECT COUNT(*) FROM (SELECT DISTINCT city FROM users) paged_inner"
        );
    }

    #[test]
    fn rejects_non_select() {
        assert!(SqlParts::split("UPDATE users SET a = 1").is_err());
    }

    #[test]
    fn page_totals_round_up() {
        let page = Page::new(1, 10, 21, vec![1, 2, 3]);
        assert_eq!(page.total_pages, 3);
        assert_eq!(Page::<i32>::new(1, 0, 5, vec![]).total_pages, 0);
    }
}

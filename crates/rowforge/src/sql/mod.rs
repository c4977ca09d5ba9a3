//! SQL templating.
//!
//! Templates use `@0`, `@1`, ... for positional arguments and `@name` for fields
//! of a [`NamedArgs`](crate::NamedArgs) bag. Compiling a template produces purely
//! positional text plus the final argument list:
//!
//! ```ignore
//! use rowforge::{args, compile_sql};
//!
//! let compiled = compile_sql([
//!     ("SELECT * FROM users WHERE age > @0", args![20]),
//!     ("WHERE id IN (@0)", args![vec![1, 2, 3]]),
//! ])?;
//! assert_eq!(
//!     compiled.sql(),
//!     "SELECT * FROM users WHERE age > @0\nWHERE id IN (@1,@2,@3)"
//! );
//! ```
//!
//! A [`Dialect`](crate::Dialect) turns the `@N` form into driver syntax at the
//! last moment.

mod builder;
pub mod lexer;
pub mod resolver;
pub mod scanner;


pub use builder::{Clause, CompiledSql, Sql, compile_sql};

/// Start a template with one fragment.
pub fn sql(text: impl Into<String>, args: Vec<crate::Arg>) -> Sql {
    Sql::from_text(text, args)
}

/// Strip leading whitespace, SQL comments (`--` and `/* */`), and parentheses
/// from a SQL string to find the first meaningful keyword.
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") {
            if let Some(pos) = s.find('\n') {
                s = &s[pos + 1..];
                continue;
            }
            return "";
        }
        if s.starts_with("/*") {
            if let Some(pos) = s.find("*/") {
                s = &s[pos + 2..];
                continue;
            }
            return "";
        }
        if s.starts_with('(') {
            s = &s[1..];
            continue;
        }
        if s == before {
            break;
        }
    }
    s
}

pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) => prefix.eq_ignore_ascii_case(keyword),
        None => false,
    }
}

use super::resolver::resolve;
use super::scanner::scan;
use super::starts_with_keyword;
use crate::arg::Arg;
use crate::error::OrmResult;
use crate::value::Value;
use std::fmt::Write as _;

/// Clause keywords that merge with an immediately preceding fragment of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Where,
    Set,
    OrderBy,
}

impl Clause {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Clause::Where => &["WHERE"],
            Clause::Set => &["SET"],
            Clause::OrderBy => &["ORDER", "BY"],
        }
    }

    fn connective(self) -> &'static str {
        match self {
            Clause::Where => "AND",
            Clause::Set | Clause::OrderBy => ",",
        }
    }
}

/// Detect a joinable clause keyword at the start of `text`.
///
/// Returns the clause and the text following the keyword (leading whitespace kept).
fn leading_clause(text: &str) -> Option<(Clause, &str)> {
    [Clause::Where, Clause::Set, Clause::OrderBy]
        .into_iter()
        .find_map(|clause| {
            let mut rest = text;
            for keyword in clause.keywords() {
                rest = rest.trim_start();
                if !starts_with_keyword(rest, keyword) {
                    return None;
                }
                rest = &rest[keyword.len()..];
                if !rest.starts_with(char::is_whitespace) {
                    return None;
                }
            }
            Some((clause, rest))
        })
}

/// A compiled SQL statement: positional `@0, @1, ...` text plus its argument list.
///
/// Built incrementally with [`CompiledSql::append`]; each call renumbers the new
/// fragment's placeholders after the arguments already accumulated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledSql {
    sql: String,
    args: Vec<Value>,
    last_clause: Option<Clause>,
    fragments: usize,
}

impl CompiledSql {
    /// Create an empty statement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap already-compiled `@N` text and its arguments as one fragment.
    pub fn from_parts(sql: String, args: Vec<Value>) -> Self {
        let last_clause = leading_clause(&sql).map(|(kind, _)| kind);
        Self {
            sql,
            args,
            last_clause,
            fragments: 1,
        }
    }

    /// Append a fragment, resolving and renumbering its placeholders.
    ///
    /// Fragments are joined by a newline. A `WHERE`, `SET` or `ORDER BY` fragment
    /// that directly follows a fragment starting with the same keyword has its
    /// keyword replaced by `AND`, `,` or `,` respectively.
    pub fn append(&mut self, text: &str, args: &[Arg]) -> OrmResult<&mut Self> {
        let tokens = scan(text);
        let resolved = resolve(&tokens, args)?;
        let base = self.args.len();

        let mut rendered = String::with_capacity(text.len() + tokens.len() * 2);
        let mut cursor = 0;
        for (token, slots) in tokens.iter().zip(&resolved.slots) {
            rendered.push_str(&text[cursor..token.span.start]);
            for (n, slot) in slots.clone().enumerate() {
                if n > 0 {
                    rendered.push(',');
                }
                let _ = write!(rendered, "@{}", base + slot);
            }
            cursor = token.span.end;
        }
        rendered.push_str(&text[cursor..]);

        let clause = leading_clause(&rendered);
        if self.fragments > 0 {
            self.sql.push('\n');
        }
        match clause {
            Some((kind, rest)) if self.last_clause == Some(kind) => {
                self.sql.push_str(kind.connective());
                self.sql.push_str(rest);
            }
            _ => self.sql.push_str(&rendered),
        }

        self.args.extend(resolved.args);
        self.last_clause = clause.map(|(kind, _)| kind);
        self.fragments += 1;
        Ok(self)
    }

    /// The compiled SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Arguments in placeholder order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Number of appended fragments.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments == 0
    }

    /// Consume into `(sql, args)`.
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.args)
    }
}

/// Compile a sequence of `(text, args)` fragments into one statement.
pub fn compile_sql<I, S>(fragments: I) -> OrmResult<CompiledSql>
where
    I: IntoIterator<Item = (S, Vec<Arg>)>,
    S: AsRef<str>,
{
    let mut compiled = CompiledSql::new();
    for (text, args) in fragments {
        compiled.append(text.as_ref(), &args)?;
    }
    Ok(compiled)
}

/// A composable SQL template.
///
/// `Sql` stores fragments and their raw arguments; nothing is resolved until
/// [`Sql::compile`], so building never fails.
///
/// # Example
///
/// ```ignore
/// use rowforge::{Sql, args};
///
/// let mut q = Sql::new();
/// q.select(&["id", "name"])
///     .from_(&["users"])
///     .where_("status = @0", args!["active"])
///     .where_("id IN (@0)", args![vec![1, 2, 3]])
///     .order_by(&["name"]);
///
/// let compiled = q.compile()?;
/// // SELECT id, name
/// // FROM users
/// // WHERE (status = @0)
/// // AND (id IN (@1,@2,@3))
/// // ORDER BY name
/// ```
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct Sql {
    fragments: Vec<(String, Vec<Arg>)>,
}

impl Sql {
    /// Create an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a template with one initial fragment.
    pub fn from_text(text: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            fragments: vec![(text.into(), args)],
        }
    }

    /// Append a fragment with its own argument list.
    pub fn append(&mut self, text: impl Into<String>, args: Vec<Arg>) -> &mut Self {
        self.fragments.push((text.into(), args));
        self
    }

    /// Append all fragments of another template.
    pub fn append_sql(&mut self, other: Sql) -> &mut Self {
        self.fragments.extend(other.fragments);
        self
    }

    /// `SELECT col, col, ...`
    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.append(format!("SELECT {}", columns.join(", ")), Vec::new())
    }

    /// `FROM table, table, ...`
    pub fn from_(&mut self, tables: &[&str]) -> &mut Self {
        self.append(format!("FROM {}", tables.join(", ")), Vec::new())
    }

    /// `WHERE (condition)`; consecutive calls are joined with `AND`.
    pub fn where_(&mut self, condition: &str, args: Vec<Arg>) -> &mut Self {
        self.append(format!("WHERE ({condition})"), args)
    }

    /// `ORDER BY col, ...`; consecutive calls are joined with `,`.
    pub fn order_by(&mut self, columns: &[&str]) -> &mut Self {
        self.append(format!("ORDER BY {}", columns.join(", ")), Vec::new())
    }

    /// `GROUP BY col, ...`
    pub fn group_by(&mut self, columns: &[&str]) -> &mut Self {
        self.append(format!("GROUP BY {}", columns.join(", ")), Vec::new())
    }

    /// `INNER JOIN table`; follow with [`Sql::on`].
    pub fn inner_join(&mut self, table: &str) -> &mut Self {
        self.append(format!("INNER JOIN {table}"), Vec::new())
    }

    /// `LEFT OUTER JOIN table`; follow with [`Sql::on`].
    pub fn left_join(&mut self, table: &str) -> &mut Self {
        self.append(format!("LEFT OUTER JOIN {table}"), Vec::new())
    }

    /// `ON condition`
    pub fn on(&mut self, condition: &str, args: Vec<Arg>) -> &mut Self {
        self.append(format!("ON {condition}"), args)
    }

    /// The fragments appended so far.
    pub fn fragments(&self) -> &[(String, Vec<Arg>)] {
        &self.fragments
    }

    /// Resolve placeholders and join fragments into a [`CompiledSql`].
    pub fn compile(&self) -> OrmResult<CompiledSql> {
        let mut compiled = CompiledSql::new();
        for (text, args) in &self.fragments {
            compiled.append(text, args)?;
        }
        Ok(compiled)
    }
}

impl From<&str> for Sql {
    fn from(text: &str) -> Self {
        Sql::from_text(text, Vec::new())
    }
}

impl From<String> for Sql {
    fn from(text: String) -> Self {
        Sql::from_text(text, Vec::new())
    }
}

impl From<(&str, Vec<Arg>)> for Sql {
    fn from((text, args): (&str, Vec<Arg>)) -> Self {
        Sql::from_text(text, args)
    }
}

impl From<&Sql> for Sql {
    fn from(sql: &Sql) -> Self {
        sql.clone()
    }
}

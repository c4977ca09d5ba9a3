use std::time::Duration;
use tracing::Level;

/// Settings for a [`crate::Database`].
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Prefix queries that lack a `SELECT` with one built from the type's
    /// columns. Enabled by default.
    pub auto_select: bool,
    /// Query timeout. `None` means no timeout (default).
    pub query_timeout: Option<Duration>,
    /// How executed SQL is logged. `None` disables SQL logging.
    pub sql_logging: Option<SqlLogging>,
    /// Label for this connection. Factories compiled for different labels are
    /// cached separately.
    pub connection_label: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            auto_select: true,
            query_timeout: None,
            sql_logging: Some(SqlLogging::default()),
            connection_label: String::new(),
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_select(mut self, enabled: bool) -> Self {
        self.auto_select = enabled;
        self
    }

    /// Queries exceeding this duration are cancelled and return
    /// [`crate::OrmError::Timeout`].
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn sql_logging(mut self, logging: SqlLogging) -> Self {
        self.sql_logging = Some(logging);
        self
    }

    pub fn disable_sql_logging(mut self) -> Self {
        self.sql_logging = None;
        self
    }

    pub fn connection_label(mut self, label: impl Into<String>) -> Self {
        self.connection_label = label.into();
        self
    }
}

/// `tracing` output for executed SQL, emitted under the `rowforge.sql` target.
#[derive(Debug, Clone)]
pub struct SqlLogging {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLogging {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl SqlLogging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => {
                let mut end = max;
                while end > 0 && !sql.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &sql[..end]).into()
            }
            _ => sql.into(),
        }
    }

    pub(crate) fn emit(&self, sql: &str, param_count: usize) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    _ => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate(sql);
        emit_at_level!(self.level, target: "rowforge.sql", param_count, sql = %sql);
    }
}

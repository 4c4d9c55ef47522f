//! Execution settings for [`InstrumentedDb`](crate::InstrumentedDb).

use std::time::Duration;

use tracing::Level;

/// Timeouts and statement logging.
///
/// The defaults apply no timeout, log every statement at `DEBUG` truncated to
/// 1000 bytes and never log argument values.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Statement timeout. `None` means no timeout.
    pub query_timeout: Option<Duration>,
    /// Statements slower than this are reported with a `warn` event.
    pub slow_query_threshold: Option<Duration>,
    /// Level of the per-statement event.
    pub log_level: Level,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    /// Include argument values in the per-statement event.
    pub log_params: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            slow_query_threshold: None,
            log_level: Level::DEBUG,
            max_sql_length: Some(1000),
            log_params: false,
        }
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel statements running longer than `timeout`.
    ///
    /// A timed-out statement fails with [`SqError::Timeout`](crate::SqError::Timeout).
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Log SQL text in full.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    /// Include argument values in statement events.
    ///
    /// Arguments may carry user data; leave this off outside development.
    pub fn log_params(mut self, enabled: bool) -> Self {
        self.log_params = enabled;
        self
    }

    /// `sql` cut to [`max_sql_length`](Self::max_sql_length) on a char boundary.
    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => {
                let mut end = max;
                while end > 0 && !sql.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &sql[..end])
            }
            _ => sql.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_params_out_of_logs() {
        let config = DbConfig::new();
        assert!(!config.log_params);
        assert_eq!(config.max_sql_length, Some(1000));
        assert_eq!(config.log_level, Level::DEBUG);
        assert!(config.query_timeout.is_none());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let config = DbConfig::new().with_max_sql_length(4);
        assert_eq!(config.truncate_sql("SELECT 1"), "SELE...");
        assert_eq!(config.truncate_sql("abc"), "abc");
        // 'é' is two bytes and straddles the limit
        assert_eq!(config.truncate_sql("abcé"), "abc...");
        assert_eq!(
            DbConfig::new().no_truncate().truncate_sql(&"x".repeat(2000)).len(),
            2000
        );
    }
}

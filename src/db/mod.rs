pub mod db_pool;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub const NO_QUERY_MESSAGE: &str = "No SQL query to execute.";
pub const EXECUTION_ERROR_PREFIX: &str = "Error executing SQL: ";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database is not configured")]
    Unavailable,

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("{0}")]
    Query(String),

    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<duckdb::Error> for DbError {
    fn from(e: duckdb::Error) -> Self {
        DbError::Query(e.to_string())
    }
}

/// Relational database the generated SQL runs against.
#[async_trait]
pub trait Database: Send + Sync {
    /// Runs one statement. `None` means it produced no rows.
    async fn run(&self, sql: &str) -> Result<Option<String>, DbError>;
}

/// Result of running generated SQL. Backend failures are carried as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    NoQuery,
    Rows(String),
    Empty,
    Failed(String),
}

impl ExecutionOutcome {
    /// Stringified form reported back to callers.
    pub fn render(&self) -> String {
        match self {
            ExecutionOutcome::NoQuery => NO_QUERY_MESSAGE.to_string(),
            ExecutionOutcome::Rows(text) => text.clone(),
            ExecutionOutcome::Empty => String::new(),
            ExecutionOutcome::Failed(message) => format!("{}{}", EXECUTION_ERROR_PREFIX, message),
        }
    }
}

/// Executes `sql` when a database is configured; execution errors never propagate.
pub async fn execute_sql(
    sql: &str,
    database: Option<&dyn Database>,
) -> Result<ExecutionOutcome, DbError> {
    let database = database.ok_or(DbError::Unavailable)?;

    let sql = sql.trim();
    if sql.is_empty() {
        return Ok(ExecutionOutcome::NoQuery);
    }

    debug!("Executing SQL: {}", sql);
    match database.run(sql).await {
        Ok(Some(rows)) => Ok(ExecutionOutcome::Rows(rows)),
        Ok(None) => Ok(ExecutionOutcome::Empty),
        Err(e) => {
            warn!("SQL execution failed: {}", e);
            Ok(ExecutionOutcome::Failed(e.to_string()))
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns one canned response for every statement and records what it ran.
    pub struct ScriptedDatabase {
        reply: Box<dyn Fn() -> Result<Option<String>, DbError> + Send + Sync>,
        statements: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedDatabase {
        pub fn rows(text: &str) -> Self {
            let text = text.to_string();
            Self::with(move || Ok(Some(text.clone())))
        }

        pub fn empty() -> Self {
            Self::with(|| Ok(None))
        }

        pub fn failing(message: &str) -> Self {
            let message = message.to_string();
            Self::with(move || Err(DbError::Query(message.clone())))
        }

        fn with(
            reply: impl Fn() -> Result<Option<String>, DbError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                reply: Box::new(reply),
                statements: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Database for ScriptedDatabase {
        async fn run(&self, sql: &str) -> Result<Option<String>, DbError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.statements.lock().unwrap().push(sql.to_string());
            (self.reply)()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedDatabase;
    use super::*;

    #[tokio::test]
    async fn missing_database_is_a_precondition_failure() {
        assert!(matches!(
            execute_sql("SELECT 1", None).await,
            Err(DbError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn blank_sql_is_not_sent_to_the_backend() {
        let db = ScriptedDatabase::rows("1");
        let outcome = execute_sql("  \n", Some(&db)).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::NoQuery);
        assert_eq!(outcome.render(), "No SQL query to execute.");
        assert_eq!(db.calls(), 0);
    }

    #[tokio::test]
    async fn backend_errors_become_failed_outcomes() {
        let db = ScriptedDatabase::failing("no such table: Albums");
        let outcome = execute_sql("SELECT * FROM Albums", Some(&db)).await.unwrap();
        assert_eq!(outcome.render(), "Error executing SQL: no such table: Albums");
    }

    #[tokio::test]
    async fn rows_and_empty_results_are_distinguished() {
        let db = ScriptedDatabase::rows("| Title |");
        let outcome = execute_sql(" SELECT Title FROM Album ", Some(&db)).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Rows("| Title |".to_string()));
        assert_eq!(db.statements(), vec!["SELECT Title FROM Album".to_string()]);

        let db = ScriptedDatabase::empty();
        let outcome = execute_sql("SELECT 1 WHERE false", Some(&db)).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Empty);
    }
}

use crate::config::DatabaseConfig;
use crate::db::{Database, DbError};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use async_trait::async_trait;
use duckdb::Connection;
use r2d2::{ManageConnection, Pool};
use tracing::{debug, info};

pub const IN_MEMORY: &str = ":memory:";

pub struct DuckDBConnectionManager {
    connection_string: String,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: String) -> Self {
        Self { connection_string }
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        if self.connection_string == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.connection_string)
        }
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// DuckDB file behind an r2d2 pool. Results come back as a pretty-printed table.
pub struct DuckDbDatabase {
    pool: Pool<DuckDBConnectionManager>,
}

impl DuckDbDatabase {
    pub fn new(config: &DatabaseConfig) -> Result<Self, DbError> {
        info!(
            "Initializing DuckDB connection pool for {}",
            config.connection_string
        );

        let manager = DuckDBConnectionManager::new(config.connection_string.clone());
        let builder = Pool::builder();

        // an in-memory database lives only as long as its single connection
        let builder = if config.connection_string == IN_MEMORY {
            builder.max_size(1).idle_timeout(None).max_lifetime(None)
        } else {
            builder.max_size(config.pool_size.max(1) as u32)
        };

        Ok(Self {
            pool: builder.build(manager)?,
        })
    }
}

fn run_blocking(conn: &Connection, sql: &str) -> Result<Option<String>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();

    let row_count: usize = batches.iter().map(|batch| batch.num_rows()).sum();
    debug!("Query returned {} rows", row_count);
    if row_count == 0 {
        return Ok(None);
    }

    let table = pretty_format_batches(&batches).map_err(|e| DbError::Query(e.to_string()))?;
    Ok(Some(table.to_string()))
}

#[async_trait]
impl Database for DuckDbDatabase {
    async fn run(&self, sql: &str) -> Result<Option<String>, DbError> {
        let pool = self.pool.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            run_blocking(&conn, &sql)
        })
        .await?
    }
}

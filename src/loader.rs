use std::fmt;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use sqlx::postgres::{PgArguments, PgConnectOptions};
use sqlx::query::Query;
use sqlx::{Connection, PgConnection, Postgres};
use tracing::{info, warn};

use crate::error::{EtlError, Result};
use crate::record::{Record, TABLE_COLUMNS};

pub const SCHEMA_NAME: &str = "war_data";
pub const TABLE_NAME: &str = "russian_ukrain_conflict";

/// Schema-qualified name of the table a run replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl Default for TableRef {
    fn default() -> Self {
        TableRef::new(SCHEMA_NAME, TABLE_NAME)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        TableRef {
            schema: schema.into(),
            table: table.into(),
        }
    }

    fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    pub fn create_schema_sql(&self) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&self.schema))
    }

    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified())
    }

    pub fn create_table_sql(&self) -> String {
        let mut cols = vec!["id SERIAL PRIMARY KEY".to_string()];
        cols.extend(
            TABLE_COLUMNS
                .iter()
                .map(|(name, ty)| format!("{} {}", quote_ident(name), ty)),
        );
        format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.qualified(),
            cols.join(",\n    ")
        )
    }

    pub fn insert_sql(&self) -> String {
        let names: Vec<String> = TABLE_COLUMNS.iter().map(|(n, _)| quote_ident(n)).collect();
        let params: Vec<String> = (1..=TABLE_COLUMNS.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified(),
            names.join(", "),
            params.join(", ")
        )
    }

    /// Statements that reset the table, in execution order.
    pub fn reset_statements(&self) -> [(&'static str, String); 3] {
        [
            ("create schema", self.create_schema_sql()),
            ("drop table", self.drop_table_sql()),
            ("create table", self.create_table_sql()),
        ]
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Destination that receives the full dataset and replaces what was there.
#[async_trait]
pub trait Sink {
    async fn load(&mut self, records: &[Record]) -> Result<u64>;
}

pub struct PgSink {
    options: PgConnectOptions,
    table: TableRef,
}

impl PgSink {
    pub fn new(options: PgConnectOptions, table: TableRef) -> Self {
        PgSink { options, table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

#[async_trait]
impl Sink for PgSink {
    async fn load(&mut self, records: &[Record]) -> Result<u64> {
        let mut conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(EtlError::Connect)?;
        info!("Connected to Postgres, replacing {}", self.table);

        let loaded = replace_table(&mut conn, &self.table, records).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Closing Postgres connection failed");
        }
        loaded
    }
}

/// Reset and repopulate the table inside one transaction. Any failure drops
/// the transaction uncommitted, leaving the previous table in place.
async fn replace_table(conn: &mut PgConnection, table: &TableRef, records: &[Record]) -> Result<u64> {
    let mut tx = conn.begin().await.map_err(EtlError::sql("begin transaction"))?;

    for (step, sql) in table.reset_statements() {
        sqlx::query(&sql)
            .execute(&mut *tx)
            .await
            .map_err(EtlError::sql(step))?;
    }

    let insert = table.insert_sql();
    let pb = progress_bar(records.len());
    let mut inserted = 0u64;

    for (i, record) in records.iter().enumerate() {
        let done = bind_record(sqlx::query(&insert), record)
            .execute(&mut *tx)
            .await
            .map_err(|source| {
                pb.abandon();
                warn!(row = i + 1, "Insert failed, rolling back");
                EtlError::Sql {
                    step: "insert row",
                    source,
                }
            })?;
        inserted += done.rows_affected();
        pb.inc(1);
    }
    pb.finish_and_clear();

    tx.commit().await.map_err(EtlError::sql("commit"))?;
    Ok(inserted)
}

fn bind_record<'q>(
    query: Query<'q, Postgres, PgArguments>,
    r: &'q Record,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(r.start)
        .bind(r.end)
        .bind(r.entry_date)
        .bind(r.country.as_deref())
        .bind(r.event.as_deref())
        .bind(r.oblast.as_deref())
        .bind(r.casualties)
        .bind(r.injured)
        .bind(r.captured)
        .bind(r.civilian_casualties)
        .bind(r.new_recruits)
        .bind(r.combat_intensity)
        .bind(r.territory_status.as_deref())
        .bind(r.percentage_occupied)
        .bind(r.area_occupied)
        .bind(r.total_soldiers_casualties)
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} rows ({per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb
}

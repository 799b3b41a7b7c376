use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch data. Status code {status}")]
    Fetch { status: u16 },

    #[error("could not read CSV export")]
    Csv(#[from] csv::Error),

    #[error("CSV header is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("could not connect to Postgres")]
    Connect(#[source] sqlx::Error),

    #[error("{step} failed")]
    Sql {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl EtlError {
    pub(crate) fn sql(step: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| EtlError::Sql { step, source }
    }
}

/// Why a single data row was dropped by the transformer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("column {column:?}: {value:?} is not {expected}")]
    Invalid {
        column: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("total soldiers casualties overflows an integer column")]
    Overflow,

    #[error("unreadable row: {0}")]
    Decode(String),
}

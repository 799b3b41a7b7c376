use std::fmt;
use std::path::Path;

use ::config::{Config, Environment};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use tracing::debug;

use crate::error::Result;
use crate::fetcher::{KoboSource, KOBO_CSV_URL};

/// `KOBOTOOLBOX_USERNAME`, `KOBOTOOLBOX_PASSWORD`, optional `KOBO_CSV_URL`.
#[derive(Clone, Deserialize)]
pub struct KoboSettings {
    pub kobotoolbox_username: String,
    pub kobotoolbox_password: String,
    #[serde(default = "default_csv_url")]
    pub kobo_csv_url: String,
}

/// `PG_HOST`, `PG_PORT` (default 5432), `PG_DATABASE`, `PG_USER`, `PG_PASSWORD`.
#[derive(Clone, Deserialize)]
pub struct PgSettings {
    pub pg_host: String,
    #[serde(default = "default_pg_port")]
    pub pg_port: u16,
    pub pg_database: String,
    pub pg_user: String,
    pub pg_password: String,
}

fn default_csv_url() -> String {
    KOBO_CSV_URL.to_string()
}

fn default_pg_port() -> u16 {
    5432
}

/// Deserialize a settings struct from the process environment. Variable
/// names are matched case-insensitively against field names.
pub fn from_env<T: DeserializeOwned>() -> Result<T> {
    from_environment(Environment::default())
}

fn from_environment<T: DeserializeOwned>(env: Environment) -> Result<T> {
    let settings = Config::builder().add_source(env).build()?.try_deserialize()?;
    Ok(settings)
}

impl KoboSettings {
    pub fn source(&self) -> KoboSource {
        KoboSource::new(
            self.kobo_csv_url.clone(),
            self.kobotoolbox_username.clone(),
            self.kobotoolbox_password.clone(),
        )
    }
}

impl PgSettings {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.pg_host)
            .port(self.pg_port)
            .database(&self.pg_database)
            .username(&self.pg_user)
            .password(&self.pg_password)
    }
}

impl fmt::Debug for KoboSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KoboSettings")
            .field("kobotoolbox_username", &self.kobotoolbox_username)
            .field("kobotoolbox_password", &"***")
            .field("kobo_csv_url", &self.kobo_csv_url)
            .finish()
    }
}

impl fmt::Debug for PgSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSettings")
            .field("pg_host", &self.pg_host)
            .field("pg_port", &self.pg_port)
            .field("pg_database", &self.pg_database)
            .field("pg_user", &self.pg_user)
            .field("pg_password", &"***")
            .finish()
    }
}

/// Seed the environment from a dotenv file. An explicit path must exist;
/// the implicit `./.env` is optional.
pub fn load_dotenv(path: Option<&Path>) -> std::result::Result<(), dotenvy::Error> {
    match path {
        Some(p) => {
            dotenvy::from_path(p)?;
            debug!("Loaded environment from {:?}", p);
        }
        None => {
            if let Ok(p) = dotenvy::dotenv() {
                debug!("Loaded environment from {:?}", p);
            }
        }
    }
    Ok(())
}

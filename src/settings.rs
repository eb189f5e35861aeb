//! Process configuration.
//!
//! Values are layered: built-in defaults, then an optional file, then
//! `SIPHON_*` environment variables (`SIPHON_PORT=8080`).

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Path of the schema definition file.
    pub schema: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Settings {
    /// Loads settings from `path` when given, otherwise from `siphon.toml`
    /// (or `.json`, `.yaml`) in the working directory if there is one.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name("siphon").required(false),
        };
        let settings = Config::builder()
            .set_default("schema", "db.schema")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 7913_i64)?
            .set_default("log_level", "info")?
            .add_source(file)
            .add_source(Environment::with_prefix("SIPHON").try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// The `host:port` address to listen on.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

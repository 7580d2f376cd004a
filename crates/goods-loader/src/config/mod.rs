//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;
use std::time::Duration;
use tokio_postgres::Config as PgConfig;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl DatabaseConfig {
    /// Build a tokio-postgres config for the given database name.
    pub fn pg_config(&self, dbname: &str) -> PgConfig {
        let mut pg_config = PgConfig::new();
        pg_config.host(&self.host);
        pg_config.port(self.port);
        pg_config.dbname(dbname);
        pg_config.user(&self.user);
        pg_config.password(&self.password);
        pg_config.application_name("goods-loader");
        pg_config.connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        pg_config
    }

    /// Connection config for the target database.
    pub fn target_pg_config(&self) -> PgConfig {
        self.pg_config(&self.database)
    }

    /// Connection config for the maintenance database.
    pub fn maintenance_pg_config(&self) -> PgConfig {
        self.pg_config(&self.maintenance_database)
    }
}

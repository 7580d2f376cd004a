//! Configuration validation.

use super::Config;
use crate::error::{GoodsError, Result};
use crate::target::tls::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let db = &config.database;
    if db.host.is_empty() {
        return Err(GoodsError::Config("database.host is required".into()));
    }
    if db.port == 0 {
        return Err(GoodsError::Config("database.port must be non-zero".into()));
    }
    if db.database.is_empty() {
        return Err(GoodsError::Config("database.database is required".into()));
    }
    if db.user.is_empty() {
        return Err(GoodsError::Config("database.user is required".into()));
    }
    if db.maintenance_database.is_empty() {
        return Err(GoodsError::Config(
            "database.maintenance_database must not be empty".into(),
        ));
    }
    SslMode::parse(&db.ssl_mode)?;

    let tables = &config.tables;
    if tables.schema.is_empty() {
        return Err(GoodsError::Config("tables.schema must not be empty".into()));
    }
    if tables.goods.is_empty() || tables.stock.is_empty() {
        return Err(GoodsError::Config(
            "tables.goods and tables.stock must not be empty".into(),
        ));
    }
    if tables.goods == tables.stock {
        return Err(GoodsError::Config(format!(
            "tables.goods and tables.stock must differ, both are '{}'",
            tables.goods
        )));
    }

    if config.input.data_path.as_os_str().is_empty() {
        return Err(GoodsError::Config("input.data_path must not be empty".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, InputConfig, TableConfig};

    fn valid_config() -> Config {
        Config {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "les_sql_19".to_string(),
                user: "postgres".to_string(),
                password: "password".to_string(),
                maintenance_database: "postgres".to_string(),
                ssl_mode: "disable".to_string(),
                connect_timeout_secs: 30,
            },
            input: InputConfig::default(),
            tables: TableConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.database.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_database() {
        let mut config = valid_config();
        config.database.database = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_port() {
        let mut config = valid_config();
        config.database.port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.database.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_table_names() {
        let mut config = valid_config();
        config.tables.stock = config.tables.goods.clone();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_database_config_debug_redacts_password() {
        let mut config = valid_config();
        config.database.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.database);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}

//! Error types for the goods loader.

use thiserror::Error;

/// Exit code for successful runs.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for rejected or unmappable input documents.
pub const EXIT_VALIDATION_ERROR: u8 = 2;
/// Exit code for database provisioning failures.
pub const EXIT_PROVISIONING_ERROR: u8 = 3;
/// Exit code for table/constraint creation failures.
pub const EXIT_SCHEMA_ERROR: u8 = 4;
/// Exit code for failed upserts.
pub const EXIT_WRITE_ERROR: u8 = 5;
/// Exit code for connection and pool failures.
pub const EXIT_CONNECTION_ERROR: u8 = 6;
/// Exit code for file I/O failures.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for loader operations.
#[derive(Error, Debug)]
pub enum GoodsError {
    /// Input document is unparseable or does not conform to the schema.
    #[error("Input data is invalid: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    /// Validated document could not be converted into records.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Target database could not be created.
    #[error("Failed to provision database {database}: {message}")]
    Provisioning { database: String, message: String },

    /// Tables or constraints could not be created.
    #[error("Schema error: {0}")]
    Schema(String),

    /// An upsert failed; the transaction was not committed.
    #[error("Write failed for table {table}: {message}")]
    Write { table: String, message: String },

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GoodsError {
    /// Create a Validation error from a single message.
    pub fn validation(message: impl Into<String>) -> Self {
        GoodsError::Validation {
            errors: vec![message.into()],
        }
    }

    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        GoodsError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Provisioning error
    pub fn provisioning(database: impl Into<String>, message: impl ToString) -> Self {
        GoodsError::Provisioning {
            database: database.into(),
            message: message.to_string(),
        }
    }

    /// Create a Schema error
    pub fn schema(message: impl ToString) -> Self {
        GoodsError::Schema(message.to_string())
    }

    /// Create a Write error
    pub fn write(table: impl Into<String>, message: impl ToString) -> Self {
        GoodsError::Write {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            GoodsError::Config(_) | GoodsError::Yaml(_) => EXIT_CONFIG_ERROR,
            GoodsError::Validation { .. } | GoodsError::Mapping(_) => EXIT_VALIDATION_ERROR,
            GoodsError::Provisioning { .. } => EXIT_PROVISIONING_ERROR,
            GoodsError::Schema(_) => EXIT_SCHEMA_ERROR,
            GoodsError::Write { .. } => EXIT_WRITE_ERROR,
            GoodsError::Pool { .. } | GoodsError::Target(_) => EXIT_CONNECTION_ERROR,
            GoodsError::Io(_) => EXIT_IO_ERROR,
            // Result serialization is the only JSON failure that reaches here.
            GoodsError::Json(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, GoodsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(GoodsError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(GoodsError::validation("x").exit_code(), EXIT_VALIDATION_ERROR);
        assert_eq!(GoodsError::Mapping("x".into()).exit_code(), EXIT_VALIDATION_ERROR);
        assert_eq!(
            GoodsError::provisioning("db", "x").exit_code(),
            EXIT_PROVISIONING_ERROR
        );
        assert_eq!(GoodsError::schema("x").exit_code(), EXIT_SCHEMA_ERROR);
        assert_eq!(GoodsError::write("goods", "x").exit_code(), EXIT_WRITE_ERROR);
        assert_eq!(GoodsError::pool("x", "ctx").exit_code(), EXIT_CONNECTION_ERROR);

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(GoodsError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_validation_message_joins_errors() {
        let err = GoodsError::Validation {
            errors: vec!["(root): \"name\" is a required property".into(), "/id: oops".into()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Input data is invalid: "));
        assert!(msg.contains("\"name\" is a required property; /id: oops"));
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "goods.data.json");
        let err = GoodsError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: goods.data.json"));
    }
}

//! JSON Schema validation of the input document.
//!
//! Parse failures and schema violations are both reported as
//! [`GoodsError::Validation`]; callers must not touch the store after either.
//! A missing or unreadable file is an I/O error instead.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::InputConfig;
use crate::error::{GoodsError, Result};
use crate::mapper;
use crate::model::GoodDocument;

/// Draft-07 schema for goods documents, used when no schema file is configured.
pub const BUILTIN_SCHEMA: &str = include_str!("../schemas/goods.schema.json");

/// Check `data` against `schema`, collecting every violation.
pub fn validate(schema: &Value, data: &Value) -> Result<()> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| GoodsError::validation(format!("schema does not compile: {}", e)))?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| {
            let path = e.instance_path.to_string();
            let path = if path.is_empty() { "(root)".to_string() } else { path };
            format!("{}: {}", path, e)
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(GoodsError::Validation { errors })
    }
}

/// Boolean form of [`validate`].
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    validate(schema, data).is_ok()
}

/// Parse a JSON document from text.
pub fn parse_document(text: &str, origin: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| GoodsError::validation(format!("{} is not valid JSON: {}", origin, e)))
}

/// Read and parse a JSON document from disk.
pub fn load_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    parse_document(&text, &path.display().to_string())
}

/// Load the configured schema, or the built-in one.
pub fn load_schema(input: &InputConfig) -> Result<Value> {
    match &input.schema_path {
        Some(path) => {
            debug!("Loading schema from {:?}", path);
            load_document(path)
        }
        None => {
            debug!("Using built-in goods schema");
            parse_document(BUILTIN_SCHEMA, "built-in schema")
        }
    }
}

/// Load both documents, validate, and deserialize into a [`GoodDocument`].
pub fn load_and_validate(input: &InputConfig) -> Result<GoodDocument> {
    let schema = load_schema(input)?;
    let data = load_document(&input.data_path)?;
    validate(&schema, &data)?;
    info!("Input data from {:?} is valid", input.data_path);
    mapper::document_from_value(&data)
}

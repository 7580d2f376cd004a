//! Input document and relational record types.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Typed goods document, as read from the data file.
///
/// Every field is required; deserialization fails rather than defaulting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodDocument {
    #[serde(deserialize_with = "whole_number")]
    pub id: i64,
    pub name: String,
    pub package_params: PackageParams,
    pub location_and_quantity: Vec<LocationQuantity>,
}

/// Package dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackageParams {
    pub height: f64,
    pub width: f64,
}

/// Stock count at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationQuantity {
    pub location: String,
    #[serde(deserialize_with = "whole_number")]
    pub amount: i64,
}

/// JSON Schema counts `5.0` as an integer, so accept floats with no fraction.
fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(i) = number.as_i64() {
        return Ok(i);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        _ => Err(D::Error::custom(format!(
            "expected a whole number, found {}",
            number
        ))),
    }
}

/// Row of the goods table. `id` is supplied by the document, never generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodRecord {
    pub id: i32,
    pub name: String,
    pub package_height: f64,
    pub package_width: f64,
}

/// Row of the stock table, unique on `(good_id, location)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub good_id: i32,
    pub location: String,
    pub amount: i32,
}

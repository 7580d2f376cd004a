//! Conversion of a validated goods document into relational records.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{GoodsError, Result};
use crate::model::{GoodDocument, GoodRecord, StockRecord};

/// Deserialize a document into its typed form.
///
/// Missing or mistyped keys are a mapping error; nothing is defaulted.
pub fn document_from_value(value: &Value) -> Result<GoodDocument> {
    GoodDocument::deserialize(value).map_err(|e| GoodsError::Mapping(e.to_string()))
}

/// Split a document into one goods row and one stock row per location entry.
pub fn to_records(doc: &GoodDocument) -> Result<(GoodRecord, Vec<StockRecord>)> {
    let id = narrow(doc.id, "id")?;

    let good = GoodRecord {
        id,
        name: doc.name.clone(),
        package_height: doc.package_params.height,
        package_width: doc.package_params.width,
    };

    let stock = doc
        .location_and_quantity
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            Ok(StockRecord {
                good_id: id,
                location: entry.location.clone(),
                amount: narrow(entry.amount, &format!("location_and_quantity[{}].amount", i))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((good, stock))
}

/// Narrow a JSON integer to the store's 32-bit INTEGER column.
fn narrow(value: i64, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        GoodsError::Mapping(format!(
            "{} = {} does not fit a 32-bit integer column",
            field, value
        ))
    })
}

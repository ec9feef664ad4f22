use serde::Serialize;
use serde_json::Value;

use crate::store::Record;

pub mod ad;
pub mod couple;
pub mod job;
pub mod user;

/// Serializes a typed row into the generic record shape; `None` fields are
/// left out so the column default applies.
pub fn to_record<T: Serialize>(row: &T) -> Result<Record, serde_json::Error> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        ))),
    }
}

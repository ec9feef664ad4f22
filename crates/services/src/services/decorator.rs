use db::store::{Record, key_string};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reference_resolver::{JoinSpec, ReferenceMap};

/// A primary record merged with its resolved references. Lives for one
/// request and is never written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewModel(Record);

impl ViewModel {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn fields(&self) -> &Record {
        &self.0
    }

    pub fn into_record(self) -> Record {
        self.0
    }
}

impl From<Record> for ViewModel {
    fn from(record: Record) -> Self {
        ViewModel(record)
    }
}

/// Sets every join's target field from `refs`, or its placeholder when the
/// key is null, missing or unresolved.
pub fn decorate(record: Record, joins: &[JoinSpec], refs: &ReferenceMap) -> ViewModel {
    let mut view = ViewModel(record);
    for join in joins {
        let display = key_string(view.get(join.key_field))
            .and_then(|key| refs.get(join.target_field, &key).map(str::to_string))
            .unwrap_or_else(|| join.placeholder.to_string());
        view.set(join.target_field, Value::String(display));
    }
    view
}

#[cfg(test)]
mod tests {
    use db::store::Table;
    use serde_json::json;

    use super::*;
    use crate::services::reference_resolver::{JoinPath, UNKNOWN};

    fn joins() -> Vec<JoinSpec> {
        vec![
            JoinSpec::new("vendor_name", "vendor_id", JoinPath::to(Table::Vendors, "id").display("business_name")),
            JoinSpec::new("couple_name", "couple_id", JoinPath::to(Table::Couples, "id")).placeholder(UNKNOWN),
        ]
    }

    #[test]
    fn test_resolved_references_are_merged() {
        let mut refs = ReferenceMap::default();
        refs.insert("vendor_name", "v1".to_string(), "Bloom Florals".to_string());
        refs.insert("couple_name", "c1".to_string(), "Ana & Luis".to_string());

        let record = json!({ "id": "j1", "vendor_id": "v1", "couple_id": "c1", "title": "Flowers" });
        let view = decorate(record.as_object().cloned().unwrap(), &joins(), &refs);

        assert_eq!(view.get_str("vendor_name"), Some("Bloom Florals"));
        assert_eq!(view.get_str("couple_name"), Some("Ana & Luis"));
        assert_eq!(view.get_str("title"), Some("Flowers"));
        assert_eq!(view.get_str("vendor_id"), Some("v1"));
    }

    #[test]
    fn test_null_reference_gets_placeholder_never_null() {
        let refs = ReferenceMap::default();
        let record = json!({ "id": "j1", "vendor_id": null });
        let view = decorate(record.as_object().cloned().unwrap(), &joins(), &refs);

        assert_eq!(view.get("vendor_name"), Some(&json!("N/A")));
        assert_eq!(view.get("couple_name"), Some(&json!("Unknown")));
    }

    #[test]
    fn test_unresolved_reference_gets_placeholder() {
        let mut refs = ReferenceMap::default();
        refs.insert("vendor_name", "other".to_string(), "Someone".to_string());
        let record = json!({ "vendor_id": "v404" });
        let view = decorate(record.as_object().cloned().unwrap(), &joins(), &refs);
        assert_eq!(view.get_str("vendor_name"), Some("N/A"));
    }

    #[test]
    fn test_view_model_serializes_as_flat_object() {
        let view = ViewModel::from(json!({ "id": "x", "name": "y" }).as_object().cloned().unwrap());
        assert_eq!(serde_json::to_value(&view).unwrap(), json!({ "id": "x", "name": "y" }));
    }
}

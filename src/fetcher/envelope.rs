use serde::Deserialize;
use serde_json::Value;

/// Top-level shape of every SportMonks response.
#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub per_page: Option<u64>,
    #[serde(default)]
    pub current_page: Option<u64>,
    #[serde(default)]
    pub has_more: bool,
}

impl Envelope {
    /// True only when the server says another page exists.
    pub fn has_more(&self) -> bool {
        self.pagination.as_ref().is_some_and(|p| p.has_more)
    }

    /// `data` as a batch: arrays pass through, a lone object becomes a
    /// one-element batch, null or missing becomes empty.
    pub fn into_records(self) -> Vec<Value> {
        into_batch(self.data)
    }

    /// `data` as a single object, if it is one.
    pub fn into_object(self) -> Option<Value> {
        match self.data {
            Some(v @ Value::Object(_)) => Some(v),
            Some(Value::Array(mut items)) if items.len() == 1 => items.pop(),
            _ => None,
        }
    }
}

/// Normalize an embedded relation (`odds`, `tvstations`, ...) the same way
/// `data` is normalized.
pub fn into_batch(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> Envelope {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn array_data_passes_through() {
        let env = parse(json!({"data": [{"id": 1}, {"id": 2}], "pagination": {"has_more": true}}));
        assert!(env.has_more());
        assert_eq!(env.into_records().len(), 2);
    }

    #[test]
    fn single_object_becomes_one_element_batch() {
        let env = parse(json!({"data": {"id": 7}}));
        assert!(!env.has_more());
        let records = env.into_records();
        assert_eq!(records, vec![json!({"id": 7})]);
    }

    #[test]
    fn missing_or_null_data_is_empty() {
        assert!(parse(json!({})).into_records().is_empty());
        assert!(parse(json!({"data": null})).into_records().is_empty());
    }

    #[test]
    fn pagination_without_has_more_means_last_page() {
        let env = parse(json!({"data": [], "pagination": {"count": 0, "per_page": 50, "current_page": 1}}));
        assert!(!env.has_more());
    }

    #[test]
    fn into_object_unwraps_single_element_arrays() {
        assert_eq!(parse(json!({"data": [{"id": 3}]})).into_object(), Some(json!({"id": 3})));
        assert_eq!(parse(json!({"data": [{"id": 3}, {"id": 4}]})).into_object(), None);
    }
}

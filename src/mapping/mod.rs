//! Raw API record → typed row conversion.
//!
//! Every job is parameterized by a `RecordMapper`, so the paginator and
//! the upsert path stay resource-agnostic.

pub mod fixture;
pub mod odds;
pub mod reference;

use serde_json::Value;
use tracing::debug;

pub use fixture::{FixtureMapper, FixtureRecord};
pub use odds::OddsMapper;
pub use reference::{
    CountryMapper, FixtureTvMapper, LeagueMapper, LeagueRecord, TeamMapper, TvStationMapper,
};

/// Anything that can turn one raw JSON record into a typed row.
pub trait RecordMapper {
    type Row;

    /// `None` when the record is structurally unusable (no id, no name, ...).
    fn map(&self, raw: &Value) -> Option<Self::Row>;

    fn map_all(&self, raw: &[Value]) -> Vec<Self::Row> {
        let rows: Vec<Self::Row> = raw.iter().filter_map(|r| self.map(r)).collect();
        let skipped = raw.len() - rows.len();
        if skipped > 0 {
            debug!(skipped, "[MAP] dropped {skipped} unusable records");
        }
        rows
    }
}

/// Integer field; tolerates floats (truncated) and numeric strings.
pub(crate) fn int(v: &Value, key: &str) -> Option<i64> {
    let field = v.get(key)?;
    field
        .as_i64()
        .or_else(|| field.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        .or_else(|| field.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Text field; numbers are rendered as text (odds values come both ways).
pub(crate) fn text(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn flag(v: &Value, key: &str) -> Option<bool> {
    let field = v.get(key)?;
    field.as_bool().or_else(|| field.as_i64().map(|n| n != 0))
}

/// Embedded object, skipping nulls.
pub(crate) fn object<'v>(v: &'v Value, key: &str) -> Option<&'v Value> {
    v.get(key).filter(|o| o.is_object())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_accepts_numbers_and_numeric_strings() {
        let v = json!({"a": 5, "b": "17", "c": "x", "d": null});
        assert_eq!(int(&v, "a"), Some(5));
        assert_eq!(int(&v, "b"), Some(17));
        assert_eq!(int(&v, "c"), None);
        assert_eq!(int(&v, "d"), None);
        assert_eq!(int(&v, "missing"), None);
    }

    #[test]
    fn int_truncates_float_numbers() {
        let v = json!({"goals": 2.0, "half": 1.5});
        assert_eq!(int(&v, "goals"), Some(2));
        assert_eq!(int(&v, "half"), Some(1));
    }

    #[test]
    fn text_renders_numbers() {
        let v = json!({"value": 2.1, "label": "Home"});
        assert_eq!(text(&v, "value").as_deref(), Some("2.1"));
        assert_eq!(text(&v, "label").as_deref(), Some("Home"));
    }

    #[test]
    fn map_all_drops_unusable_records() {
        let raw = vec![json!({"id": 1, "name": "Sky"}), json!({"name": "no id"})];
        let rows = TvStationMapper.map_all(&raw);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
    }
}

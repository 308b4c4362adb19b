use serde_json::Value;

use crate::db::models::{BookmakerRow, OddRow};
use crate::mapping::{int, object, text, RecordMapper};

#[derive(Debug, Clone, PartialEq)]
pub struct OddRecord {
    pub odd: OddRow,
    /// Full row when the bookmaker was embedded, a stub when only its id was.
    pub bookmaker: Option<BookmakerRow>,
}

/// Maps entries of a fixture's `odds` include, tagging each with the
/// fixture it was fetched for.
#[derive(Debug, Clone, Copy)]
pub struct OddsMapper {
    fixture_id: i64,
}

impl OddsMapper {
    pub fn new(fixture_id: i64) -> Self {
        Self { fixture_id }
    }
}

impl RecordMapper for OddsMapper {
    type Row = OddRecord;

    fn map(&self, raw: &Value) -> Option<OddRecord> {
        let id = int(raw, "id")?;

        let bookmaker = match object(raw, "bookmaker") {
            Some(embedded) => int(embedded, "id").map(|bid| match text(embedded, "name") {
                Some(name) => BookmakerRow {
                    id: bid,
                    name,
                    url: text(embedded, "url"),
                    image_path: text(embedded, "image_path"),
                    stub: false,
                },
                None => BookmakerRow::stub(bid),
            }),
            None => int(raw, "bookmaker_id").map(BookmakerRow::stub),
        };

        Some(OddRecord {
            odd: OddRow {
                id,
                fixture_id: self.fixture_id,
                bookmaker_id: bookmaker.as_ref().map(|b| b.id),
                market_id: int(raw, "market_id"),
                label: text(raw, "label"),
                value: text(raw, "value"),
                probability: text(raw, "probability"),
                latest_bookmaker_update: text(raw, "latest_bookmaker_update"),
            },
            bookmaker,
        })
    }
}

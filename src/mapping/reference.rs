use serde_json::Value;

use crate::config::DEFAULT_LINK_COUNTRY_ID;
use crate::db::models::{CountryRow, FixtureTvStationRow, LeagueRow, TeamRow, TvStationRow};
use crate::mapping::{int, object, text, RecordMapper};

#[derive(Debug, Clone, PartialEq)]
pub struct LeagueRecord {
    pub league: LeagueRow,
    pub country: Option<CountryRow>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeagueMapper;

impl RecordMapper for LeagueMapper {
    type Row = LeagueRecord;

    fn map(&self, raw: &Value) -> Option<LeagueRecord> {
        let country = object(raw, "country").and_then(|c| CountryMapper.map(c));
        Some(LeagueRecord {
            league: LeagueRow {
                id: int(raw, "id")?,
                name: text(raw, "name")?,
                sport_id: int(raw, "sport_id"),
                country_id: int(raw, "country_id").or(country.as_ref().map(|c| c.id)),
                image_path: text(raw, "image_path"),
            },
            country,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CountryMapper;

impl RecordMapper for CountryMapper {
    type Row = CountryRow;

    fn map(&self, raw: &Value) -> Option<CountryRow> {
        Some(CountryRow {
            id: int(raw, "id")?,
            name: text(raw, "name")?,
            image_path: text(raw, "image_path"),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TeamMapper;

impl RecordMapper for TeamMapper {
    type Row = TeamRow;

    fn map(&self, raw: &Value) -> Option<TeamRow> {
        Some(TeamRow {
            id: int(raw, "id")?,
            name: text(raw, "name")?,
            short_code: text(raw, "short_code"),
            country_id: int(raw, "country_id"),
            venue_id: int(raw, "venue_id"),
            image_path: text(raw, "image_path"),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TvStationMapper;

impl RecordMapper for TvStationMapper {
    type Row = TvStationRow;

    fn map(&self, raw: &Value) -> Option<TvStationRow> {
        Some(TvStationRow {
            id: int(raw, "id")?,
            name: text(raw, "name")?,
            url: text(raw, "url"),
            image_path: text(raw, "image_path"),
            kind: text(raw, "type"),
            stub: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureTvRecord {
    pub link: FixtureTvStationRow,
    pub station: TvStationRow,
}

/// Maps entries of a fixture's `tvstations` include. The station id is
/// `tvstation_id` when present, else the entry's own `id`.
#[derive(Debug, Clone, Copy)]
pub struct FixtureTvMapper {
    fixture_id: i64,
}

impl FixtureTvMapper {
    pub fn new(fixture_id: i64) -> Self {
        Self { fixture_id }
    }
}

impl RecordMapper for FixtureTvMapper {
    type Row = FixtureTvRecord;

    fn map(&self, raw: &Value) -> Option<FixtureTvRecord> {
        let tvstation_id = int(raw, "tvstation_id").or_else(|| int(raw, "id"))?;
        let station = object(raw, "tvstation")
            .and_then(|s| TvStationMapper.map(s))
            .filter(|s| s.id == tvstation_id)
            .unwrap_or_else(|| TvStationRow::stub(tvstation_id));

        Some(FixtureTvRecord {
            link: FixtureTvStationRow {
                fixture_id: self.fixture_id,
                tvstation_id,
                country_id: Some(int(raw, "country_id").unwrap_or(DEFAULT_LINK_COUNTRY_ID)),
            },
            station,
        })
    }
}

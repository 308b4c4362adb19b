use std::collections::BTreeMap;

use serde_json::Value;

use crate::db::models::{FixtureRow, LeagueRow, TeamRow};
use crate::mapping::{flag, int, object, text, LeagueMapper, RecordMapper, TeamMapper};

/// A fixture plus the parents embedded in the same response.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRecord {
    pub fixture: FixtureRow,
    pub league: Option<LeagueRow>,
    pub teams: Vec<TeamRow>,
}

/// Maps a `fixtures/between` record fetched with
/// `include=participants;scores;league;venue;state`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureMapper;

impl RecordMapper for FixtureMapper {
    type Row = FixtureRecord;

    fn map(&self, raw: &Value) -> Option<FixtureRecord> {
        let id = int(raw, "id")?;

        let mut home_team_id = None;
        let mut away_team_id = None;
        let mut teams = Vec::new();
        for participant in participants(raw) {
            let location = participant
                .get("meta")
                .and_then(|m| m.get("location"))
                .and_then(Value::as_str);
            match location {
                Some("home") => home_team_id = int(participant, "id"),
                Some("away") => away_team_id = int(participant, "id"),
                _ => {}
            }
            if let Some(team) = TeamMapper.map(participant) {
                teams.push(team);
            }
        }

        let league = object(raw, "league")
            .and_then(|l| LeagueMapper.map(l))
            .map(|record| record.league);

        let (home_score, away_score) = extract_scores(raw);

        Some(FixtureRecord {
            fixture: FixtureRow {
                id,
                league_id: int(raw, "league_id").or(league.as_ref().map(|l| l.id)),
                season_id: int(raw, "season_id"),
                round_id: int(raw, "round_id"),
                venue_id: int(raw, "venue_id"),
                home_team_id,
                away_team_id,
                name: text(raw, "name"),
                starting_at: text(raw, "starting_at"),
                starting_at_timestamp: int(raw, "starting_at_timestamp"),
                has_odds: flag(raw, "has_odds"),
                has_premium_odds: flag(raw, "has_premium_odds"),
                state_id: int(raw, "state_id"),
                home_score,
                away_score,
            },
            league,
            teams,
        })
    }
}

impl FixtureRecord {
    /// Split a chunk of records into de-duplicated parents and the fixtures,
    /// in the order they must be written.
    pub fn split(records: &[FixtureRecord]) -> (Vec<LeagueRow>, Vec<TeamRow>, Vec<FixtureRow>) {
        let mut leagues = BTreeMap::new();
        let mut teams = BTreeMap::new();
        let mut fixtures = Vec::with_capacity(records.len());
        for record in records {
            if let Some(league) = &record.league {
                leagues.insert(league.id, league.clone());
            }
            for team in &record.teams {
                teams.insert(team.id, team.clone());
            }
            fixtures.push(record.fixture.clone());
        }
        (
            leagues.into_values().collect(),
            teams.into_values().collect(),
            fixtures,
        )
    }
}

fn participants<'v>(raw: &'v Value) -> impl Iterator<Item = &'v Value> + 'v {
    raw.get("participants")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Score descriptions tried in order while either side is still unknown.
const SCORE_FALLBACK: [&str; 3] = ["CURRENT", "2ND_HALF", "1ST_HALF"];

/// Derive `(home, away)` goals from the `scores` include.
///
/// `CURRENT` is read first; while either side is still missing, every
/// `2ND_HALF` entry is applied, then every `1ST_HALF` entry. A later tier
/// may overwrite a side an earlier tier already set. The order mirrors the
/// provider's status semantics as observed, not a documented contract.
pub fn extract_scores(raw: &Value) -> (Option<i64>, Option<i64>) {
    let Some(scores) = raw.get("scores").and_then(Value::as_array) else {
        return (None, None);
    };

    let mut home = None;
    let mut away = None;
    for (tier, description) in SCORE_FALLBACK.iter().enumerate() {
        if tier > 0 && home.is_some() && away.is_some() {
            break;
        }
        let entries = scores
            .iter()
            .filter(|s| s.get("description").and_then(Value::as_str) == Some(*description));
        for entry in entries {
            let Some(score) = entry.get("score") else { continue };
            let Some(goals) = int(score, "goals") else { continue };
            match score.get("participant").and_then(Value::as_str) {
                Some("home") => home = Some(goals),
                Some("away") => away = Some(goals),
                _ => {}
            }
        }
    }
    (home, away)
}

use std::collections::{BTreeMap, HashSet};
use std::pin::pin;

use chrono::NaiveDate;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{Config, FIXTURE_INCLUDES, LIVE_INCLUDES, REFERENCE_PAGE_SIZE};
use crate::db::gaps::{self, ChildRelation};
use crate::db::models::{BookmakerRow, CountryRow, TvStationRow};
use crate::db::{DbWriter, UpsertBatch};
use crate::error::Result;
use crate::fetcher::envelope::into_batch;
use crate::fetcher::{ApiClient, Paginator};
use crate::mapping::{
    int, object, CountryMapper, FixtureMapper, FixtureRecord, FixtureTvMapper, LeagueMapper,
    LeagueRecord, OddsMapper, RecordMapper, TeamMapper, TvStationMapper,
};
use crate::sync::watermark::fetch_window;
use crate::types::SyncReport;

/// Decides what is missing locally, fetches it, and upserts it batch by batch.
pub struct SyncDriver {
    cfg: Config,
    client: ApiClient,
    writer: DbWriter,
}

impl SyncDriver {
    pub fn new(cfg: Config, client: ApiClient, writer: DbWriter) -> Self {
        Self { cfg, client, writer }
    }

    /// leagues → tv stations → fixtures → live → odds → tv links. A failing job is
    /// logged and the next one still runs.
    pub async fn run_all(&self, today: NaiveDate, horizon: NaiveDate) -> SyncReport {
        let mut total = SyncReport::default();

        let leagues = self.sync_leagues().await;
        absorb(&mut total, "leagues", leagues);
        let stations = self.sync_tv_stations().await;
        absorb(&mut total, "tvstations", stations);
        let fixtures = self.sync_fixtures(today, horizon).await;
        absorb(&mut total, "fixtures", fixtures);
        let live = self.refresh_live(today).await;
        absorb(&mut total, "live", live);
        let odds = self.fill_missing(ChildRelation::Odds, today).await;
        absorb(&mut total, "odds", odds);
        let tv = self.fill_missing(ChildRelation::TvStations, today).await;
        absorb(&mut total, "tv", tv);

        total
    }

    // -----------------------------------------------------------------------
    // Fixtures by date range
    // -----------------------------------------------------------------------

    /// Fetch every fixture between the stored watermark and `horizon`.
    pub async fn sync_fixtures(&self, today: NaiveDate, horizon: NaiveDate) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let max_stored = gaps::max_fixture_date(self.writer.pool()).await?;
        let Some(window) = fetch_window(max_stored, horizon, today) else {
            info!(?max_stored, %horizon, "[FIXTURES] store already reaches the horizon, nothing to fetch");
            return Ok(report);
        };
        info!(%window, ?max_stored, "[FIXTURES] fetching window {window}");

        let params = vec![
            ("include", FIXTURE_INCLUDES.to_string()),
            ("per_page", self.cfg.page_size.to_string()),
            ("order", "starting_at:asc".to_string()),
        ];
        let pager = Paginator::new(
            &self.client,
            window.path(),
            params,
            self.cfg.max_pages,
            self.cfg.request_delay,
        );
        let mut pages = pin!(pager.into_stream());

        while let Some(raw) = pages.next().await {
            let received = raw.len();
            report.fetched += received;

            let kept: Vec<Value> = raw
                .into_iter()
                .filter(|f| self.cfg.keeps_league(int(f, "league_id")))
                .collect();
            let records = FixtureMapper.map_all(&kept);
            report.skipped += received - records.len();
            debug!(received, kept = records.len(), "[FIXTURES] page mapped");

            for chunk in records.chunks(self.cfg.batch_size) {
                let (leagues, teams, fixtures) = FixtureRecord::split(chunk);
                let mut batch = UpsertBatch::new();
                batch.extend(&leagues);
                batch.extend(&teams);
                batch.extend(&fixtures);
                report.record_batch(self.writer.persist("fixtures", &batch).await);
            }
        }

        info!(%window, "[FIXTURES] done: {report}");
        Ok(report)
    }

    /// Re-fetch fixtures kicking off `today` so their scores and status
    /// follow the match. The date-range sync never revisits a stored day.
    pub async fn refresh_live(&self, today: NaiveDate) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let fixture_ids: Vec<i64> = gaps::fixtures_on_day(self.writer.pool(), today)
            .await?
            .into_iter()
            .filter(|(_, league_id)| self.cfg.keeps_league(*league_id))
            .map(|(id, _)| id)
            .collect();
        if fixture_ids.is_empty() {
            info!(%today, "[LIVE] no tracked fixtures on {today}");
            return Ok(report);
        }
        info!(fixtures = fixture_ids.len(), "[LIVE] refreshing {} fixtures on {today}", fixture_ids.len());

        for (n, chunk) in fixture_ids.chunks(self.cfg.batch_size).enumerate() {
            let mut raw = Vec::with_capacity(chunk.len());
            for (i, &fixture_id) in chunk.iter().enumerate() {
                if n > 0 || i > 0 {
                    self.pause().await;
                }
                match self
                    .client
                    .get_one(&format!("fixtures/{fixture_id}"), Some(LIVE_INCLUDES))
                    .await
                {
                    Ok(Some(fixture)) => {
                        report.fetched += 1;
                        raw.push(fixture);
                    }
                    Ok(None) => debug!(fixture_id, "[LIVE] fixture {fixture_id} not returned"),
                    Err(e) => {
                        warn!(fixture_id, "[LIVE] fetch failed for fixture {fixture_id}, skipping: {e}");
                        report.skipped += 1;
                    }
                }
            }

            let records = FixtureMapper.map_all(&raw);
            report.skipped += raw.len() - records.len();
            if records.is_empty() {
                continue;
            }
            let (leagues, teams, fixtures) = FixtureRecord::split(&records);
            let mut batch = UpsertBatch::new();
            batch.extend(&leagues);
            batch.extend(&teams);
            batch.extend(&fixtures);
            report.record_batch(self.writer.persist("fixtures", &batch).await);
        }

        info!("[LIVE] done: {report}");
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Per-fixture gap fill
    // -----------------------------------------------------------------------

    /// Fill `relation` for upcoming fixtures that have none, one batch of
    /// fixtures at a time, until the gap query runs dry or a batch brings
    /// back nothing.
    pub async fn fill_missing(&self, relation: ChildRelation, today: NaiveDate) -> Result<SyncReport> {
        let label = relation.label();
        let batch_size = self.cfg.batch_size;
        let mut report = SyncReport::default();
        let mut attempted: HashSet<i64> = HashSet::new();

        loop {
            let candidates = gaps::fixtures_missing(
                self.writer.pool(),
                relation,
                today,
                batch_size + attempted.len(),
            )
            .await?;
            let fresh: Vec<i64> = candidates
                .into_iter()
                .filter(|id| !attempted.contains(id))
                .collect();
            if fresh.is_empty() {
                info!(relation = label, "[GAP] no fixtures missing {label}");
                break;
            }

            let exhausted = fresh.len() < batch_size;
            let first_batch = attempted.is_empty();
            let ids = &fresh[..fresh.len().min(batch_size)];
            attempted.extend(ids.iter().copied());
            info!(relation = label, fixtures = ids.len(), "[GAP] fetching {label} for {} fixtures", ids.len());

            let fetched = match relation {
                ChildRelation::Odds => self.fill_odds(ids, first_batch, &mut report).await,
                ChildRelation::TvStations => self.fill_tv(ids, first_batch, &mut report).await,
            };
            if fetched == 0 {
                info!(relation = label, "[GAP] source returned no {label} for this batch, stopping");
                break;
            }
            if exhausted {
                break;
            }
        }

        info!(relation = label, "[GAP] {label} done: {report}");
        Ok(report)
    }

    /// Returns the number of mapped odds, persisted or not.
    async fn fill_odds(&self, fixture_ids: &[i64], first_batch: bool, report: &mut SyncReport) -> usize {
        let records = self
            .fetch_children(
                fixture_ids,
                first_batch,
                "odds.bookmaker",
                "odds",
                OddsMapper::new,
                report,
            )
            .await;
        if records.is_empty() {
            return 0;
        }

        let bookmakers = prefer_full(records.iter().filter_map(|r| r.bookmaker.clone()));
        let odds: Vec<_> = records.iter().map(|r| r.odd.clone()).collect();

        let mut batch = UpsertBatch::new();
        batch.extend(&bookmakers);
        batch.extend(&odds);
        report.record_batch(self.writer.persist("odds", &batch).await);
        records.len()
    }

    async fn fill_tv(&self, fixture_ids: &[i64], first_batch: bool, report: &mut SyncReport) -> usize {
        let records = self
            .fetch_children(
                fixture_ids,
                first_batch,
                "tvstations.tvstation",
                "tvstations",
                FixtureTvMapper::new,
                report,
            )
            .await;
        if records.is_empty() {
            return 0;
        }

        let stations = prefer_full(records.iter().map(|r| r.station.clone()));
        let links: Vec<_> = records.iter().map(|r| r.link.clone()).collect();

        let mut batch = UpsertBatch::new();
        batch.extend(&stations);
        batch.extend(&links);
        report.record_batch(self.writer.persist("fixture_tvstations", &batch).await);
        records.len()
    }

    /// One `fixtures/{id}` call per fixture; the `key` include is mapped
    /// with a mapper bound to that fixture. Failed calls are skipped. Only
    /// the very first call of a run goes out without the courtesy pause.
    async fn fetch_children<M, F>(
        &self,
        fixture_ids: &[i64],
        first_batch: bool,
        include: &str,
        key: &str,
        mapper_for: F,
        report: &mut SyncReport,
    ) -> Vec<M::Row>
    where
        M: RecordMapper,
        F: Fn(i64) -> M,
    {
        let mut rows = Vec::new();
        for (i, &fixture_id) in fixture_ids.iter().enumerate() {
            if i > 0 || !first_batch {
                self.pause().await;
            }
            match self
                .client
                .get_one(&format!("fixtures/{fixture_id}"), Some(include))
                .await
            {
                Ok(Some(mut fixture)) => {
                    let raw = into_batch(fixture.get_mut(key).map(Value::take));
                    let mapped = mapper_for(fixture_id).map_all(&raw);
                    debug!(fixture_id, found = raw.len(), "[GAP] {key} for fixture {fixture_id}");
                    report.fetched += raw.len();
                    report.skipped += raw.len() - mapped.len();
                    rows.extend(mapped);
                }
                Ok(None) => debug!(fixture_id, "[GAP] fixture {fixture_id} not returned"),
                Err(e) => {
                    warn!(fixture_id, "[GAP] {key} fetch failed for fixture {fixture_id}, skipping: {e}");
                    report.skipped += 1;
                }
            }
        }
        rows
    }

    // -----------------------------------------------------------------------
    // Reference data
    // -----------------------------------------------------------------------

    /// Each configured league, with its country, by id.
    pub async fn sync_leagues(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut league_ids: Vec<i64> = self.cfg.league_ids.iter().copied().collect();
        league_ids.sort_unstable();
        if league_ids.is_empty() {
            warn!("[LEAGUES] LEAGUE_IDS is empty, nothing to fetch");
            return Ok(report);
        }

        let mut records: Vec<LeagueRecord> = Vec::new();
        for (i, league_id) in league_ids.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            match self
                .client
                .get_one(&format!("leagues/{league_id}"), Some("country"))
                .await
            {
                Ok(Some(raw)) => {
                    report.fetched += 1;
                    match LeagueMapper.map(&raw) {
                        Some(record) => {
                            debug!(league_id, name = %record.league.name, "[LEAGUES] fetched");
                            records.push(record);
                        }
                        None => report.skipped += 1,
                    }
                }
                Ok(None) => warn!(league_id, "[LEAGUES] league {league_id} not returned"),
                Err(e) => {
                    warn!(league_id, "[LEAGUES] fetch failed for league {league_id}: {e}");
                    report.skipped += 1;
                }
            }
        }

        for chunk in records.chunks(self.cfg.batch_size) {
            let countries = dedup_by_id(
                chunk.iter().filter_map(|r| r.country.clone()),
                |c: &CountryRow| c.id,
            );
            let leagues: Vec<_> = chunk.iter().map(|r| r.league.clone()).collect();
            let mut batch = UpsertBatch::new();
            batch.extend(&countries);
            batch.extend(&leagues);
            report.record_batch(self.writer.persist("leagues", &batch).await);
        }

        info!("[LEAGUES] done: {report}");
        Ok(report)
    }

    /// Teams by id: the given ids, or every team in an upcoming fixture.
    pub async fn sync_teams(&self, ids: Option<Vec<i64>>, today: NaiveDate) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let team_ids = match ids {
            Some(ids) => ids,
            None => gaps::upcoming_team_ids(self.writer.pool(), today).await?,
        };
        if team_ids.is_empty() {
            info!("[TEAMS] no teams to refresh");
            return Ok(report);
        }
        info!(teams = team_ids.len(), "[TEAMS] refreshing {} teams", team_ids.len());

        for (n, chunk) in team_ids.chunks(self.cfg.batch_size).enumerate() {
            let mut teams = Vec::with_capacity(chunk.len());
            for (i, team_id) in chunk.iter().enumerate() {
                if n > 0 || i > 0 {
                    self.pause().await;
                }
                match self.client.get_one(&format!("teams/{team_id}"), None).await {
                    Ok(Some(raw)) => {
                        report.fetched += 1;
                        match TeamMapper.map(&raw) {
                            Some(team) => teams.push(team),
                            None => report.skipped += 1,
                        }
                    }
                    Ok(None) => warn!(team_id, "[TEAMS] team {team_id} not returned"),
                    Err(e) => {
                        warn!(team_id, "[TEAMS] fetch failed for team {team_id}: {e}");
                        report.skipped += 1;
                    }
                }
            }

            let mut batch = UpsertBatch::new();
            batch.extend(&teams);
            if !batch.is_empty() {
                report.record_batch(self.writer.persist("teams", &batch).await);
            }
        }

        info!("[TEAMS] done: {report}");
        Ok(report)
    }

    /// The full tv station catalogue, one transaction per page.
    pub async fn sync_tv_stations(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut pager = self.reference_pager("tvstations", None);

        while let Some(raw) = pager.next_page().await {
            report.fetched += raw.len();
            let stations = TvStationMapper.map_all(&raw);
            report.skipped += raw.len() - stations.len();

            let mut batch = UpsertBatch::new();
            batch.extend(&stations);
            report.record_batch(self.writer.persist("tvstations", &batch).await);
        }

        info!("[TVSTATIONS] done: {report}");
        Ok(report)
    }

    /// Countries, harvested from the `country` include of the league list.
    pub async fn sync_countries(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let leagues = self.reference_pager("leagues", Some("country")).collect_all().await;
        report.fetched = leagues.len();

        let countries = dedup_by_id(
            leagues
                .iter()
                .filter_map(|l| object(l, "country"))
                .filter_map(|c| CountryMapper.map(c)),
            |c: &CountryRow| c.id,
        );
        info!(countries = countries.len(), "[COUNTRIES] {} unique countries", countries.len());

        for chunk in countries.chunks(self.cfg.batch_size) {
            let mut batch = UpsertBatch::new();
            batch.extend(chunk);
            report.record_batch(self.writer.persist("countries", &batch).await);
        }

        info!("[COUNTRIES] done: {report}");
        Ok(report)
    }

    fn reference_pager(&self, path: &str, include: Option<&str>) -> Paginator<'_> {
        let mut params = vec![("per_page", REFERENCE_PAGE_SIZE.to_string())];
        if let Some(include) = include {
            params.push(("include", include.to_string()));
        }
        Paginator::new(
            &self.client,
            path,
            params,
            self.cfg.max_pages,
            self.cfg.request_delay,
        )
    }

    async fn pause(&self) {
        if !self.cfg.request_delay.is_zero() {
            tokio::time::sleep(self.cfg.request_delay).await;
        }
    }
}

fn absorb(total: &mut SyncReport, job: &str, result: Result<SyncReport>) {
    match result {
        Ok(report) => total.merge(report),
        Err(e) => error!(job, "[SYNC] job failed: {e}"),
    }
}

/// Parent rows that may arrive as stubs or in full.
trait ParentRow: Clone {
    fn id(&self) -> i64;
    fn is_stub(&self) -> bool;
}

impl ParentRow for BookmakerRow {
    fn id(&self) -> i64 {
        self.id
    }
    fn is_stub(&self) -> bool {
        self.stub
    }
}

impl ParentRow for TvStationRow {
    fn id(&self) -> i64 {
        self.id
    }
    fn is_stub(&self) -> bool {
        self.stub
    }
}

/// One row per id, keeping a full row over a stub.
fn prefer_full<T: ParentRow>(rows: impl Iterator<Item = T>) -> Vec<T> {
    let mut by_id: BTreeMap<i64, T> = BTreeMap::new();
    for row in rows {
        match by_id.get(&row.id()) {
            Some(existing) if !existing.is_stub() || row.is_stub() => {}
            _ => {
                by_id.insert(row.id(), row);
            }
        }
    }
    by_id.into_values().collect()
}

fn dedup_by_id<T>(rows: impl Iterator<Item = T>, id: impl Fn(&T) -> i64) -> Vec<T> {
    let mut by_id = BTreeMap::new();
    for row in rows {
        by_id.entry(id(&row)).or_insert(row);
    }
    by_id.into_values().collect()
}

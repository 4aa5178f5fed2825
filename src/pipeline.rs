use crate::config::{Config, PlatformConfig, SectionConfig};
use crate::error::Error;
use crate::fetcher::PageSource;
use crate::models::{ResolvedItem, SectionResult};
use crate::options::RunOptions;
use crate::resolver::TitleResolver;
use crate::result::Result;
use crate::sources::{Catalog, Enrich, FlixPatrolScraper};
use crate::synchronizer::{ListSynchronizer, SyncOutcome};

use futures::{stream, StreamExt};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Success,
    PartialFailure,
    HardFailure,
}

/// Outcome of one platform section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub platform: String,
    pub section: String,
    pub list: String,
    pub scraped: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub added: u64,
    pub status: UnitStatus,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    UnitsFailed,
    CredentialsRejected,
    Aborted,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::UnitsFailed => 1,
            RunOutcome::CredentialsRejected => 2,
            RunOutcome::Aborted => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub units: Vec<UnitReport>,
    pub detail: Option<String>,
}

impl RunReport {
    fn halted(outcome: RunOutcome, err: &Error) -> RunReport {
        RunReport {
            outcome,
            units: Vec::new(),
            detail: Some(err.snippet()),
        }
    }

    fn from_units(units: Vec<UnitReport>) -> RunReport {
        let outcome = if units
            .iter()
            .any(|unit| unit.status == UnitStatus::HardFailure)
        {
            RunOutcome::UnitsFailed
        } else {
            RunOutcome::Completed
        };

        RunReport {
            outcome,
            units,
            detail: None,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }

    pub fn unresolved(&self) -> usize {
        self.units.iter().map(|unit| unit.unresolved).sum()
    }

    fn count(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|unit| unit.status == status).count()
    }

    pub fn log_summary(&self) {
        for unit in &self.units {
            let line = format!(
                "{:<8} {:<22} scraped {:>2}  resolved {:>2}  added {:>2}  {:?}",
                unit.platform, unit.section, unit.scraped, unit.resolved, unit.added, unit.status
            );
            match (unit.status, &unit.detail) {
                (UnitStatus::Success, _) => info!("{}", line),
                (UnitStatus::PartialFailure, Some(detail)) => warn!("{}: {}", line, detail),
                (UnitStatus::PartialFailure, None) => warn!("{}", line),
                (UnitStatus::HardFailure, Some(detail)) => error!("{}: {}", line, detail),
                (UnitStatus::HardFailure, None) => error!("{}", line),
            }
        }

        info!(
            "{} units: {} succeeded, {} partial, {} failed, {} unresolved titles",
            self.units.len(),
            self.count(UnitStatus::Success),
            self.count(UnitStatus::PartialFailure),
            self.count(UnitStatus::HardFailure),
            self.unresolved()
        );

        match (self.outcome, &self.detail) {
            (RunOutcome::Completed, _) => info!("Run completed"),
            (outcome, Some(detail)) => error!("Run ended with {:?}: {}", outcome, detail),
            (outcome, None) => error!("Run ended with {:?}", outcome),
        }
    }
}

struct Unit<'c> {
    platform: &'c PlatformConfig,
    section: &'c SectionConfig,
    url: String,
}

struct Prepared<'c> {
    unit: Unit<'c>,
    result: Result<SectionResult>,
}

pub fn unit_status(required: bool, result: &SectionResult, outcome: &SyncOutcome) -> UnitStatus {
    match outcome {
        SyncOutcome::Failed(_) => UnitStatus::HardFailure,
        SyncOutcome::NothingToAdd if required && result.scraped == 0 => UnitStatus::HardFailure,
        SyncOutcome::NothingToAdd | SyncOutcome::Partial { .. } => UnitStatus::PartialFailure,
        SyncOutcome::Synced { .. } if result.unresolved > 0 => UnitStatus::PartialFailure,
        SyncOutcome::Synced { .. } => UnitStatus::Success,
    }
}

/// Scrapes, resolves and publishes every configured section.
pub struct Pipeline<'a> {
    config: &'a Config,
    catalog: &'a dyn Catalog,
    scraper: FlixPatrolScraper<'a>,
    resolver: TitleResolver<'a>,
    synchronizer: ListSynchronizer<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        catalog: &'a dyn Catalog,
        pages: &'a dyn PageSource,
        enricher: Option<&'a dyn Enrich>,
    ) -> Result<Pipeline<'a>> {
        let mut resolver = TitleResolver::new(&config.resolver, catalog)?;
        if let Some(enricher) = enricher {
            resolver = resolver.with_enricher(enricher);
        }

        Ok(Pipeline {
            config,
            catalog,
            scraper: FlixPatrolScraper::new(pages)?,
            resolver,
            synchronizer: ListSynchronizer::new(catalog),
        })
    }

    /// Runs under the configured deadline. A zero deadline disables it.
    pub async fn run(&self, options: &RunOptions) -> RunReport {
        let deadline = self.config.pipeline.deadline();
        if deadline.is_zero() {
            return self.execute(options).await;
        }

        match tokio::time::timeout(deadline, self.execute(options)).await {
            Ok(report) => report,
            Err(_) => {
                error!("Run exceeded its deadline of {:?}", deadline);
                RunReport::halted(RunOutcome::Aborted, &Error::Aborted)
            }
        }
    }

    async fn execute(&self, options: &RunOptions) -> RunReport {
        info!("Validating credentials");
        if let Err(err) = self.catalog.check_token().await {
            error!("Credential validation failed: {}", err);
            return RunReport::halted(RunOutcome::CredentialsRejected, &err);
        }

        let units = self.units(options);
        let concurrency = self.config.pipeline.concurrency.max(1);
        info!("Running {} units, {} at a time", units.len(), concurrency);

        let prepared: Vec<Prepared> = stream::iter(units)
            .map(|unit| self.prepare(unit))
            .buffered(concurrency)
            .collect()
            .await;

        if options.print_lists {
            prepared.iter().for_each(Self::print_section);
        }

        let reports: Vec<UnitReport> = stream::iter(prepared)
            .map(|prepared| self.publish(prepared))
            .buffered(concurrency)
            .collect()
            .await;

        RunReport::from_units(reports)
    }

    fn units(&self, options: &RunOptions) -> Vec<Unit<'a>> {
        for name in &options.platforms {
            if !self
                .config
                .platforms
                .iter()
                .any(|platform| platform.name.eq_ignore_ascii_case(name))
            {
                warn!("Unknown platform {}", name);
            }
        }

        let page_date = options.page_date();
        let mut units = Vec::new();
        for platform in self
            .config
            .platforms
            .iter()
            .filter(|platform| options.includes(&platform.name))
        {
            for section in &platform.sections {
                if section.kids && !options.kids {
                    continue;
                }

                let date = if section.dated {
                    Some(page_date.as_str())
                } else {
                    None
                };
                units.push(Unit {
                    platform,
                    section,
                    url: self.config.page_url(platform, date),
                });
            }
        }

        units
    }

    async fn prepare(&self, unit: Unit<'a>) -> Prepared<'a> {
        let entries = self
            .scraper
            .scrape(&unit.url, &unit.section.title, unit.section.kind)
            .await;

        let result = match entries {
            Ok(entries) => Ok(self.resolver.resolve_section(&entries).await),
            Err(err) => {
                error!(
                    "Could not fetch {} for {} {}: {}",
                    unit.url, unit.platform.name, unit.section.title, err
                );
                Err(err)
            }
        };

        Prepared { unit, result }
    }

    async fn publish(&self, prepared: Prepared<'a>) -> UnitReport {
        let Prepared { unit, result } = prepared;
        let mut report = UnitReport {
            platform: unit.platform.name.clone(),
            section: unit.section.title.clone(),
            list: unit.section.list.slug.clone(),
            scraped: 0,
            resolved: 0,
            unresolved: 0,
            added: 0,
            status: UnitStatus::HardFailure,
            detail: None,
        };

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                report.detail = Some(err.snippet());
                return report;
            }
        };

        let outcome = self
            .synchronizer
            .sync(&unit.section.list, &result.items)
            .await;

        report.scraped = result.scraped;
        report.resolved = result.len();
        report.unresolved = result.unresolved;
        report.added = outcome.added();
        report.status = unit_status(unit.section.required, &result, &outcome);
        report.detail = match &outcome {
            SyncOutcome::Failed(err) => Some(err.snippet()),
            SyncOutcome::NothingToAdd if result.scraped == 0 => Some("section is empty".to_owned()),
            SyncOutcome::NothingToAdd => Some("no titles resolved".to_owned()),
            SyncOutcome::Partial {
                submitted,
                added,
                existing,
            } => Some(format!(
                "added {} of {} submitted, {} already present",
                added, submitted, existing
            )),
            SyncOutcome::Synced { .. } if result.unresolved > 0 => {
                Some(format!("{} titles unresolved", result.unresolved))
            }
            SyncOutcome::Synced { .. } => None,
        };

        report
    }

    fn print_section(prepared: &Prepared) {
        let unit = &prepared.unit;
        let result = match &prepared.result {
            Ok(result) => result,
            Err(_) => return,
        };

        info!(
            "{} {} ({}): {} of {} resolved",
            unit.platform.name,
            unit.section.title,
            unit.url,
            result.len(),
            result.scraped
        );
        for item in &result.items {
            info!("{}", section_row(item));
        }
    }
}

/// One line of the printed ranking table.
fn section_row(item: &ResolvedItem) -> String {
    let tmdb_id = item
        .tmdb_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_owned());

    format!(
        "{:>3}. {:<40} {:<32} {:>9} {:<5} tmdb {:>8} imdb {:<10} {}",
        item.entry.rank,
        item.entry.title,
        item.entry.slug,
        item.canonical_id,
        item.kind,
        tmdb_id,
        item.imdb_id.as_deref().unwrap_or("-"),
        item.confidence
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;
    use crate::sources::ItemRef;
    use crate::test::helpers::{candidate, FakeCatalog, StaticPages};

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::time::Duration;

    const NETFLIX_URL: &str = "https://flixpatrol.com/top10/netflix/portugal/";
    const NETFLIX_DATED_URL: &str = "https://flixpatrol.com/top10/netflix/portugal/2024-05-01/";
    const FIXTURE: &str = "fixtures/flixpatrol_netflix.html";

    fn config(extra: &str) -> Config {
        let toml = format!(
            r#"
            [pipeline]
            concurrency = 2
            deadline_secs = 60

            [[platforms]]
            name = "netflix"
            path = "netflix"

            [[platforms.sections]]
            title = "TOP 10 Movies"
            kind = "movie"
            list = {{ name = "Top Portugal Netflix Movies", slug = "top-portugal-netflix-movies", description = "Movies" }}

            [[platforms.sections]]
            title = "TOP 10 Kids Movies"
            kind = "movie"
            kids = true
            dated = true
            list = {{ name = "Top Portugal Netflix Kids Movies", slug = "top-portugal-netflix-kids-movies", description = "Kids movies" }}
            {}
            "#,
            extra
        );
        Config::from_toml(&toml).unwrap()
    }

    fn catalog() -> FakeCatalog {
        FakeCatalog::default()
            .with_search(
                "Dune",
                vec![
                    candidate(MediaKind::Movie, 99, "Dune", Some(1984), "dune-1984"),
                    candidate(MediaKind::Movie, 101, "Dune", Some(2021), "dune-2021"),
                ],
            )
            .with_search("Nope", vec![candidate(MediaKind::Movie, 102, "Nope", Some(2022), "nope-2022")])
            .with_search(
                "Oppenheimer",
                vec![candidate(MediaKind::Movie, 103, "Oppenheimer", Some(2023), "oppenheimer-2023")],
            )
    }

    fn pages() -> StaticPages {
        StaticPages::default()
            .with_fixture(NETFLIX_URL, FIXTURE)
            .with_fixture(NETFLIX_DATED_URL, FIXTURE)
    }

    fn options() -> RunOptions {
        RunOptions {
            date: Some("2024-05-01".to_owned()),
            ..RunOptions::default()
        }
    }

    #[tokio::test]
    async fn test_run() {
        let config = config("");
        let catalog = catalog();
        let pages = pages();
        let pipeline = Pipeline::new(&config, &catalog, &pages, None).unwrap();

        let report = pipeline.run(&options()).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.units[0].status, UnitStatus::Success);
        assert_eq!(report.units[0].scraped, 3);
        assert_eq!(report.units[0].added, 3);

        let add_calls = catalog.add_calls();
        assert_eq!(add_calls.len(), 1);
        assert_eq!(add_calls[0].0, "top-portugal-netflix-movies");
        assert_eq!(
            add_calls[0].1.movies,
            vec![ItemRef::new(101), ItemRef::new(102), ItemRef::new(103)]
        );
        assert_eq!(pages.fetches(NETFLIX_URL), 1);
    }

    #[tokio::test]
    async fn test_run_missing_section_does_not_stop_siblings() {
        let config = config("");
        let catalog = catalog();
        let pages = pages();
        let pipeline = Pipeline::new(&config, &catalog, &pages, None).unwrap();
        let options = RunOptions {
            kids: true,
            ..options()
        };

        let report = pipeline.run(&options).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.units.len(), 2);
        assert_eq!(report.units[0].status, UnitStatus::Success);

        let kids = &report.units[1];
        assert_eq!(kids.list, "top-portugal-netflix-kids-movies");
        assert_eq!(kids.status, UnitStatus::PartialFailure);
        assert_eq!(kids.scraped, 0);
        assert_eq!(pages.fetches(NETFLIX_DATED_URL), 1);

        let add_calls = catalog.add_calls();
        assert_eq!(add_calls.len(), 1);
        assert_eq!(add_calls[0].0, "top-portugal-netflix-movies");
        assert!(catalog.created().contains(&"top-portugal-netflix-kids-movies".to_owned()));
    }

    #[tokio::test]
    async fn test_run_required_empty_section() {
        let config = config(
            r#"
            [[platforms]]
            name = "hbo"
            path = "hbo-max"

            [[platforms.sections]]
            title = "TOP 10 Movies"
            kind = "movie"
            required = true
            list = { name = "Top Portugal HBO Movies", slug = "top-portugal-hbo-movies", description = "Movies" }
            "#,
        );
        let catalog = catalog();
        let pages = pages().with_page(
            "https://flixpatrol.com/top10/hbo-max/portugal/",
            "<html><body><h2>Nothing here</h2></body></html>",
        );
        let pipeline = Pipeline::new(&config, &catalog, &pages, None).unwrap();

        let report = pipeline.run(&options()).await;

        assert_eq!(report.outcome, RunOutcome::UnitsFailed);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.units[0].status, UnitStatus::Success);
        assert_eq!(report.units[1].status, UnitStatus::HardFailure);
    }

    #[tokio::test]
    async fn test_run_unresolved_titles() {
        let config = config("");
        let catalog = FakeCatalog::default()
            .with_search("Dune", vec![candidate(MediaKind::Movie, 101, "Dune", Some(2021), "dune-2021")])
            .with_search("Nope", vec![candidate(MediaKind::Movie, 102, "Nope", Some(2022), "nope-2022")]);
        let pages = pages();
        let pipeline = Pipeline::new(&config, &catalog, &pages, None).unwrap();

        let report = pipeline.run(&options()).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.units[0].status, UnitStatus::PartialFailure);
        assert_eq!(report.units[0].resolved, 2);
        assert_eq!(report.unresolved(), 1);
        assert_eq!(
            catalog.add_calls()[0].1.movies,
            vec![ItemRef::new(101), ItemRef::new(102)]
        );
    }

    #[tokio::test]
    async fn test_run_credentials_rejected() {
        let config = config("");
        let catalog = catalog().rejecting_token(StatusCode::UNAUTHORIZED);
        let pages = pages();
        let pipeline = Pipeline::new(&config, &catalog, &pages, None).unwrap();

        let report = pipeline.run(&options()).await;

        assert_eq!(report.outcome, RunOutcome::CredentialsRejected);
        assert_eq!(report.exit_code(), 2);
        assert!(report.units.is_empty());
        assert_eq!(pages.fetches(NETFLIX_URL), 0);
        assert!(catalog.search_calls().is_empty());
        assert!(catalog.add_calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_fetch_failure() {
        let config = config("");
        let catalog = catalog();
        let pages = StaticPages::default();
        let pipeline = Pipeline::new(&config, &catalog, &pages, None).unwrap();

        let report = pipeline.run(&options()).await;

        assert_eq!(report.outcome, RunOutcome::UnitsFailed);
        assert_eq!(report.units[0].status, UnitStatus::HardFailure);
        assert!(report.units[0].detail.is_some());
        assert!(catalog.add_calls().is_empty());
        assert!(catalog.created().is_empty());
    }

    #[tokio::test]
    async fn test_run_sync_failure() {
        let config = config("");
        let catalog = catalog().failing_add(StatusCode::UNPROCESSABLE_ENTITY);
        let pages = pages();
        let pipeline = Pipeline::new(&config, &catalog, &pages, None).unwrap();

        let report = pipeline.run(&options()).await;

        assert_eq!(report.outcome, RunOutcome::UnitsFailed);
        assert_eq!(report.units[0].status, UnitStatus::HardFailure);
        assert_eq!(report.units[0].resolved, 3);
        assert_eq!(report.units[0].detail.as_deref(), Some("{\"error\":\"rejected\"}"));
    }

    #[tokio::test]
    async fn test_run_platform_filter() {
        let config = config(
            r#"
            [[platforms]]
            name = "hbo"
            path = "hbo-max"

            [[platforms.sections]]
            title = "TOP 10 Movies"
            kind = "movie"
            list = { name = "Top Portugal HBO Movies", slug = "top-portugal-hbo-movies", description = "Movies" }
            "#,
        );
        let catalog = catalog();
        let pages = StaticPages::default()
            .with_fixture("https://flixpatrol.com/top10/hbo-max/portugal/", FIXTURE);
        let pipeline = Pipeline::new(&config, &catalog, &pages, None).unwrap();
        let options = RunOptions {
            platforms: vec!["HBO".to_owned()],
            ..options()
        };

        let report = pipeline.run(&options).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.units[0].platform, "hbo");
        assert_eq!(pages.fetches(NETFLIX_URL), 0);
    }

    struct StalledPages;

    #[async_trait]
    impl PageSource for StalledPages {
        async fn fetch_page(&self, _url: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline() {
        let mut config = config("");
        config.pipeline.deadline_secs = 5;
        let catalog = catalog();
        let pages = StalledPages;
        let pipeline = Pipeline::new(&config, &catalog, &pages, None).unwrap();

        let report = pipeline.run(&options()).await;

        assert_eq!(report.outcome, RunOutcome::Aborted);
        assert_eq!(report.exit_code(), 3);
        assert!(catalog.add_calls().is_empty());
    }

    #[test]
    fn test_section_row() {
        let mut item = ResolvedItem {
            entry: crate::models::RankedEntry {
                rank: 1,
                title: "Dune".to_owned(),
                slug: "dune-2021".to_owned(),
                kind: Some(MediaKind::Movie),
            },
            canonical_id: 287071,
            kind: MediaKind::Movie,
            confidence: 0,
            tmdb_id: Some(438631),
            imdb_id: Some("tt1160419".to_owned()),
        };

        let row = section_row(&item);
        assert!(row.starts_with("  1. Dune"));
        assert!(row.contains("287071"));
        assert!(row.contains("tmdb   438631"));
        assert!(row.contains("imdb tt1160419"));

        item.tmdb_id = None;
        item.imdb_id = None;
        let row = section_row(&item);
        assert!(row.contains("tmdb        -"));
        assert!(row.contains("imdb -"));
    }

    #[test]
    fn test_unit_status() {
        let result = SectionResult {
            items: Vec::new(),
            scraped: 0,
            unresolved: 0,
        };
        let unresolved = SectionResult {
            unresolved: 1,
            ..result.clone()
        };

        assert_eq!(
            unit_status(false, &result, &SyncOutcome::Synced { added: 3 }),
            UnitStatus::Success
        );
        assert_eq!(
            unit_status(false, &unresolved, &SyncOutcome::Synced { added: 3 }),
            UnitStatus::PartialFailure
        );
        assert_eq!(
            unit_status(false, &result, &SyncOutcome::NothingToAdd),
            UnitStatus::PartialFailure
        );
        assert_eq!(
            unit_status(true, &result, &SyncOutcome::NothingToAdd),
            UnitStatus::HardFailure
        );
        assert_eq!(
            unit_status(false, &result, &SyncOutcome::Partial {
                    submitted: 3,
                    added: 0,
                    existing: 0
                }),
            UnitStatus::PartialFailure
        );
        assert_eq!(
            unit_status(false, &result, &SyncOutcome::Failed(Error::Aborted)),
            UnitStatus::HardFailure
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Completed.exit_code(), 0);
        assert_eq!(RunOutcome::UnitsFailed.exit_code(), 1);
        assert_eq!(RunOutcome::CredentialsRejected.exit_code(), 2);
        assert_eq!(RunOutcome::Aborted.exit_code(), 3);
    }
}

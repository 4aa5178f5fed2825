use crate::config::TmdbConfig;
use crate::fetcher::JsonSource;
use crate::models::{MediaKind, RankedEntry};
use crate::rate_limiter::RateLimiter;
use crate::result::Result;
use crate::sources::flixpatrol_details::{FlixPatrolDetails, Person, TitleDetails};
use crate::sources::{Enrich, Enrichment};

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

type Json = serde_json::Value;

const CREDITS_LIMIT: usize = 20;
const LEADING_ARTICLES: [&str; 6] = ["the ", "a ", "an ", "o ", "os ", "as "];

/// TMDB lookups used to resolve entries by id. Every call waits on the shared limiter.
pub struct TmdbAPI<'a> {
    config: &'a TmdbConfig,
    source: &'a dyn JsonSource,
    limiter: &'a RateLimiter,
    details: Option<&'a FlixPatrolDetails<'a>>,
    api_key: String,
}

impl<'a> TmdbAPI<'a> {
    pub fn new(
        config: &'a TmdbConfig,
        source: &'a dyn JsonSource,
        limiter: &'a RateLimiter,
        api_key: &str,
    ) -> TmdbAPI<'a> {
        TmdbAPI {
            config,
            source,
            limiter,
            details: None,
            api_key: api_key.to_owned(),
        }
    }

    /// Reads each title's page first, to check candidates against its credits.
    pub fn with_details(mut self, details: &'a FlixPatrolDetails<'a>) -> TmdbAPI<'a> {
        self.details = Some(details);
        self
    }

    fn extract_value<'j>(json: &'j Json, key: &str) -> &'j Json {
        json.pointer(key).unwrap_or(&Json::Null)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Json> {
        let url = format!("{}{}", self.config.url.trim_end_matches('/'), path);
        let mut params = vec![("api_key", self.api_key.as_str())];
        params.extend_from_slice(query);

        self.limiter.acquire().await;
        self.source.get_json(&url, &params).await
    }

    fn search_path(kind: Option<MediaKind>) -> String {
        format!("/search/{}", kind.map(|kind| kind.tmdb_path()).unwrap_or("multi"))
    }

    async fn search(&self, query: &str, kind: Option<MediaKind>) -> Result<Vec<Json>> {
        let search = self.get(&Self::search_path(kind), &[("query", query)]).await?;

        Ok(Self::extract_value(&search, "/results")
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .filter(|result| {
                        Self::extract_value(result, "/media_type").as_str() != Some("person")
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Results for `kind`, or for the other kind when a typed search finds nothing.
    async fn search_any_kind(
        &self,
        query: &str,
        kind: Option<MediaKind>,
    ) -> Result<(Vec<Json>, Option<MediaKind>)> {
        let results = self.search(query, kind).await?;

        match kind {
            Some(kind) if results.is_empty() => {
                let other = kind.other();
                info!("No TMDB results for '{}' as {}, trying {}", query, kind, other);
                Ok((self.search(query, Some(other)).await?, Some(other)))
            }
            _ => Ok((results, kind)),
        }
    }

    async fn title(&self, kind: MediaKind, tmdb_id: u64) -> Result<Json> {
        let path = format!("/{}/{}", kind.tmdb_path(), tmdb_id);
        self.get(&path, &[("append_to_response", "credits,external_ids")])
            .await
    }

    async fn external_imdb_id(&self, kind: MediaKind, tmdb_id: u64) -> Option<String> {
        let path = format!("/{}/{}/external_ids", kind.tmdb_path(), tmdb_id);
        match self.get(&path, &[]).await {
            Ok(ids) => Self::imdb_id(&ids, "/imdb_id"),
            Err(err) => {
                warn!("Could not fetch external ids for TMDB {}: {}", tmdb_id, err);
                None
            }
        }
    }

    fn imdb_id(json: &Json, key: &str) -> Option<String> {
        Self::extract_value(json, key)
            .as_str()
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned)
    }

    fn result_kind(result: &Json, kind: Option<MediaKind>) -> Option<MediaKind> {
        match kind {
            Some(kind) => Some(kind),
            None => match Self::extract_value(result, "/media_type").as_str()? {
                "movie" => Some(MediaKind::Movie),
                "tv" => Some(MediaKind::Show),
                _ => None,
            },
        }
    }

    fn result_year(result: &Json) -> Option<i32> {
        let date = Self::extract_value(result, "/release_date")
            .as_str()
            .or_else(|| Self::extract_value(result, "/first_air_date").as_str())?;

        date.get(..4)?.parse().ok()
    }

    fn result_title(result: &Json) -> &str {
        Self::extract_value(result, "/title")
            .as_str()
            .or_else(|| Self::extract_value(result, "/name").as_str())
            .unwrap_or_default()
    }

    /// Lowercased title without a leading article.
    fn comparable_title(title: &str) -> String {
        let title = title.trim().to_lowercase();
        for article in LEADING_ARTICLES {
            if let Some(rest) = title.strip_prefix(article) {
                return rest.to_owned();
            }
        }
        title
    }

    /// Whether anyone in the cast or crew carries `name`, either name containing the other.
    fn credits_mention(title: &Json, name: &str) -> bool {
        let name = name.to_lowercase();

        ["/credits/cast", "/credits/crew"]
            .iter()
            .filter_map(|key| Self::extract_value(title, key).as_array())
            .flatten()
            .filter_map(|member| Self::extract_value(member, "/name").as_str())
            .map(str::to_lowercase)
            .filter(|member| !member.is_empty())
            .any(|member| member.contains(&name) || name.contains(&member))
    }

    /// First of the leading results whose credits name `person`.
    ///
    /// A result of unknown kind is tried as a movie, then as a show when the
    /// movie lookup is not found.
    async fn match_credits(
        &self,
        results: &[Json],
        kind: Option<MediaKind>,
        person: &Person,
    ) -> Option<Enrichment> {
        for result in results.iter().take(CREDITS_LIMIT) {
            let tmdb_id = match Self::extract_value(result, "/id").as_u64() {
                Some(id) => id,
                None => continue,
            };

            let declared = Self::result_kind(result, kind);
            let mut title_kind = declared.unwrap_or(MediaKind::Movie);
            let mut title = self.title(title_kind, tmdb_id).await;
            if declared.is_none()
                && matches!(&title, Err(err) if err.status() == Some(StatusCode::NOT_FOUND))
            {
                debug!("TMDB {} is not a movie, trying it as a show", tmdb_id);
                title_kind = MediaKind::Show;
                title = self.title(title_kind, tmdb_id).await;
            }

            let title = match title {
                Ok(title) => title,
                Err(err) => {
                    warn!("Could not fetch credits of TMDB {}: {}", tmdb_id, err);
                    continue;
                }
            };

            if Self::credits_mention(&title, &person.name) {
                debug!(
                    "Credits of TMDB {} ('{}') name {} ({:?})",
                    tmdb_id,
                    Self::result_title(result),
                    person.name,
                    person.role
                );
                return Some(Enrichment {
                    tmdb_id,
                    imdb_id: Self::imdb_id(&title, "/external_ids/imdb_id"),
                    kind: title_kind,
                    verified: true,
                });
            }
        }

        None
    }

    /// First result released in `year`, else the first exact title match,
    /// else the most popular result.
    fn pick_result(
        results: &[Json],
        kind: Option<MediaKind>,
        query: &str,
        year: Option<i32>,
    ) -> Option<(u64, MediaKind)> {
        let usable: Vec<(&Json, u64, MediaKind)> = results
            .iter()
            .filter_map(|result| {
                let id = Self::extract_value(result, "/id").as_u64()?;
                let kind = Self::result_kind(result, kind)?;
                Some((result, id, kind))
            })
            .collect();

        let by_year = year.and_then(|year| {
            usable
                .iter()
                .find(|(result, _, _)| Self::result_year(result) == Some(year))
        });

        let wanted = Self::comparable_title(query);
        let by_title = || {
            usable
                .iter()
                .find(|(result, _, _)| Self::comparable_title(Self::result_title(result)) == wanted)
        };

        by_year
            .or_else(by_title)
            .or_else(|| usable.first())
            .map(|(_, id, kind)| (*id, *kind))
    }

    async fn title_details(&self, entry: &RankedEntry) -> TitleDetails {
        let details = match self.details {
            Some(details) => details,
            None => return TitleDetails::default(),
        };

        match details.details(&entry.slug).await {
            Ok(details) => details,
            Err(err) => {
                warn!("Could not read the page of '{}': {}", entry.title, err);
                TitleDetails::default()
            }
        }
    }
}

#[async_trait]
impl Enrich for TmdbAPI<'_> {
    async fn enrich(
        &self,
        entry: &RankedEntry,
        query: &str,
        year: Option<i32>,
    ) -> Result<Option<Enrichment>> {
        let details = self.title_details(entry).await;
        let year = details.premiere_year.or(year);

        let (results, kind) = self
            .search_any_kind(query, entry.kind.or(details.kind))
            .await?;
        if results.is_empty() {
            debug!("No TMDB results for '{}'", query);
            return Ok(None);
        }

        if let Some(person) = &details.person {
            if let Some(enrichment) = self.match_credits(&results, kind, person).await {
                return Ok(Some(enrichment));
            }
            if results.len() == 1 {
                warn!(
                    "Credits of the only TMDB result for '{}' do not name {}, using it anyway",
                    query, person.name
                );
            }
        }

        let (tmdb_id, kind) = match Self::pick_result(&results, kind, query, year) {
            Some(picked) => picked,
            None => {
                debug!("No usable TMDB results for '{}'", query);
                return Ok(None);
            }
        };

        let imdb_id = self.external_imdb_id(kind, tmdb_id).await;
        debug!("'{}' is TMDB {} ({}), IMDb {:?}", entry.title, tmdb_id, kind, imdb_id);

        Ok(Some(Enrichment {
            tmdb_id,
            imdb_id,
            kind,
            verified: false,
        }))
    }
}

use crate::config::{ResolverConfig, TieBreak};
use crate::error::Error;
use crate::models::{RankedEntry, ResolvedItem, SectionResult};
use crate::result::Result;
use crate::sources::{Candidate, Catalog, Enrich};

use regex::Regex;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

const YEAR_RANGE: RangeInclusive<i32> = 1870..=2100;

/// Year suffix of a FlixPatrol slug, e.g. `dune-2021`.
pub fn year_hint(slug: &str) -> Option<i32> {
    let token = slug.trim_end_matches('/').rsplit('-').next()?;
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    token.parse().ok().filter(|year| YEAR_RANGE.contains(year))
}

fn compact_slug(slug: &str) -> String {
    slug.replace('-', "").to_lowercase()
}

/// Whether a catalog slug names the same title as a scraped slug.
fn slug_matches(scraped: &str, catalog: &str) -> bool {
    let scraped = compact_slug(scraped);
    let catalog = compact_slug(catalog);
    if scraped.is_empty() || catalog.is_empty() {
        return false;
    }

    catalog.starts_with(&scraped) || scraped.starts_with(&catalog)
}

struct TitleNormalizer {
    parenthetical: Regex,
    colon: Regex,
}

impl TitleNormalizer {
    fn new() -> Result<TitleNormalizer> {
        Ok(TitleNormalizer {
            parenthetical: Regex::new(r"(\s*\([^()]*\))+\s*$")?,
            colon: Regex::new(r"\s*:\s*")?,
        })
    }

    fn normalize(&self, title: &str) -> String {
        let title = self.parenthetical.replace(title, "");
        let title = title.replace('&', " and ");
        let title = self.colon.replace_all(&title, ": ");

        title.split_whitespace().collect::<Vec<&str>>().join(" ")
    }
}

/// Maps scraped entries to canonical catalog ids.
pub struct TitleResolver<'a> {
    config: &'a ResolverConfig,
    catalog: &'a dyn Catalog,
    enricher: Option<&'a dyn Enrich>,
    normalizer: TitleNormalizer,
}

impl<'a> TitleResolver<'a> {
    pub fn new(config: &'a ResolverConfig, catalog: &'a dyn Catalog) -> Result<TitleResolver<'a>> {
        Ok(TitleResolver {
            config,
            catalog,
            enricher: None,
            normalizer: TitleNormalizer::new()?,
        })
    }

    pub fn with_enricher(mut self, enricher: &'a dyn Enrich) -> TitleResolver<'a> {
        self.enricher = Some(enricher);
        self
    }

    pub fn normalize_title(&self, title: &str) -> String {
        self.normalizer.normalize(title)
    }

    /// Resolves every entry in rank order. Unresolved entries are dropped and counted.
    pub async fn resolve_section(&self, entries: &[RankedEntry]) -> SectionResult {
        let mut result = SectionResult {
            scraped: entries.len(),
            ..SectionResult::default()
        };

        for entry in entries {
            match self.resolve(entry).await {
                Some(item) => result.items.push(item),
                None => result.unresolved += 1,
            }
        }

        result
    }

    pub async fn resolve(&self, entry: &RankedEntry) -> Option<ResolvedItem> {
        let query = self.normalize_title(&entry.title);
        let year = year_hint(&entry.slug);

        if let Some(item) = self.resolve_by_tmdb(entry, &query, year).await {
            return Some(item);
        }

        match self.resolve_by_search(entry, &query, year).await {
            Ok(Some(item)) => {
                debug!(
                    "#{} '{}' -> {} {} (candidate {})",
                    entry.rank, entry.title, item.kind, item.canonical_id, item.confidence
                );
                Some(item)
            }
            Ok(None) => {
                warn!(
                    "{}",
                    Error::Unresolved(format!("no candidates for #{} '{}'", entry.rank, entry.title))
                );
                None
            }
            Err(err) => {
                warn!("Search for #{} '{}' failed: {}", entry.rank, entry.title, err);
                None
            }
        }
    }

    async fn resolve_by_tmdb(
        &self,
        entry: &RankedEntry,
        query: &str,
        year: Option<i32>,
    ) -> Option<ResolvedItem> {
        let enricher = self.enricher?;

        let enrichment = match enricher.enrich(entry, query, year).await {
            Ok(enrichment) => enrichment?,
            Err(err) => {
                warn!("Could not enrich '{}': {}", entry.title, err);
                return None;
            }
        };

        match self
            .catalog
            .lookup_tmdb(enrichment.tmdb_id, enrichment.kind)
            .await
        {
            Ok(Some(candidate)) => {
                info!(
                    "Resolved '{}' through TMDB {} -> {}{}",
                    entry.title,
                    enrichment.tmdb_id,
                    candidate.id,
                    if enrichment.verified { " (credits)" } else { "" }
                );
                let mut item = Self::item(entry, &candidate, 0);
                item.tmdb_id = Some(enrichment.tmdb_id);
                item.imdb_id = enrichment.imdb_id;
                Some(item)
            }
            Ok(None) => {
                debug!("TMDB {} is not in the catalog", enrichment.tmdb_id);
                None
            }
            Err(err) => {
                warn!("Lookup of TMDB {} failed: {}", enrichment.tmdb_id, err);
                None
            }
        }
    }

    async fn resolve_by_search(
        &self,
        entry: &RankedEntry,
        query: &str,
        year: Option<i32>,
    ) -> Result<Option<ResolvedItem>> {
        let mut candidates = self.catalog.search(entry.kind, query, year).await?;
        if candidates.is_empty() && year.is_some() {
            debug!("No results for '{}' in {:?}, searching any year", query, year);
            candidates = self.catalog.search(entry.kind, query, None).await?;
        }

        Ok(self
            .select(query, &entry.slug, year, &candidates)
            .map(|index| Self::item(entry, &candidates[index], index)))
    }

    /// Index of the chosen candidate.
    ///
    /// An exact year match wins over relevance. Several matches for the year
    /// go to the configured tie-break. Without a year match, a candidate whose
    /// slug matches the scraped slug is preferred, then the top result.
    pub fn select(
        &self,
        query: &str,
        slug: &str,
        year: Option<i32>,
        candidates: &[Candidate],
    ) -> Option<usize> {
        if let Some(year) = year {
            let same_year: Vec<usize> = candidates
                .iter()
                .enumerate()
                .filter(|(_, candidate)| candidate.year == Some(year))
                .map(|(index, _)| index)
                .collect();

            match same_year.as_slice() {
                [] => {}
                [index] => return Some(*index),
                indices => return Some(self.tie_break(query, candidates, indices)),
            }
        }

        candidates
            .iter()
            .position(|candidate| slug_matches(slug, &candidate.slug))
            .or_else(|| if candidates.is_empty() { None } else { Some(0) })
    }

    fn tie_break(&self, query: &str, candidates: &[Candidate], indices: &[usize]) -> usize {
        let first = indices[0];
        match self.config.tie_break {
            TieBreak::Relevance => first,
            TieBreak::Similarity => {
                let query = query.to_lowercase();
                let mut best: Option<(f64, usize)> = None;

                for &index in indices {
                    let title = self.normalize_title(&candidates[index].title).to_lowercase();
                    let score = strsim::normalized_levenshtein(&query, &title);
                    if score >= self.config.similarity_threshold
                        && best.map_or(true, |(best_score, _)| score > best_score)
                    {
                        best = Some((score, index));
                    }
                }

                best.map(|(_, index)| index).unwrap_or(first)
            }
        }
    }

    fn item(entry: &RankedEntry, candidate: &Candidate, confidence: usize) -> ResolvedItem {
        ResolvedItem {
            entry: entry.clone(),
            canonical_id: candidate.id,
            kind: candidate.kind,
            confidence,
            tmdb_id: None,
            imdb_id: None,
        }
    }
}

use crate::config::ListTarget;
use crate::models::{MediaKind, RankedEntry, ResolvedItem};
use crate::result::Result;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod flixpatrol_details;
pub mod flixpatrol_scraper;
pub mod tmdb_api;
pub mod trakt_api;

pub use flixpatrol_details::FlixPatrolDetails;
pub use flixpatrol_scraper::FlixPatrolScraper;
pub use tmdb_api::TmdbAPI;
pub use trakt_api::TraktAPI;

/// A search hit from the catalog, in the order the catalog ranked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: MediaKind,
    pub id: u64,
    pub title: String,
    pub year: Option<i32>,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteList {
    pub name: String,
    pub slug: String,
    pub item_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Ids {
    pub trakt: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ItemRef {
    pub ids: Ids,
}

impl ItemRef {
    pub fn new(trakt: u64) -> ItemRef {
        ItemRef {
            ids: Ids { trakt },
        }
    }
}

/// Body of the list add/remove calls, one bucket per media kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ItemsPayload {
    #[serde(default)]
    pub movies: Vec<ItemRef>,
    #[serde(default)]
    pub shows: Vec<ItemRef>,
}

impl ItemsPayload {
    /// Partitions items by kind, keeping rank order inside each bucket.
    pub fn from_items(items: &[ResolvedItem]) -> ItemsPayload {
        let mut payload = ItemsPayload::default();
        for item in items {
            payload.push(item.kind, item.canonical_id);
        }
        payload
    }

    pub fn push(&mut self, kind: MediaKind, trakt: u64) {
        match kind {
            MediaKind::Movie => self.movies.push(ItemRef::new(trakt)),
            MediaKind::Show => self.shows.push(ItemRef::new(trakt)),
        }
    }

    pub fn len(&self) -> usize {
        self.movies.len() + self.shows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Counts {
    #[serde(default)]
    pub movies: u64,
    #[serde(default)]
    pub shows: u64,
}

impl Counts {
    pub fn total(&self) -> u64 {
        self.movies + self.shows
    }
}

/// Counts reported by the catalog after a list write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListMutation {
    #[serde(default)]
    pub added: Counts,
    #[serde(default)]
    pub existing: Counts,
    #[serde(default)]
    pub deleted: Counts,
    #[serde(default)]
    pub not_found: NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NotFound {
    #[serde(default)]
    pub movies: Vec<ItemRef>,
    #[serde(default)]
    pub shows: Vec<ItemRef>,
}

/// Content catalog holding canonical ids and the published lists.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Validates the access token, returning the account's username.
    async fn check_token(&self) -> Result<String>;

    /// Searches titles of `kind`, or of both kinds when `None`.
    async fn search(
        &self,
        kind: Option<MediaKind>,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<Candidate>>;

    async fn lookup_tmdb(&self, tmdb_id: u64, kind: MediaKind) -> Result<Option<Candidate>>;

    async fn lists(&self) -> Result<Vec<RemoteList>>;

    async fn create_list(&self, target: &ListTarget) -> Result<RemoteList>;

    async fn list_items(&self, slug: &str) -> Result<ItemsPayload>;

    async fn add_items(&self, slug: &str, items: &ItemsPayload) -> Result<ListMutation>;

    async fn remove_items(&self, slug: &str, items: &ItemsPayload) -> Result<ListMutation>;
}

/// External ids of an entry, found in the metadata service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub tmdb_id: u64,
    pub imdb_id: Option<String>,
    pub kind: MediaKind,
    /// The credits name the person listed on the title's page.
    pub verified: bool,
}

#[async_trait]
pub trait Enrich: Send + Sync {
    async fn enrich(
        &self,
        entry: &RankedEntry,
        query: &str,
        year: Option<i32>,
    ) -> Result<Option<Enrichment>>;
}

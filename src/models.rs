use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    /// Path segment and `type` value used by the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "show",
        }
    }

    /// Key of this kind's bucket in list payloads.
    pub fn plural(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movies",
            MediaKind::Show => "shows",
        }
    }

    pub fn tmdb_path(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "tv",
        }
    }

    pub fn other(&self) -> MediaKind {
        match self {
            MediaKind::Movie => MediaKind::Show,
            MediaKind::Show => MediaKind::Movie,
        }
    }

    pub fn from_catalog_type(value: &str) -> Option<MediaKind> {
        match value {
            "movie" => Some(MediaKind::Movie),
            "show" => Some(MediaKind::Show),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of a top-10 section as scraped from the ranking page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct RankedEntry {
    pub rank: u8,
    pub title: String,
    pub slug: String,
    /// `None` for mixed movie/show rankings.
    pub kind: Option<MediaKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ResolvedItem {
    pub entry: RankedEntry,
    pub canonical_id: u64,
    pub kind: MediaKind,
    /// Position of the chosen candidate in the relevance-ordered results, 0 being the top hit.
    pub confidence: usize,
    /// Set when the item was resolved through TMDB.
    pub tmdb_id: Option<u64>,
    pub imdb_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SectionResult {
    pub items: Vec<ResolvedItem>,
    pub scraped: usize,
    pub unresolved: usize,
}

impl SectionResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

use crate::error::Error;
use crate::models::MediaKind;
use crate::result::Result;

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub user_agent: String,
    pub cookie: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> HttpConfig {
        HttpConfig {
            timeout_secs: 30,
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            user_agent: USER_AGENT.to_owned(),
            cookie: "_nss=1".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlixPatrolConfig {
    pub url: String,
    pub region: String,
}

impl Default for FlixPatrolConfig {
    fn default() -> FlixPatrolConfig {
        FlixPatrolConfig {
            url: "https://flixpatrol.com".to_owned(),
            region: "portugal".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraktConfig {
    pub url: String,
    pub api_version: String,
}

impl Default for TraktConfig {
    fn default() -> TraktConfig {
        TraktConfig {
            url: "https://api.trakt.tv".to_owned(),
            api_version: "2".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub url: String,
    pub max_requests: usize,
    pub window_secs: u64,
}

impl TmdbConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for TmdbConfig {
    fn default() -> TmdbConfig {
        TmdbConfig {
            url: "https://api.themoviedb.org/3".to_owned(),
            max_requests: 40,
            window_secs: 10,
        }
    }
}

/// How to choose between several candidates released in the hinted year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    #[default]
    Relevance,
    Similarity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub tie_break: TieBreak,
    pub similarity_threshold: f64,
}

impl Default for ResolverConfig {
    fn default() -> ResolverConfig {
        ResolverConfig {
            tie_break: TieBreak::Relevance,
            similarity_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub concurrency: usize,
    pub deadline_secs: u64,
}

impl PipelineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            concurrency: 2,
            deadline_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Friends,
    Private,
}

/// A remote list published for one platform section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListTarget {
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default = "display_numbers")]
    pub display_numbers: bool,
}

fn display_numbers() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionConfig {
    /// Heading text on the ranking page, e.g. "TOP 10 Movies".
    pub title: String,
    /// Omitted for mixed movie/show rankings.
    pub kind: Option<MediaKind>,
    #[serde(default)]
    pub kids: bool,
    /// Read from the dated (yesterday) page instead of the live one.
    #[serde(default)]
    pub dated: bool,
    /// Treat an empty section as a hard failure.
    #[serde(default)]
    pub required: bool,
    pub list: ListTarget,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    pub path: String,
    pub sections: Vec<SectionConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub flixpatrol: FlixPatrolConfig,
    #[serde(default)]
    pub trakt: TraktConfig,
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Config> {
        let config = fs::read_to_string(filename)?;
        Self::from_toml(&config)
    }

    pub fn from_toml(toml: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.http.max_attempts == 0 {
            return Err(Error::Config("http.max_attempts must be at least 1".to_owned()));
        }
        if self.tmdb.max_requests == 0 || self.tmdb.window_secs == 0 {
            return Err(Error::Config(
                "tmdb.max_requests and tmdb.window_secs must be positive".to_owned(),
            ));
        }

        let mut slugs: Vec<&str> = self
            .platforms
            .iter()
            .flat_map(|platform| platform.sections.iter().map(|s| s.list.slug.as_str()))
            .collect();
        let total = slugs.len();
        slugs.sort_unstable();
        slugs.dedup();
        if slugs.len() != total {
            return Err(Error::Config("list slugs must be unique".to_owned()));
        }

        Ok(())
    }

    /// Ranking page for a platform, optionally the snapshot of a given day.
    pub fn page_url(&self, platform: &PlatformConfig, date: Option<&str>) -> String {
        let base = format!(
            "{}/top10/{}/{}/",
            self.flixpatrol.url.trim_end_matches('/'),
            platform.path,
            self.flixpatrol.region
        );
        match date {
            Some(date) => format!("{}{}/", base, date),
            None => base,
        }
    }
}

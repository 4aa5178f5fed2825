use crate::config::FlixPatrolConfig;
use crate::fetcher::PageSource;
use crate::models::MediaKind;
use crate::result::Result;
use crate::sources::flixpatrol_scraper::{collapse_whitespace, parse_selector, text_of};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonRole {
    Cast,
    Director,
    Producer,
}

// Tried in order, the first credited name wins.
const PERSON_LABELS: [(&str, PersonRole); 3] = [
    ("starring", PersonRole::Cast),
    ("directed by", PersonRole::Director),
    ("produced by", PersonRole::Producer),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub role: PersonRole,
}

/// What a title page says about the title, used to pick between metadata hits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleDetails {
    pub premiere_year: Option<i32>,
    pub kind: Option<MediaKind>,
    pub person: Option<Person>,
}

/// Reads FlixPatrol title pages (`/title/{slug}/`).
pub struct FlixPatrolDetails<'a> {
    config: &'a FlixPatrolConfig,
    pages: &'a dyn PageSource,
    premiere: Selector,
    kind: Selector,
    labels: Selector,
    anchor: Selector,
    year: Regex,
}

impl<'a> FlixPatrolDetails<'a> {
    pub fn new(
        config: &'a FlixPatrolConfig,
        pages: &'a dyn PageSource,
    ) -> Result<FlixPatrolDetails<'a>> {
        Ok(FlixPatrolDetails {
            config,
            pages,
            premiere: parse_selector(r#"div[title="Premiere"]"#)?,
            kind: parse_selector(r#"div[title="Type"]"#)?,
            labels: parse_selector("dt")?,
            anchor: parse_selector("a")?,
            year: Regex::new(r"\b(19|20)\d{2}\b")?,
        })
    }

    pub fn url(&self, slug: &str) -> String {
        format!("{}/title/{}/", self.config.url.trim_end_matches('/'), slug)
    }

    pub async fn details(&self, slug: &str) -> Result<TitleDetails> {
        let page = self.pages.fetch_page(&self.url(slug)).await?;
        let document = Html::parse_document(&page);
        let details = self.parse(&document);
        debug!("Details of {}: {:?}", slug, details);

        Ok(details)
    }

    pub fn parse(&self, document: &Html) -> TitleDetails {
        TitleDetails {
            premiere_year: self.premiere_year(document),
            kind: self.kind(document),
            person: self.person(document),
        }
    }

    fn premiere_year(&self, document: &Html) -> Option<i32> {
        let premiere = document.select(&self.premiere).next()?;
        let text = collapse_whitespace(&text_of(premiere));

        self.year.find(&text)?.as_str().parse().ok()
    }

    fn kind(&self, document: &Html) -> Option<MediaKind> {
        let kind = document.select(&self.kind).next()?;
        let text = text_of(kind).to_lowercase();

        if text.contains("movie") {
            Some(MediaKind::Movie)
        } else if text.contains("tv show") || text.contains("series") {
            Some(MediaKind::Show)
        } else {
            None
        }
    }

    fn person(&self, document: &Html) -> Option<Person> {
        PERSON_LABELS.iter().find_map(|(label, role)| {
            let term = document
                .select(&self.labels)
                .find(|term| collapse_whitespace(&text_of(*term)).to_lowercase() == *label)?;

            self.credited(term).map(|name| Person { name, role: *role })
        })
    }

    /// First linked name in the `dd.grow` following a label.
    fn credited(&self, term: ElementRef) -> Option<String> {
        let names = term
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|sibling| {
                sibling.value().name() == "dd" && sibling.value().classes().any(|class| class == "grow")
            })?;
        let anchor = names.select(&self.anchor).next()?;

        Some(collapse_whitespace(&text_of(anchor))).filter(|name| !name.is_empty())
    }
}

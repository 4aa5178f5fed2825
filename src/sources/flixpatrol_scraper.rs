use crate::error::Error;
use crate::fetcher::PageSource;
use crate::models::{MediaKind, RankedEntry};
use crate::result::Result;

use scraper::{ElementRef, Html, Selector};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

const MAX_ROWS: usize = 10;

const HEADINGS: &str = "h2, h3, h4";
const TABLE_ROWS: &str = "tbody tr";
const ANY_ROWS: &str = "tr";
const GROUPED_ROWS: &str = "[role=row], .table-row";
// FlixPatrol renders the rank in a narrow cell ahead of the title.
const RANK_CELL: &str = ".table-td.w-12";
const CELLS: &str = "td, [role=cell], .table-td";
const ANCHOR: &str = "a[href]";

struct Selectors {
    headings: Selector,
    table_rows: Selector,
    any_rows: Selector,
    grouped_rows: Selector,
    rank_cell: Selector,
    cells: Selector,
    anchor: Selector,
}

impl Selectors {
    fn new() -> Result<Selectors> {
        Ok(Selectors {
            headings: parse_selector(HEADINGS)?,
            table_rows: parse_selector(TABLE_ROWS)?,
            any_rows: parse_selector(ANY_ROWS)?,
            grouped_rows: parse_selector(GROUPED_ROWS)?,
            rank_cell: parse_selector(RANK_CELL)?,
            cells: parse_selector(CELLS)?,
            anchor: parse_selector(ANCHOR)?,
        })
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|err| Error::Config(format!("Could not parse selector {}: {:?}", selector, err)))
}

/// Extracts top-10 sections from FlixPatrol ranking pages.
///
/// Pages are cached by URL for the lifetime of the scraper, since one page
/// usually carries several sections. Fetches of distinct URLs run concurrently.
pub struct FlixPatrolScraper<'a> {
    pages: &'a dyn PageSource,
    selectors: Selectors,
    cache: Mutex<HashMap<String, Arc<OnceCell<Arc<str>>>>>,
}

impl<'a> FlixPatrolScraper<'a> {
    pub fn new(pages: &'a dyn PageSource) -> Result<FlixPatrolScraper<'a>> {
        Ok(FlixPatrolScraper {
            pages,
            selectors: Selectors::new()?,
            cache: Mutex::new(HashMap::new()),
        })
    }

    async fn load_page(&self, url: &str) -> Result<Arc<str>> {
        let cell = {
            let mut cache = self.cache.lock().await;
            cache.entry(url.to_owned()).or_default().clone()
        };

        if let Some(page) = cell.get() {
            debug!("Using cached page for {}", url);
            return Ok(page.clone());
        }

        let page = cell
            .get_or_try_init(|| async {
                let page = self.pages.fetch_page(url).await?;
                Ok::<Arc<str>, Error>(Arc::from(page))
            })
            .await?;

        Ok(page.clone())
    }

    pub async fn scrape(
        &self,
        url: &str,
        section_title: &str,
        kind: Option<MediaKind>,
    ) -> Result<Vec<RankedEntry>> {
        let page = self.load_page(url).await?;
        let document = Html::parse_document(&page);
        let entries = self.extract_section(&document, section_title, kind);
        info!("Scraped {} entries from {} ({})", entries.len(), section_title, url);

        Ok(entries)
    }

    pub fn extract_section(
        &self,
        document: &Html,
        section_title: &str,
        kind: Option<MediaKind>,
    ) -> Vec<RankedEntry> {
        let heading = match self.find_heading(document, section_title) {
            Some(heading) => heading,
            None => {
                warn!(
                    "{}",
                    Error::StructureDrift(format!("no heading matches '{}'", section_title))
                );
                return Vec::new();
            }
        };
        debug!("Found '{}' in <{}>", section_title, heading.value().name());

        let rows = self.locate_rows(heading);
        if rows.is_empty() {
            warn!(
                "{}",
                Error::StructureDrift(format!("no rows follow '{}'", section_title))
            );
            return Vec::new();
        }

        let mut entries: Vec<RankedEntry> = Vec::new();
        for row in rows.into_iter().take(MAX_ROWS) {
            match self.parse_row(row, kind) {
                Ok(entry) => match entries.last() {
                    Some(last) if entry.rank <= last.rank => warn!(
                        "Skipping '{}' in {}: rank {} does not follow {}",
                        entry.title, section_title, entry.rank, last.rank
                    ),
                    _ => entries.push(entry),
                },
                Err(err) => warn!("Skipping row in {}: {}", section_title, err),
            }
        }

        entries
    }

    fn find_heading<'b>(&self, document: &'b Html, section_title: &str) -> Option<ElementRef<'b>> {
        let wanted = collapse_whitespace(section_title).to_lowercase();

        document
            .select(&self.selectors.headings)
            .find(|heading| collapse_whitespace(&text_of(*heading)).to_lowercase() == wanted)
    }

    /// Rows of the card holding the heading, else of the nearest block after it.
    fn locate_rows<'b>(&self, heading: ElementRef<'b>) -> Vec<ElementRef<'b>> {
        for ancestor in heading.ancestors().filter_map(ElementRef::wrap) {
            if ancestor.value().name() == "body" {
                break;
            }
            if ancestor.value().classes().any(|class| class == "card") {
                let rows = self.rows_in(ancestor);
                if !rows.is_empty() {
                    return rows;
                }
                break;
            }
        }

        let mut node = heading;
        loop {
            for sibling in node.next_siblings().filter_map(ElementRef::wrap) {
                if self.holds_heading(sibling) {
                    return Vec::new();
                }
                let rows = self.rows_in(sibling);
                if !rows.is_empty() {
                    return rows;
                }
            }

            match node.parent().and_then(ElementRef::wrap) {
                Some(parent) if parent.value().name() != "body" => node = parent,
                _ => return Vec::new(),
            }
        }
    }

    fn holds_heading(&self, element: ElementRef) -> bool {
        matches!(element.value().name(), "h2" | "h3" | "h4")
            || element.select(&self.selectors.headings).next().is_some()
    }

    fn rows_in<'b>(&self, container: ElementRef<'b>) -> Vec<ElementRef<'b>> {
        let has_cells = |row: &ElementRef| row.select(&self.selectors.cells).next().is_some();

        let rows: Vec<ElementRef> = container
            .select(&self.selectors.table_rows)
            .filter(has_cells)
            .collect();
        if !rows.is_empty() {
            return rows;
        }

        let rows: Vec<ElementRef> = container
            .select(&self.selectors.any_rows)
            .filter(has_cells)
            .collect();
        if !rows.is_empty() {
            return rows;
        }

        container.select(&self.selectors.grouped_rows).collect()
    }

    fn parse_row(&self, row: ElementRef, kind: Option<MediaKind>) -> Result<RankedEntry> {
        let rank_cell = row
            .select(&self.selectors.rank_cell)
            .next()
            .or_else(|| row.select(&self.selectors.cells).next())
            .ok_or_else(|| Error::StructureDrift("row has no cells".to_owned()))?;

        let rank_text = text_of(rank_cell);
        let rank = parse_rank(&rank_text).ok_or_else(|| {
            Error::StructureDrift(format!("invalid rank '{}'", rank_text.trim()))
        })?;

        let anchor = row
            .select(&self.selectors.anchor)
            .next()
            .ok_or_else(|| Error::StructureDrift(format!("row {} has no link", rank)))?;

        let href = anchor.value().attr("href").unwrap_or_default();
        let slug = slug_from_href(href)
            .ok_or_else(|| Error::StructureDrift(format!("no slug in href '{}'", href)))?;

        let title = collapse_whitespace(&text_of(anchor));
        if title.is_empty() {
            return Err(Error::StructureDrift(format!("row {} has no title", rank)));
        }

        Ok(RankedEntry {
            rank,
            title,
            slug,
            kind,
        })
    }
}

pub(crate) fn text_of(element: ElementRef) -> String {
    element.text().collect()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn parse_rank(text: &str) -> Option<u8> {
    text.trim()
        .trim_end_matches('.')
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|rank| (1..=MAX_ROWS as u8).contains(rank))
}

/// Last non-empty path segment, ignoring query and fragment.
fn slug_from_href(href: &str) -> Option<String> {
    let path = href.split(&['?', '#'][..]).next().unwrap_or_default();

    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|slug| !slug.is_empty() && !slug.contains(':'))
        .map(ToOwned::to_owned)
}

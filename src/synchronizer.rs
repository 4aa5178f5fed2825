use crate::config::ListTarget;
use crate::error::Error;
use crate::models::ResolvedItem;
use crate::result::Result;
use crate::sources::{Catalog, ItemsPayload, RemoteList};

use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum SyncOutcome {
    Synced { added: u64 },
    /// The list exists but was left untouched because nothing resolved.
    NothingToAdd,
    /// The add call succeeded without adding anything.
    Partial {
        submitted: usize,
        added: u64,
        existing: u64,
    },
    Failed(Error),
}

impl SyncOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }

    pub fn added(&self) -> u64 {
        match self {
            SyncOutcome::Synced { added } | SyncOutcome::Partial { added, .. } => *added,
            _ => 0,
        }
    }
}

/// Replaces the contents of a remote list with a freshly resolved ranking.
pub struct ListSynchronizer<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> ListSynchronizer<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> ListSynchronizer<'a> {
        ListSynchronizer { catalog }
    }

    pub async fn sync(&self, target: &ListTarget, items: &[ResolvedItem]) -> SyncOutcome {
        let list = match self.ensure_list(target).await {
            Ok(list) => list,
            Err(err) => {
                error!("Could not prepare list {}: {}", target.slug, err);
                return SyncOutcome::Failed(err);
            }
        };

        let slug = list.slug;
        if items.is_empty() {
            warn!("Nothing to add to {}, leaving it untouched", slug);
            return SyncOutcome::NothingToAdd;
        }

        if list.item_count > 0 {
            self.clear(&slug).await;
        } else {
            debug!("{} is already empty", slug);
        }

        let payload = ItemsPayload::from_items(items);
        let submitted = payload.len();
        info!(
            "Adding {} movies and {} shows to {}",
            payload.movies.len(),
            payload.shows.len(),
            slug
        );

        match self.catalog.add_items(&slug, &payload).await {
            Ok(mutation) => {
                let not_found = mutation.not_found.movies.len() + mutation.not_found.shows.len();
                if not_found > 0 {
                    warn!("{} items were not found when updating {}", not_found, slug);
                }

                let added = mutation.added.total();
                if added > 0 {
                    info!("Updated {} with {} of {} items", slug, added, submitted);
                    SyncOutcome::Synced { added }
                } else {
                    let existing = mutation.existing.total();
                    warn!(
                        "{} accepted {} items but added none, {} already present",
                        slug, submitted, existing
                    );
                    SyncOutcome::Partial {
                        submitted,
                        added,
                        existing,
                    }
                }
            }
            Err(err) => {
                error!("Could not update {}: {}", slug, err);
                SyncOutcome::Failed(err)
            }
        }
    }

    /// The target list, created when missing.
    async fn ensure_list(&self, target: &ListTarget) -> Result<RemoteList> {
        let lists = self.catalog.lists().await?;
        if let Some(list) = lists.into_iter().find(|list| list.slug == target.slug) {
            debug!(
                "List {} ('{}') exists with {} items",
                list.slug, list.name, list.item_count
            );
            return Ok(list);
        }

        info!("Creating list {}", target.slug);
        let created = self.catalog.create_list(target).await?;
        if created.slug != target.slug {
            warn!(
                "List {} was created as {} ('{}'), check its name",
                target.slug, created.slug, created.name
            );
        }

        Ok(created)
    }

    /// Removes the current items. Failures are logged and do not block the add.
    async fn clear(&self, slug: &str) {
        let items = match self.catalog.list_items(slug).await {
            Ok(items) => items,
            Err(err) => {
                warn!("Could not read {} before clearing it: {}", slug, err);
                return;
            }
        };

        if items.is_empty() {
            debug!("{} is already empty", slug);
            return;
        }

        match self.catalog.remove_items(slug, &items).await {
            Ok(mutation) => info!("Removed {} items from {}", mutation.deleted.total(), slug),
            Err(err) => warn!("Could not clear {}: {}", slug, err),
        }
    }
}

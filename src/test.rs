#[cfg(test)]
pub mod helpers {
    use crate::config::ListTarget;
    use crate::error::Error;
    use crate::fetcher::{JsonSource, PageSource};
    use crate::models::MediaKind;
    use crate::result::Result;
    use crate::sources::{Candidate, Catalog, Counts, ItemsPayload, ListMutation, RemoteList};

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::{collections::HashMap, fs, sync::Mutex, time::Duration};

    pub fn candidate(
        kind: MediaKind,
        id: u64,
        title: &str,
        year: Option<i32>,
        slug: &str,
    ) -> Candidate {
        Candidate {
            kind,
            id,
            title: title.to_owned(),
            year,
            slug: slug.to_owned(),
        }
    }

    pub fn list_target(slug: &str) -> ListTarget {
        ListTarget {
            name: slug.replace('-', " "),
            slug: slug.to_owned(),
            description: format!("Description of {}", slug),
            privacy: Default::default(),
            display_numbers: true,
        }
    }

    fn http_error(url: &str, status: StatusCode) -> Error {
        Error::Http {
            url: url.to_owned(),
            status,
            body: format!("{{\"error\":\"{}\"}}", status.as_u16()),
        }
    }

    /// Serves HTML from memory, counting fetches per URL.
    #[derive(Debug, Default)]
    pub struct StaticPages {
        pages: HashMap<String, String>,
        delay: Option<Duration>,
        fetches: Mutex<HashMap<String, usize>>,
    }

    impl StaticPages {
        pub fn with_page(mut self, url: &str, html: &str) -> StaticPages {
            self.pages.insert(url.to_owned(), html.to_owned());
            self
        }

        /// Every fetch takes `delay` before answering.
        pub fn with_delay(mut self, delay: Duration) -> StaticPages {
            self.delay = Some(delay);
            self
        }

        pub fn with_fixture(self, url: &str, filename: &str) -> StaticPages {
            let html = fs::read_to_string(filename).unwrap();
            self.with_page(url, &html)
        }

        pub fn fetches(&self, url: &str) -> usize {
            self.fetches
                .lock()
                .unwrap()
                .get(url)
                .copied()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl PageSource for StaticPages {
        async fn fetch_page(&self, url: &str) -> Result<String> {
            *self
                .fetches
                .lock()
                .unwrap()
                .entry(url.to_owned())
                .or_default() += 1;

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| http_error(url, StatusCode::NOT_FOUND))
        }
    }

    /// Answers JSON GETs from memory, keyed by URL and the non-secret query.
    ///
    /// Calls without an `api_key` are rejected with 401 and unknown keys get 404.
    #[derive(Debug, Default)]
    pub struct FakeJson {
        responses: HashMap<String, serde_json::Value>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeJson {
        pub fn with_response(mut self, key: &str, json: serde_json::Value) -> FakeJson {
            self.responses.insert(key.to_owned(), json);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn key(url: &str, query: &[(&str, &str)]) -> String {
            let params: Vec<String> = query
                .iter()
                .filter(|(name, _)| *name != "api_key")
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();

            if params.is_empty() {
                url.to_owned()
            } else {
                format!("{}?{}", url, params.join("&"))
            }
        }
    }

    #[async_trait]
    impl JsonSource for FakeJson {
        async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
            let key = Self::key(url, query);
            self.calls.lock().unwrap().push(key.clone());

            if !query.iter().any(|(name, value)| *name == "api_key" && !value.is_empty()) {
                return Err(http_error(url, StatusCode::UNAUTHORIZED));
            }

            self.responses
                .get(&key)
                .cloned()
                .ok_or_else(|| http_error(&key, StatusCode::NOT_FOUND))
        }
    }

    /// In-memory catalog keeping lists in insertion order and recording calls.
    #[derive(Debug, Default)]
    pub struct FakeCatalog {
        searches: HashMap<String, Vec<Candidate>>,
        tmdb: HashMap<u64, Candidate>,
        token_status: Option<StatusCode>,
        year_filtered: bool,
        fail_search: bool,
        fail_lists: bool,
        fail_remove: bool,
        fail_add: Option<StatusCode>,
        ignore_adds: bool,
        lists: Mutex<Vec<(String, Vec<(MediaKind, u64)>)>>,
        search_calls: Mutex<Vec<(String, Option<i32>)>>,
        add_calls: Mutex<Vec<(String, ItemsPayload)>>,
        remove_calls: Mutex<Vec<(String, ItemsPayload)>>,
        created: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        pub fn with_search(mut self, query: &str, candidates: Vec<Candidate>) -> FakeCatalog {
            self.searches.insert(query.to_owned(), candidates);
            self
        }

        pub fn with_tmdb(mut self, tmdb_id: u64, candidate: Candidate) -> FakeCatalog {
            self.tmdb.insert(tmdb_id, candidate);
            self
        }

        pub fn with_list(self, slug: &str, items: &[(MediaKind, u64)]) -> FakeCatalog {
            self.lists
                .lock()
                .unwrap()
                .push((slug.to_owned(), items.to_vec()));
            self
        }

        pub fn rejecting_token(mut self, status: StatusCode) -> FakeCatalog {
            self.token_status = Some(status);
            self
        }

        /// Drops candidates outside the requested year, like the real search filter.
        pub fn year_filtered(mut self) -> FakeCatalog {
            self.year_filtered = true;
            self
        }

        pub fn failing_search(mut self) -> FakeCatalog {
            self.fail_search = true;
            self
        }

        pub fn failing_lists(mut self) -> FakeCatalog {
            self.fail_lists = true;
            self
        }

        pub fn failing_remove(mut self) -> FakeCatalog {
            self.fail_remove = true;
            self
        }

        pub fn failing_add(mut self, status: StatusCode) -> FakeCatalog {
            self.fail_add = Some(status);
            self
        }

        /// Accepts add calls without adding anything.
        pub fn ignoring_adds(mut self) -> FakeCatalog {
            self.ignore_adds = true;
            self
        }

        pub fn search_calls(&self) -> Vec<(String, Option<i32>)> {
            self.search_calls.lock().unwrap().clone()
        }

        pub fn add_calls(&self) -> Vec<(String, ItemsPayload)> {
            self.add_calls.lock().unwrap().clone()
        }

        pub fn remove_calls(&self) -> Vec<(String, ItemsPayload)> {
            self.remove_calls.lock().unwrap().clone()
        }

        pub fn created(&self) -> Vec<String> {
            self.created.lock().unwrap().clone()
        }

        pub fn items(&self, slug: &str) -> Option<Vec<(MediaKind, u64)>> {
            self.lists
                .lock()
                .unwrap()
                .iter()
                .find(|(list, _)| list == slug)
                .map(|(_, items)| items.clone())
        }

        fn count(counts: &mut Counts, kind: MediaKind) {
            match kind {
                MediaKind::Movie => counts.movies += 1,
                MediaKind::Show => counts.shows += 1,
            }
        }

        fn refs(items: &ItemsPayload) -> Vec<(MediaKind, u64)> {
            let movies = items.movies.iter().map(|item| (MediaKind::Movie, item.ids.trakt));
            let shows = items.shows.iter().map(|item| (MediaKind::Show, item.ids.trakt));
            movies.chain(shows).collect()
        }
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn check_token(&self) -> Result<String> {
            match self.token_status {
                Some(status) => Err(Error::Authentication {
                    status,
                    body: "{\"error\":\"invalid_grant\"}".to_owned(),
                }),
                None => Ok("tester".to_owned()),
            }
        }

        async fn search(
            &self,
            kind: Option<MediaKind>,
            query: &str,
            year: Option<i32>,
        ) -> Result<Vec<Candidate>> {
            self.search_calls
                .lock()
                .unwrap()
                .push((query.to_owned(), year));

            if self.fail_search {
                return Err(http_error("/search", StatusCode::SERVICE_UNAVAILABLE));
            }

            Ok(self
                .searches
                .get(query)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|candidate| kind.map_or(true, |kind| candidate.kind == kind))
                .filter(|candidate| !self.year_filtered || year.is_none() || candidate.year == year)
                .collect())
        }

        async fn lookup_tmdb(&self, tmdb_id: u64, kind: MediaKind) -> Result<Option<Candidate>> {
            Ok(self
                .tmdb
                .get(&tmdb_id)
                .filter(|candidate| candidate.kind == kind)
                .cloned())
        }

        async fn lists(&self) -> Result<Vec<RemoteList>> {
            if self.fail_lists {
                return Err(http_error("/users/me/lists", StatusCode::BAD_GATEWAY));
            }

            Ok(self
                .lists
                .lock()
                .unwrap()
                .iter()
                .map(|(slug, items)| RemoteList {
                    name: slug.clone(),
                    slug: slug.clone(),
                    item_count: items.len() as u64,
                })
                .collect())
        }

        async fn create_list(&self, target: &ListTarget) -> Result<RemoteList> {
            self.created.lock().unwrap().push(target.slug.clone());
            self.lists
                .lock()
                .unwrap()
                .push((target.slug.clone(), Vec::new()));

            Ok(RemoteList {
                name: target.name.clone(),
                slug: target.slug.clone(),
                item_count: 0,
            })
        }

        async fn list_items(&self, slug: &str) -> Result<ItemsPayload> {
            let items = self
                .items(slug)
                .ok_or_else(|| http_error(slug, StatusCode::NOT_FOUND))?;

            let mut payload = ItemsPayload::default();
            for (kind, id) in items {
                payload.push(kind, id);
            }
            Ok(payload)
        }

        async fn add_items(&self, slug: &str, items: &ItemsPayload) -> Result<ListMutation> {
            self.add_calls
                .lock()
                .unwrap()
                .push((slug.to_owned(), items.clone()));

            if let Some(status) = self.fail_add {
                return Err(Error::RemoteWrite {
                    slug: slug.to_owned(),
                    status,
                    body: "{\"error\":\"rejected\"}".to_owned(),
                });
            }

            let mut mutation = ListMutation::default();
            if self.ignore_adds {
                return Ok(mutation);
            }

            let mut lists = self.lists.lock().unwrap();
            let (_, list) = lists
                .iter_mut()
                .find(|(list, _)| list == slug)
                .ok_or_else(|| http_error(slug, StatusCode::NOT_FOUND))?;

            for item in Self::refs(items) {
                if list.contains(&item) {
                    Self::count(&mut mutation.existing, item.0);
                } else {
                    list.push(item);
                    Self::count(&mut mutation.added, item.0);
                }
            }

            Ok(mutation)
        }

        async fn remove_items(&self, slug: &str, items: &ItemsPayload) -> Result<ListMutation> {
            self.remove_calls
                .lock()
                .unwrap()
                .push((slug.to_owned(), items.clone()));

            if self.fail_remove {
                return Err(Error::RemoteWrite {
                    slug: slug.to_owned(),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: String::new(),
                });
            }

            let mut mutation = ListMutation::default();
            let mut lists = self.lists.lock().unwrap();
            if let Some((_, list)) = lists.iter_mut().find(|(list, _)| list == slug) {
                for item in Self::refs(items) {
                    if let Some(index) = list.iter().position(|existing| *existing == item) {
                        list.remove(index);
                        Self::count(&mut mutation.deleted, item.0);
                    }
                }
            }

            Ok(mutation)
        }
    }
}

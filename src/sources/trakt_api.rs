use crate::config::{ListTarget, TraktConfig};
use crate::credentials::Credentials;
use crate::error::Error;
use crate::fetcher::Fetcher;
use crate::models::MediaKind;
use crate::result::Result;
use crate::sources::{Candidate, Catalog, ItemsPayload, ListMutation, RemoteList};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, info};

type Json = serde_json::Value;

/// Client for the Trakt API, acting on behalf of the authenticated user.
pub struct TraktAPI<'a> {
    config: &'a TraktConfig,
    fetcher: &'a Fetcher,
    headers: HeaderMap,
}

impl<'a> TraktAPI<'a> {
    pub fn new(
        config: &'a TraktConfig,
        fetcher: &'a Fetcher,
        credentials: &Credentials,
    ) -> Result<TraktAPI<'a>> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            Self::header_value(&format!("Bearer {}", credentials.access_token))?,
        );
        headers.insert("trakt-api-key", Self::header_value(&credentials.client_id)?);
        headers.insert("trakt-api-version", Self::header_value(&config.api_version)?);

        Ok(TraktAPI {
            config,
            fetcher,
            headers,
        })
    }

    fn header_value(value: &str) -> Result<HeaderValue> {
        HeaderValue::from_str(value)
            .map_err(|_| Error::Config("credentials contain invalid header characters".to_owned()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn extract_value<'j>(json: &'j Json, key: &str) -> &'j Json {
        json.pointer(key).unwrap_or(&Json::Null)
    }

    async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .fetcher
            .execute(&url, || {
                self.fetcher
                    .client()
                    .get(&url)
                    .headers(self.headers.clone())
                    .query(query)
            })
            .await?;

        Ok(response.json::<T>().await?)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .fetcher
            .execute(&url, || {
                self.fetcher
                    .client()
                    .post(&url)
                    .headers(self.headers.clone())
                    .json(body)
            })
            .await?;

        Ok(response.json::<T>().await?)
    }

    fn search_path(kind: Option<MediaKind>) -> String {
        match kind {
            Some(kind) => format!("/search/{}", kind.as_str()),
            None => "/search/movie,show".to_owned(),
        }
    }

    /// One search hit; `None` for people, episodes or hits without an id.
    fn parse_candidate(result: &Json) -> Option<Candidate> {
        let kind = MediaKind::from_catalog_type(Self::extract_value(result, "/type").as_str()?)?;
        let media = Self::extract_value(result, &format!("/{}", kind.as_str()));

        Some(Candidate {
            kind,
            id: Self::extract_value(media, "/ids/trakt").as_u64()?,
            title: Self::extract_value(media, "/title")
                .as_str()
                .unwrap_or_default()
                .to_owned(),
            year: Self::extract_value(media, "/year")
                .as_i64()
                .and_then(|year| i32::try_from(year).ok()),
            slug: Self::extract_value(media, "/ids/slug")
                .as_str()
                .unwrap_or_default()
                .to_owned(),
        })
    }

    fn parse_list(list: &Json) -> Option<RemoteList> {
        Some(RemoteList {
            name: Self::extract_value(list, "/name")
                .as_str()
                .unwrap_or_default()
                .to_owned(),
            slug: Self::extract_value(list, "/ids/slug").as_str()?.to_owned(),
            item_count: Self::extract_value(list, "/item_count")
                .as_u64()
                .unwrap_or_default(),
        })
    }

    fn parse_items(items: &[Json]) -> ItemsPayload {
        let mut payload = ItemsPayload::default();
        for item in items {
            let kind = Self::extract_value(item, "/type")
                .as_str()
                .and_then(MediaKind::from_catalog_type);
            if let Some(kind) = kind {
                let key = format!("/{}/ids/trakt", kind.as_str());
                if let Some(id) = Self::extract_value(item, &key).as_u64() {
                    payload.push(kind, id);
                }
            }
        }
        payload
    }

    fn list_body(target: &ListTarget) -> Json {
        json!({
            "name": target.name,
            "description": target.description,
            "privacy": target.privacy,
            "display_numbers": target.display_numbers,
            "allow_comments": true,
            "sort_by": "rank",
            "sort_how": "asc",
        })
    }

    fn authentication_error(err: Error) -> Error {
        match err {
            Error::Http { status, body, .. }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                Error::Authentication { status, body }
            }
            other => other,
        }
    }
}

#[async_trait]
impl Catalog for TraktAPI<'_> {
    async fn check_token(&self) -> Result<String> {
        let user: Json = self
            .get("/users/me", &[])
            .await
            .map_err(Self::authentication_error)?;
        let username = Self::extract_value(&user, "/username")
            .as_str()
            .unwrap_or_default()
            .to_owned();
        info!("Authenticated as {}", username);

        Ok(username)
    }

    async fn search(
        &self,
        kind: Option<MediaKind>,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<Candidate>> {
        let mut params = vec![("query", query.to_owned())];
        if let Some(year) = year {
            params.push(("years", year.to_string()));
        }

        let results: Vec<Json> = self.get(&Self::search_path(kind), &params).await?;
        let candidates: Vec<Candidate> = results.iter().filter_map(Self::parse_candidate).collect();
        debug!("{} candidates for '{}' ({:?})", candidates.len(), query, year);

        Ok(candidates)
    }

    async fn lookup_tmdb(&self, tmdb_id: u64, kind: MediaKind) -> Result<Option<Candidate>> {
        let path = format!("/search/tmdb/{}", tmdb_id);
        let results: Vec<Json> = self
            .get(&path, &[("type", kind.as_str().to_owned())])
            .await?;

        Ok(results
            .iter()
            .filter_map(Self::parse_candidate)
            .find(|candidate| candidate.kind == kind))
    }

    async fn lists(&self) -> Result<Vec<RemoteList>> {
        let lists: Vec<Json> = self.get("/users/me/lists", &[]).await?;

        Ok(lists.iter().filter_map(Self::parse_list).collect())
    }

    async fn create_list(&self, target: &ListTarget) -> Result<RemoteList> {
        let created: Json = self
            .post("/users/me/lists", &Self::list_body(target))
            .await
            .map_err(|err| err.into_remote_write(&target.slug))?;
        info!("Created list {}", target.slug);

        Ok(Self::parse_list(&created).unwrap_or_else(|| RemoteList {
            name: target.name.clone(),
            slug: target.slug.clone(),
            item_count: 0,
        }))
    }

    async fn list_items(&self, slug: &str) -> Result<ItemsPayload> {
        let path = format!("/users/me/lists/{}/items", slug);
        let items: Vec<Json> = self.get(&path, &[]).await?;

        Ok(Self::parse_items(&items))
    }

    async fn add_items(&self, slug: &str, items: &ItemsPayload) -> Result<ListMutation> {
        let path = format!("/users/me/lists/{}/items", slug);

        self.post(&path, items)
            .await
            .map_err(|err| err.into_remote_write(slug))
    }

    async fn remove_items(&self, slug: &str, items: &ItemsPayload) -> Result<ListMutation> {
        let path = format!("/users/me/lists/{}/items/remove", slug);

        self.post(&path, items)
            .await
            .map_err(|err| err.into_remote_write(slug))
    }
}

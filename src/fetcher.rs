use crate::config::HttpConfig;
use crate::error::{truncate, Error};
use crate::result::Result;
use crate::retry::RetryPolicy;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, USER_AGENT},
    Client, RequestBuilder, Response,
};
use tracing::debug;

const BODY_LIMIT: usize = 2000;

/// Anything that can hand back the HTML of a ranking page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// Anything that can answer a GET with a JSON document.
#[async_trait]
pub trait JsonSource: Send + Sync {
    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<serde_json::Value>;
}

/// HTTP client shared by the scraper, the catalog client and the enricher.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
    page_headers: HeaderMap,
}

impl Fetcher {
    pub fn new(config: &HttpConfig) -> Result<Fetcher> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|err| Error::Config(format!("invalid user agent: {}", err)))?;
        let cookie = HeaderValue::from_str(&config.cookie)
            .map_err(|err| Error::Config(format!("invalid cookie: {}", err)))?;

        let mut page_headers = HeaderMap::new();
        page_headers.insert(USER_AGENT, user_agent);
        page_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        page_headers.insert(COOKIE, cookie);

        Ok(Fetcher {
            client,
            retry: RetryPolicy::from_config(config),
            page_headers,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sends the request built by `build` under the retry policy.
    ///
    /// A fresh request is built for every attempt. Non-2xx responses become
    /// `Error::Http` carrying the status and a bounded copy of the body.
    pub async fn execute<F>(&self, label: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        self.retry
            .run(label, || self.send_once(label, build()))
            .await
    }

    async fn send_once(&self, label: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} responded with {}", label, status);

        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Http {
            url,
            status,
            body: truncate(&body, BODY_LIMIT),
        })
    }

    /// GET of a ranking or detail page with the browser-like headers.
    fn page_request(&self, url: &str) -> RequestBuilder {
        self.client.get(url).headers(self.page_headers.clone())
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.execute(url, || self.page_request(url)).await?;

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.fetch(url).await
    }
}

#[async_trait]
impl JsonSource for Fetcher {
    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let response = self
            .execute(url, || self.client.get(url).query(query))
            .await?;

        Ok(response.json().await?)
    }
}

//! External web search and page fetch (SPEC_FULL.md §4.L).
//!
//! Generalizes the teacher's daedra-backed `SearchTool`/`FetchPageTool` pair (see
//! `crate::tools::registry` history) into a `WebSearch` trait with one implementation per
//! `provider∈{serpapi,bing,ddg,none}`. Only the `ddg` variant reuses the teacher's actual
//! dependency (`daedra`); `serpapi`/`bing` are thin `reqwest` JSON clients since daedra itself
//! only speaks DuckDuckGo, and `none` is a stub for when no web backend is configured.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::types::{CoreError, Result};
use crate::utils::toml_config::{WebConfig, WebSearchProvider};

/// One web search result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// `search(query, k) -> [{title, url, snippet}]`; `fetch(url) -> text` (SPEC_FULL.md §4.L).
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>>;
    async fn fetch(&self, url: &str) -> Result<String>;
    fn provider_name(&self) -> &'static str;
}

/// Rejects non-HTTP(S) schemes and strips known redirector wrappers before use.
///
/// Search engines commonly wrap outbound links in a tracking redirect (`.../l/?uddg=<target>`,
/// `.../url?q=<target>`); callers should pass already-normalized URLs to `fetch`, so this is
/// exposed for implementations to call on their own raw results.
pub fn normalize_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw).map_err(|e| CoreError::Validation(format!("invalid URL '{raw}': {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(CoreError::Validation(format!(
            "unsupported URL scheme '{}': only http/https are allowed",
            parsed.scheme()
        )));
    }

    for param in ["uddg", "url", "q", "u"] {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == param) {
            if let Ok(inner) = Url::parse(&target) {
                if inner.scheme() == "http" || inner.scheme() == "https" {
                    return Ok(inner.to_string());
                }
            }
        }
    }

    Ok(parsed.to_string())
}

/// No web backend configured. `search` returns an empty list; `fetch` still works, since a bare
/// URL pasted by the user (`urls` on `/deep-research/ask`) is a local operation independent of
/// the configured search provider.
pub struct NoneWebSearch;

#[async_trait]
impl WebSearch for NoneWebSearch {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<SearchResult>> {
        Ok(Vec::new())
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        fetch_via_http(url, Duration::from_secs(10)).await
    }

    fn provider_name(&self) -> &'static str {
        "none"
    }
}

/// DuckDuckGo search via the `daedra` crate, matching the teacher's `SearchTool`/`FetchPageTool`.
pub struct DdgWebSearch {
    fetch_timeout: Duration,
}

impl DdgWebSearch {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self { fetch_timeout }
    }
}

#[async_trait]
impl WebSearch for DdgWebSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: k,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&args)
            .await
            .map_err(|e| CoreError::TransientUpstream(format!("ddg search failed: {e}")))?;

        Ok(response
            .data
            .into_iter()
            .filter_map(|r| {
                let url = normalize_url(&r.url).ok()?;
                Some(SearchResult {
                    title: r.title,
                    url,
                    snippet: r.description,
                })
            })
            .take(k)
            .collect())
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let normalized = normalize_url(url)?;
        let args = daedra::VisitPageArgs {
            url: normalized,
            include_images: false,
            selector: None,
        };

        let fetched = tokio::time::timeout(self.fetch_timeout, daedra::tools::fetch::fetch_page(&args))
            .await
            .map_err(|_| CoreError::DeadlineExceeded(format!("fetching '{url}' exceeded the configured timeout")))?
            .map_err(|e| CoreError::TransientUpstream(format!("fetch failed for '{url}': {e}")))?;

        Ok(fetched.content)
    }

    fn provider_name(&self) -> &'static str {
        "ddg"
    }
}

/// Shared HTTP-JSON search client for provider APIs that return a flat results array.
struct HttpSearchClient {
    client: reqwest::Client,
    api_key: String,
    fetch_timeout: Duration,
}

impl HttpSearchClient {
    fn new(api_key: String, fetch_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            fetch_timeout,
        }
    }
}

/// SerpApi (`serpapi.com`) organic search results.
pub struct SerpapiWebSearch {
    inner: HttpSearchClient,
}

impl SerpapiWebSearch {
    pub fn new(api_key: String, fetch_timeout: Duration) -> Self {
        Self {
            inner: HttpSearchClient::new(api_key, fetch_timeout),
        }
    }
}

#[async_trait]
impl WebSearch for SerpapiWebSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .inner
            .client
            .get("https://serpapi.com/search.json")
            .query(&[("q", query), ("api_key", self.inner.api_key.as_str()), ("engine", "google")])
            .timeout(self.inner.fetch_timeout)
            .send()
            .await
            .map_err(|e| CoreError::TransientUpstream(format!("serpapi request failed: {e}")))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::TransientUpstream(format!("serpapi response parse failed: {e}")))?;

        let results = body
            .get("organic_results")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(results
            .into_iter()
            .filter_map(|r| {
                let url = normalize_url(r.get("link")?.as_str()?).ok()?;
                Some(SearchResult {
                    title: r.get("title")?.as_str()?.to_string(),
                    url,
                    snippet: r.get("snippet").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                })
            })
            .take(k)
            .collect())
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        fetch_via_http(url, self.inner.fetch_timeout).await
    }

    fn provider_name(&self) -> &'static str {
        "serpapi"
    }
}

/// Bing Web Search API (Azure Cognitive Services).
pub struct BingWebSearch {
    inner: HttpSearchClient,
}

impl BingWebSearch {
    pub fn new(api_key: String, fetch_timeout: Duration) -> Self {
        Self {
            inner: HttpSearchClient::new(api_key, fetch_timeout),
        }
    }
}

#[async_trait]
impl WebSearch for BingWebSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .inner
            .client
            .get("https://api.bing.microsoft.com/v7.0/search")
            .query(&[("q", query), ("count", &k.to_string())])
            .header("Ocp-Apim-Subscription-Key", &self.inner.api_key)
            .timeout(self.inner.fetch_timeout)
            .send()
            .await
            .map_err(|e| CoreError::TransientUpstream(format!("bing request failed: {e}")))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::TransientUpstream(format!("bing response parse failed: {e}")))?;

        let results = body
            .get("webPages")
            .and_then(|v| v.get("value"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(results
            .into_iter()
            .filter_map(|r| {
                let url = normalize_url(r.get("url")?.as_str()?).ok()?;
                Some(SearchResult {
                    title: r.get("name")?.as_str()?.to_string(),
                    url,
                    snippet: r.get("snippet").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                })
            })
            .take(k)
            .collect())
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        fetch_via_http(url, self.inner.fetch_timeout).await
    }

    fn provider_name(&self) -> &'static str {
        "bing"
    }
}

/// Plain GET + HTML-to-text extraction, shared by providers that don't bundle their own fetch
/// endpoint (everything except `ddg`, which uses daedra's readability-based fetch).
async fn fetch_via_http(url: &str, timeout: Duration) -> Result<String> {
    let normalized = normalize_url(url)?;
    let client = reqwest::Client::new();
    let response = tokio::time::timeout(timeout, client.get(&normalized).send())
        .await
        .map_err(|_| CoreError::DeadlineExceeded(format!("fetching '{url}' exceeded the configured timeout")))?
        .map_err(|e| CoreError::TransientUpstream(format!("fetch failed for '{url}': {e}")))?;

    let body = response
        .text()
        .await
        .map_err(|e| CoreError::TransientUpstream(format!("failed to read body of '{url}': {e}")))?;

    let document = scraper::Html::parse_document(&body);
    let selector = scraper::Selector::parse("body").unwrap_or_else(|_| scraper::Selector::parse("*").unwrap());
    let text = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .unwrap_or(body);

    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Build the configured [`WebSearch`] implementation from `ares.toml`'s `[web]` section.
pub fn build_web_search(config: &WebConfig, fetch_timeout: Duration) -> Result<Box<dyn WebSearch>> {
    match config.provider {
        WebSearchProvider::None => Ok(Box::new(NoneWebSearch)),
        WebSearchProvider::Ddg => Ok(Box::new(DdgWebSearch::new(fetch_timeout))),
        WebSearchProvider::Serpapi => {
            let api_key = resolve_api_key(config)?;
            Ok(Box::new(SerpapiWebSearch::new(api_key, fetch_timeout)))
        }
        WebSearchProvider::Bing => {
            let api_key = resolve_api_key(config)?;
            Ok(Box::new(BingWebSearch::new(api_key, fetch_timeout)))
        }
    }
}

fn resolve_api_key(config: &WebConfig) -> Result<String> {
    let env_var = config
        .api_key_env
        .as_ref()
        .ok_or_else(|| CoreError::Validation("web search provider requires api_key_env to be set".to_string()))?;
    std::env::var(env_var).map_err(|_| CoreError::Validation(format!("environment variable {env_var} is not set")))
}

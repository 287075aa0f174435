//! Tavily web search client, used as the secondary place backend

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PlacesClient;
use crate::error::{Result, TravelError};
use crate::model::{Place, PlaceCategory};

const SERVICE: &str = "Tavily";

const MAX_RESULTS: usize = 8;

/// Longest summary kept per result, in characters
const SUMMARY_CHARS: usize = 280;

pub struct TavilyPlacesClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilyPlacesClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.tavily.com";

    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TravelError::Config("Tavily API key is empty".into()));
        }
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            api_key,
            base_url: Self::DEFAULT_BASE_URL.into(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
}

#[async_trait]
impl PlacesClient for TavilyPlacesClient {
    async fn search(&self, location: &str, category: PlaceCategory) -> Result<Vec<Place>> {
        let query = category.search_query(location);
        tracing::debug!(%query, "Tavily search");

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequest {
                api_key: &self.api_key,
                query: &query,
                search_depth: "basic",
                max_results: MAX_RESULTS,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TravelError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message: body,
            });
        }
        parse_search(location, &body)
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

pub(crate) fn parse_search(location: &str, body: &str) -> Result<Vec<Place>> {
    let raw: SearchResponse = serde_json::from_str(body)?;
    let places: Vec<Place> = raw
        .results
        .into_iter()
        .filter(|r| !r.title.trim().is_empty())
        .take(MAX_RESULTS)
        .map(|r| Place {
            name: r.title.trim().to_string(),
            address: None,
            rating: None,
            reviews: None,
            url: r.url,
            summary: r
                .content
                .map(|c| c.trim().chars().take(SUMMARY_CHARS).collect::<String>())
                .filter(|c| !c.is_empty()),
        })
        .collect();

    if places.is_empty() {
        Err(TravelError::NotFound(location.to_string()))
    } else {
        Ok(places)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let body = r#"{
            "query": "best restaurants in Lisbon",
            "results": [
                {"title": "Time Out Market Lisboa", "url": "https://example.org/timeout", "content": "Food hall on the riverside.", "score": 0.91},
                {"title": "  ", "url": "https://example.org/blank"},
                {"title": "Cervejaria Ramiro", "content": ""}
            ]
        }"#;
        let places = parse_search("Lisbon", body).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Time Out Market Lisboa");
        assert_eq!(places[0].url.as_deref(), Some("https://example.org/timeout"));
        assert_eq!(places[0].summary.as_deref(), Some("Food hall on the riverside."));
        assert_eq!(places[1].summary, None);
    }

    #[test]
    fn test_no_results_is_not_found() {
        let err = parse_search("Atlantis", r#"{"results": []}"#).unwrap_err();
        assert!(matches!(err, TravelError::NotFound(_)));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(TavilyPlacesClient::new(" ", Duration::from_secs(5)).is_err());
    }
}

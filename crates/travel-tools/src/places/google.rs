//! Google Places text search client

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::PlacesClient;
use crate::error::{Result, TravelError};
use crate::model::{Place, PlaceCategory};

const SERVICE: &str = "Google Places";

/// Results kept per search
const MAX_RESULTS: usize = 8;

pub struct GooglePlacesClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GooglePlacesClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://maps.googleapis.com/maps/api/place";

    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TravelError::Config("Google Places API key is empty".into()));
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

#[async_trait]
impl PlacesClient for GooglePlacesClient {
    async fn search(&self, location: &str, category: PlaceCategory) -> Result<Vec<Place>> {
        let query = category.search_query(location);
        tracing::debug!(%query, "Google Places text search");

        let response = self
            .http
            .get(format!("{}/textsearch/json", self.base_url))
            .query(&[("query", query.as_str()), ("key", self.api_key.as_str())])
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
        parse_text_search(location, &body)
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

#[derive(Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<TextSearchResult>,
}

#[derive(Deserialize)]
struct TextSearchResult {
    name: String,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    rating: Option<f32>,
    #[serde(default)]
    user_ratings_total: Option<u32>,
}

/// Google reports API-level failures in a 200 body via `status`
pub(crate) fn parse_text_search(location: &str, body: &str) -> Result<Vec<Place>> {
    let raw: TextSearchResponse = serde_json::from_str(body)?;
    match raw.status.as_str() {
        "OK" => Ok(raw
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|r| Place {
                name: r.name,
                address: r.formatted_address,
                rating: r.rating,
                reviews: r.user_ratings_total,
                url: None,
                summary: None,
            })
            .collect()),
        "ZERO_RESULTS" => Err(TravelError::NotFound(location.to_string())),
        other => Err(TravelError::Upstream {
            service: SERVICE,
            status: 200,
            message: raw.error_message.unwrap_or_else(|| other.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok() {
        let body = r#"{
            "status": "OK",
            "results": [
                {"name": "Belém Tower", "formatted_address": "Av. Brasília, Lisboa", "rating": 4.6, "user_ratings_total": 95000},
                {"name": "Jerónimos Monastery", "rating": 4.7}
            ]
        }"#;
        let places = parse_text_search("Lisbon", body).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Belém Tower");
        assert_eq!(places[0].reviews, Some(95000));
        assert_eq!(places[1].address, None);
    }

    #[test]
    fn test_parse_statuses() {
        let zero = parse_text_search("Nowhere", r#"{"status": "ZERO_RESULTS", "results": []}"#);
        assert!(matches!(zero, Err(TravelError::NotFound(_))));

        let denied = parse_text_search(
            "Lisbon",
            r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#,
        );
        let Err(TravelError::Upstream { message, .. }) = denied else {
            panic!("expected upstream error");
        };
        assert!(message.contains("API key is invalid"));
    }
}

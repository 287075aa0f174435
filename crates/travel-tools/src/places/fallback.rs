//! Primary/secondary failover for place search

use std::sync::Arc;

use async_trait::async_trait;

use super::PlacesClient;
use crate::error::Result;
use crate::model::{Place, PlaceCategory};

/// Tries `primary`, and on an error or empty result asks `secondary`
pub struct FallbackPlacesClient {
    primary: Arc<dyn PlacesClient>,
    secondary: Arc<dyn PlacesClient>,
}

impl FallbackPlacesClient {
    pub fn new(primary: Arc<dyn PlacesClient>, secondary: Arc<dyn PlacesClient>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl PlacesClient for FallbackPlacesClient {
    async fn search(&self, location: &str, category: PlaceCategory) -> Result<Vec<Place>> {
        match self.primary.search(location, category).await {
            Ok(places) if !places.is_empty() => return Ok(places),
            Ok(_) => tracing::info!(
                primary = self.primary.name(),
                %category,
                location,
                "Primary place search empty, trying secondary"
            ),
            Err(e) => tracing::warn!(
                primary = self.primary.name(),
                secondary = self.secondary.name(),
                %category,
                location,
                error = %e,
                "Primary place search failed, falling back"
            ),
        }

        self.secondary.search(location, category).await.inspect_err(|e| {
            tracing::error!(secondary = self.secondary.name(), error = %e, "Both place backends failed");
        })
    }

    fn name(&self) -> &str {
        "Fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TravelError;
    use crate::places::MockPlacesClient;

    struct Broken;

    #[async_trait]
    impl PlacesClient for Broken {
        async fn search(&self, _location: &str, _category: PlaceCategory) -> Result<Vec<Place>> {
            Err(TravelError::Upstream {
                service: "Broken",
                status: 500,
                message: "down".into(),
            })
        }

        fn name(&self) -> &str {
            "Broken"
        }
    }

    #[tokio::test]
    async fn test_falls_back_on_error() {
        let client = FallbackPlacesClient::new(Arc::new(Broken), Arc::new(MockPlacesClient::new()));
        let places = client.search("Lisbon", PlaceCategory::Restaurants).await.unwrap();
        assert!(!places.is_empty());
    }

    #[tokio::test]
    async fn test_both_failing_surfaces_secondary_error() {
        let client = FallbackPlacesClient::new(Arc::new(Broken), Arc::new(Broken));
        assert!(client.search("Lisbon", PlaceCategory::Activities).await.is_err());
    }
}

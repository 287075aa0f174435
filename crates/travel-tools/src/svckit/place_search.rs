//! Place Search Tool

use std::sync::Arc;

use agent_core::{ParamType, ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolSchema};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::model::PlaceCategory;
use crate::places::PlacesClient;

/// Searches attractions, restaurants, activities or transportation around a location
pub struct PlaceSearchTool {
    places: Arc<dyn PlacesClient>,
}

impl PlaceSearchTool {
    pub fn new(places: Arc<dyn PlacesClient>) -> Self {
        Self { places }
    }
}

#[async_trait]
impl Tool for PlaceSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "search_places".into(),
            description: "Find attractions, restaurants, activities or transportation options in a location, best rated first.".into(),
            parameters: vec![
                ParameterSchema::required("location", ParamType::String, "City or area to search in"),
                ParameterSchema::required("category", ParamType::String, "What to look for")
                    .one_of(PlaceCategory::ALL.map(PlaceCategory::as_str)),
            ],
            category: Some("places".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<Value> {
        let location = call.require_str("location")?;
        let category = PlaceCategory::parse(call.require_str("category")?)?;

        let places = self.places.search(location, category).await?;
        tracing::debug!(location, %category, found = places.len(), "Place search finished");

        Ok(json!({
            "location": location,
            "category": category,
            "source": self.places.name(),
            "places": places,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::places::MockPlacesClient;
    use agent_core::{ToolFailureKind, ToolRegistry};
    use std::collections::HashMap;

    fn call(location: &str, category: &str) -> ToolCall {
        ToolCall::new(
            "search_places",
            HashMap::from([
                ("location".to_string(), json!(location)),
                ("category".to_string(), json!(category)),
            ]),
        )
    }

    #[tokio::test]
    async fn test_search_and_category_enum() {
        let mut registry = ToolRegistry::new();
        registry
            .register(PlaceSearchTool::new(Arc::new(MockPlacesClient::new())))
            .unwrap();

        let ok = registry.invoke(&call("Lisbon", "restaurants")).await;
        assert!(ok.is_success());

        let bad = registry.invoke(&call("Lisbon", "hotels")).await;
        assert_eq!(bad.failure_kind(), Some(ToolFailureKind::InvalidArguments));
    }

    #[tokio::test]
    async fn test_unreachable_backends_surface_as_upstream_failure() {
        use crate::places::{FallbackPlacesClient, GooglePlacesClient, TavilyPlacesClient};
        use std::time::Duration;

        let timeout = Duration::from_secs(2);
        let google = GooglePlacesClient::new("key", timeout).unwrap().with_base_url("http://127.0.0.1:9");
        let tavily = TavilyPlacesClient::new("key", timeout).unwrap().with_base_url("http://127.0.0.1:9");
        let chain = FallbackPlacesClient::new(Arc::new(google), Arc::new(tavily));

        let mut registry = ToolRegistry::new();
        registry.register(PlaceSearchTool::new(Arc::new(chain))).unwrap();

        let result = registry.invoke(&call("Lisbon", "restaurants")).await;
        assert_eq!(result.failure_kind(), Some(ToolFailureKind::Upstream));
    }
}

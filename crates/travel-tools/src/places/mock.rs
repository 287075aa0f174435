//! Mock Places Client
//!
//! Generic but plausible suggestions for any location.

use async_trait::async_trait;

use super::PlacesClient;
use crate::error::Result;
use crate::model::{Place, PlaceCategory};

#[derive(Default)]
pub struct MockPlacesClient;

impl MockPlacesClient {
    pub const fn new() -> Self {
        Self
    }

    fn templates(category: PlaceCategory) -> &'static [(&'static str, f32)] {
        match category {
            PlaceCategory::Attractions => &[
                ("{} Old Town", 4.7),
                ("{} Cathedral", 4.6),
                ("National Museum of {}", 4.5),
                ("{} Viewpoint", 4.4),
            ],
            PlaceCategory::Restaurants => &[
                ("Taberna do {}", 4.6),
                ("{} Market Food Hall", 4.5),
                ("Casa {}", 4.3),
            ],
            PlaceCategory::Activities => &[
                ("{} Walking Tour", 4.8),
                ("{} River Cruise", 4.5),
                ("Cooking Class in {}", 4.7),
            ],
            PlaceCategory::Transportation => &[
                ("{} Metro", 4.2),
                ("{} City Bus Network", 3.9),
                ("{} Airport Shuttle", 4.0),
            ],
        }
    }
}

#[async_trait]
impl PlacesClient for MockPlacesClient {
    async fn search(&self, location: &str, category: PlaceCategory) -> Result<Vec<Place>> {
        let location = location.trim();
        Ok(Self::templates(category)
            .iter()
            .map(|(template, rating)| Place {
                name: template.replace("{}", location),
                address: Some(format!("Central {location}")),
                rating: Some(*rating),
                reviews: None,
                url: None,
                summary: None,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "MockPlaces"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_category_has_suggestions() {
        let client = MockPlacesClient::new();
        for category in PlaceCategory::ALL {
            let places = client.search("Kyoto", category).await.unwrap();
            assert!(!places.is_empty());
            assert!(places.iter().all(|p| p.name.contains("Kyoto")));
        }
    }
}

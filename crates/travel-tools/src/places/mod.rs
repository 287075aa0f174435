//! Place Search Integration
//!
//! Attractions, restaurants, activities and transport options near a location.

mod fallback;
mod google;
mod mock;
mod tavily;

pub use fallback::FallbackPlacesClient;
pub use google::GooglePlacesClient;
pub use mock::MockPlacesClient;
pub use tavily::TavilyPlacesClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Place, PlaceCategory};

/// Places client trait (Strategy pattern)
#[async_trait]
pub trait PlacesClient: Send + Sync {
    /// Best matches for `category` around `location`, best first
    async fn search(&self, location: &str, category: PlaceCategory) -> Result<Vec<Place>>;

    /// Backend name
    fn name(&self) -> &str;
}

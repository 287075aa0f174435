//! Weather Integration
//!
//! Current conditions and multi-day forecasts for a city.

mod mock;
mod openweather;

pub use mock::MockWeatherClient;
pub use openweather::OpenWeatherClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{CurrentWeather, Forecast};

/// Weather client trait (Strategy pattern)
#[async_trait]
pub trait WeatherClient: Send + Sync {
    /// Current conditions, metric units
    async fn current(&self, city: &str) -> Result<CurrentWeather>;

    /// Forecast grouped by day
    async fn forecast(&self, city: &str) -> Result<Forecast>;

    /// Backend name
    fn name(&self) -> &str;
}

//! # travel-tools
//!
//! Tools the travel planner can call while drafting an itinerary: live weather,
//! place search, currency conversion and budget arithmetic.
//!
//! Each external service sits behind a client trait with an HTTP implementation
//! and a static mock, so the agent runs fully offline when API keys are absent.
//!
//! ```text
//!  get_current_weather ─┐
//!  get_weather_forecast ┴─▶ WeatherClient ─▶ OpenWeatherMap | mock
//!  search_places ─────────▶ PlacesClient  ─▶ Google Places ─▶ (fallback) Tavily | mock
//!  convert_currency ──────▶ RateSource    ─▶ ExchangeRate-API (cached) | mock
//!  calculate_expenses ────▶ decimal math
//!  calculate ─────────────▶ agent_core::tool::CalculatorTool
//! ```

pub mod currency;
pub mod error;
pub mod model;
pub mod places;
pub mod svckit;
pub mod weather;

use std::sync::Arc;

use agent_core::ToolRegistry;
use agent_core::tool::CalculatorTool;

pub use error::{Result, TravelError};
pub use model::{Conversion, CurrentWeather, ExpenseBreakdown, Forecast, Place, PlaceCategory, RateQuote};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        CurrencyConverterTool, CurrentWeatherTool, ExpenseCalculatorTool, PlaceSearchTool,
        WeatherForecastTool,
    };
}

/// Backends the travel tools talk to
#[derive(Clone)]
pub struct TravelClients {
    pub weather: Arc<dyn weather::WeatherClient>,
    pub places: Arc<dyn places::PlacesClient>,
    pub rates: Arc<dyn currency::RateSource>,
}

impl TravelClients {
    /// Offline clients only
    pub fn mock() -> Self {
        Self {
            weather: Arc::new(weather::MockWeatherClient::new()),
            places: Arc::new(places::MockPlacesClient::new()),
            rates: Arc::new(currency::MockRateSource::new()),
        }
    }
}

/// Register every travel tool plus the arithmetic calculator
pub fn register_travel_tools(registry: &mut ToolRegistry, clients: &TravelClients) -> agent_core::Result<()> {
    registry.register(tools::CurrentWeatherTool::new(clients.weather.clone()))?;
    registry.register(tools::WeatherForecastTool::new(clients.weather.clone()))?;
    registry.register(tools::PlaceSearchTool::new(clients.places.clone()))?;
    registry.register(tools::CurrencyConverterTool::new(clients.rates.clone()))?;
    registry.register(tools::ExpenseCalculatorTool)?;
    registry.register(CalculatorTool)?;
    Ok(())
}

/// System prompt for the travel planner agent
pub const TRAVEL_PLANNER_PROMPT: &str = r"You are a helpful AI travel agent and expense planner. You build complete, practical travel plans for any destination using live data from your tools.

## What Every Plan Contains

1. **Two itineraries** - a classic tourist route and an off-beat route with hidden gems nearby
2. **Day-by-day schedule** - morning, afternoon and evening for each day
3. **Stays** - two or three options (budget, mid-range, luxury) with approximate cost per night
4. **Attractions, activities and food** - short descriptions, timings and approximate prices
5. **Transportation** - how to get there and how to move around, with fares
6. **Costs** - a breakdown table, a per-day estimate and the trip total in the local currency, converted to the traveler's currency when they differ
7. **Weather and tips** - current conditions, the forecast, what to pack

## Using Tools

- Use `get_current_weather` and `get_weather_forecast` for the destination
- Use `search_places` for attractions, restaurants, activities and transportation
- Use `convert_currency` for any amount that must be shown in another currency
- Use `calculate_expenses` to total the budget; never add up costs in your head
- If a tool fails, continue without that data and tell the traveler what is missing

Format the final plan in clean Markdown with headings, bullet points and tables.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_tools() {
        let mut registry = ToolRegistry::new();
        register_travel_tools(&mut registry, &TravelClients::mock()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "calculate",
                "calculate_expenses",
                "convert_currency",
                "get_current_weather",
                "get_weather_forecast",
                "search_places",
            ]
        );

        // registering twice is a configuration error
        assert!(register_travel_tools(&mut registry, &TravelClients::mock()).is_err());
    }

    #[test]
    fn test_prompt_mentions_every_tool() {
        let mut registry = ToolRegistry::new();
        register_travel_tools(&mut registry, &TravelClients::mock()).unwrap();
        for name in registry.names().into_iter().filter(|n| *n != "calculate") {
            assert!(TRAVEL_PLANNER_PROMPT.contains(name), "{name} missing from prompt");
        }
    }
}

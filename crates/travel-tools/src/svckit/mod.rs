//! Service Kit - Agent Tools
//!
//! Domain-specific tools that implement `agent_core::Tool` for the travel planner.

mod currency_converter;
mod expense_calculator;
mod place_search;
mod weather_lookup;

pub use currency_converter::CurrencyConverterTool;
pub use expense_calculator::{ExpenseCalculatorTool, calculate_expenses};
pub use place_search::PlaceSearchTool;
pub use weather_lookup::{CurrentWeatherTool, WeatherForecastTool};

//! Weather Lookup Tools
//!
//! `get_current_weather` and `get_weather_forecast`.

use std::sync::Arc;

use agent_core::{ParamType, ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolSchema};
use async_trait::async_trait;
use serde_json::Value;

use crate::weather::WeatherClient;

fn city_param() -> ParameterSchema {
    ParameterSchema::required("city", ParamType::String, "City name, e.g. 'Lisbon' or 'Paris, FR'")
}

/// Current conditions for a city
pub struct CurrentWeatherTool {
    weather: Arc<dyn WeatherClient>,
}

impl CurrentWeatherTool {
    pub fn new(weather: Arc<dyn WeatherClient>) -> Self {
        Self { weather }
    }
}

#[async_trait]
impl Tool for CurrentWeatherTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_current_weather".into(),
            description: "Get current weather for a city: temperature and feels-like in Celsius, conditions, humidity and wind.".into(),
            parameters: vec![city_param()],
            category: Some("weather".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<Value> {
        let city = call.require_str("city")?;
        let weather = self.weather.current(city).await?;
        Ok(serde_json::to_value(weather)?)
    }
}

/// Five-day forecast grouped by date
pub struct WeatherForecastTool {
    weather: Arc<dyn WeatherClient>,
}

impl WeatherForecastTool {
    pub fn new(weather: Arc<dyn WeatherClient>) -> Self {
        Self { weather }
    }
}

#[async_trait]
impl Tool for WeatherForecastTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_weather_forecast".into(),
            description: "Get the 5-day weather forecast for a city, grouped by day with min/max temperatures.".into(),
            parameters: vec![city_param()],
            category: Some("weather".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<Value> {
        let city = call.require_str("city")?;
        let forecast = self.weather.forecast(city).await?;
        Ok(serde_json::to_value(forecast)?)
    }
}

//! OpenWeatherMap client
//!
//! Uses the free 2.5 API: `/weather` for current conditions and the 3-hourly
//! `/forecast` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::StatusCode;
use serde::Deserialize;

use super::WeatherClient;
use crate::error::{Result, TravelError};
use crate::model::{CurrentWeather, DailyForecast, Forecast, ForecastEntry};

const SERVICE: &str = "OpenWeatherMap";

pub struct OpenWeatherClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openweathermap.org/data/2.5";

    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TravelError::Config("OpenWeatherMap API key is empty".into()));
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

    async fn fetch(&self, endpoint: &str, city: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/{endpoint}", self.base_url))
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(TravelError::NotFound(city.to_string()));
        }
        if !status.is_success() {
            let message = serde_json::from_str::<OwmError>(&body).map_or(body, |e| e.message);
            return Err(TravelError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn current(&self, city: &str) -> Result<CurrentWeather> {
        tracing::debug!(city, "Fetching current weather");
        parse_current(&self.fetch("weather", city).await?)
    }

    async fn forecast(&self, city: &str) -> Result<Forecast> {
        tracing::debug!(city, "Fetching weather forecast");
        parse_forecast(&self.fetch("forecast", city).await?)
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Deserialize)]
struct OwmError {
    message: String,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    humidity: Option<u8>,
}

#[derive(Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Deserialize, Default)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Deserialize)]
struct OwmCurrent {
    name: String,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: OwmWind,
}

#[derive(Deserialize)]
struct OwmSample {
    dt_txt: String,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Deserialize)]
struct OwmCity {
    name: String,
}

#[derive(Deserialize)]
struct OwmForecast {
    list: Vec<OwmSample>,
    city: OwmCity,
}

fn describe(conditions: &[OwmCondition]) -> String {
    conditions
        .first()
        .map_or_else(|| "unknown".to_string(), |c| c.description.clone())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn parse_current(body: &str) -> Result<CurrentWeather> {
    let raw: OwmCurrent = serde_json::from_str(body)?;
    Ok(CurrentWeather {
        city: raw.name,
        temperature_c: round1(raw.main.temp),
        feels_like_c: round1(raw.main.feels_like.unwrap_or(raw.main.temp)),
        humidity: raw.main.humidity.unwrap_or_default(),
        conditions: describe(&raw.weather),
        wind_speed_ms: raw.wind.speed,
    })
}

pub(crate) fn parse_forecast(body: &str) -> Result<Forecast> {
    let raw: OwmForecast = serde_json::from_str(body)?;
    let mut days: Vec<DailyForecast> = Vec::new();

    for sample in raw.list {
        let at = NaiveDateTime::parse_from_str(&sample.dt_txt, "%Y-%m-%d %H:%M:%S").map_err(|e| {
            TravelError::Upstream {
                service: SERVICE,
                status: 200,
                message: format!("bad forecast timestamp '{}': {e}", sample.dt_txt),
            }
        })?;
        let temperature_c = round1(sample.main.temp);
        let entry = ForecastEntry {
            time: at.format("%H:%M").to_string(),
            temperature_c,
            conditions: describe(&sample.weather),
        };

        match days.last_mut() {
            Some(day) if day.date == at.date() => {
                day.min_c = day.min_c.min(temperature_c);
                day.max_c = day.max_c.max(temperature_c);
                day.entries.push(entry);
            }
            _ => days.push(DailyForecast {
                date: at.date(),
                min_c: temperature_c,
                max_c: temperature_c,
                entries: vec![entry],
            }),
        }
    }

    Ok(Forecast {
        city: raw.city.name,
        days,
    })
}

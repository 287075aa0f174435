//! Mock Weather Client
//!
//! For tests and keyless demos. Returns plausible static conditions.

use async_trait::async_trait;
use chrono::{Days, Utc};

use super::WeatherClient;
use crate::error::Result;
use crate::model::{CurrentWeather, DailyForecast, Forecast, ForecastEntry};

#[derive(Default)]
pub struct MockWeatherClient;

impl MockWeatherClient {
    pub const fn new() -> Self {
        Self
    }

    /// (temperature °C, humidity %, conditions)
    fn climate(city: &str) -> (f64, u8, &'static str) {
        match city.trim().to_lowercase().as_str() {
            "lisbon" => (21.5, 55, "clear sky"),
            "porto" => (18.0, 70, "scattered clouds"),
            "paris" => (16.5, 65, "light rain"),
            "london" => (13.0, 78, "overcast clouds"),
            "tokyo" => (19.5, 60, "few clouds"),
            "new york" => (15.0, 58, "clear sky"),
            "bangkok" => (32.0, 75, "thunderstorm"),
            "reykjavik" => (6.0, 80, "light snow"),
            _ => (20.0, 60, "partly cloudy"),
        }
    }
}

#[async_trait]
impl WeatherClient for MockWeatherClient {
    async fn current(&self, city: &str) -> Result<CurrentWeather> {
        let (temperature_c, humidity, conditions) = Self::climate(city);
        Ok(CurrentWeather {
            city: city.trim().to_string(),
            temperature_c,
            feels_like_c: temperature_c - 0.5,
            humidity,
            conditions: conditions.into(),
            wind_speed_ms: 3.5,
        })
    }

    async fn forecast(&self, city: &str) -> Result<Forecast> {
        let (base, _, conditions) = Self::climate(city);
        let today = Utc::now().date_naive();

        let days = (0..5u32)
            .filter_map(|offset| today.checked_add_days(Days::new(offset.into())).map(|d| (offset, d)))
            .map(|(offset, date)| {
                let drift = f64::from(offset % 3) - 1.0;
                let entries: Vec<ForecastEntry> = [("09:00", -3.0), ("15:00", 2.0), ("21:00", -1.0)]
                    .into_iter()
                    .map(|(time, delta)| ForecastEntry {
                        time: time.into(),
                        temperature_c: base + drift + delta,
                        conditions: conditions.into(),
                    })
                    .collect();
                DailyForecast {
                    date,
                    min_c: base + drift - 3.0,
                    max_c: base + drift + 2.0,
                    entries,
                }
            })
            .collect();

        Ok(Forecast {
            city: city.trim().to_string(),
            days,
        })
    }

    fn name(&self) -> &str {
        "MockWeather"
    }
}

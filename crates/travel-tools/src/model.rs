//! Domain Models
//!
//! Data returned by the travel tools. Money is always `rust_decimal::Decimal`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TravelError};

/// Current conditions for a city
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub city: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    /// Relative humidity in percent
    pub humidity: u8,
    pub conditions: String,
    pub wind_speed_ms: f64,
}

/// One forecast sample
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// Local wall time, "HH:MM"
    pub time: String,
    pub temperature_c: f64,
    pub conditions: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub min_c: f64,
    pub max_c: f64,
    pub entries: Vec<ForecastEntry>,
}

/// Multi-day forecast grouped by date
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub city: String,
    pub days: Vec<DailyForecast>,
}

/// What kind of place to look for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceCategory {
    Attractions,
    Restaurants,
    Activities,
    Transportation,
}

impl PlaceCategory {
    pub const ALL: [Self; 4] = [
        Self::Attractions,
        Self::Restaurants,
        Self::Activities,
        Self::Transportation,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attractions => "attractions",
            Self::Restaurants => "restaurants",
            Self::Activities => "activities",
            Self::Transportation => "transportation",
        }
    }

    /// Free-text query used by text-search backends
    pub fn search_query(self, location: &str) -> String {
        match self {
            Self::Attractions => format!("top tourist attractions in {location}"),
            Self::Restaurants => format!("best restaurants in {location}"),
            Self::Activities => format!("things to do in {location}"),
            Self::Transportation => format!("public transportation in {location}"),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TravelError::InvalidInput(format!("Unknown place category '{s}'")))
    }
}

impl std::fmt::Display for PlaceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub address: Option<String>,
    pub rating: Option<f32>,
    pub reviews: Option<u32>,
    /// Source page, for web-search backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Exchange rate for one currency pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub from: String,
    pub to: String,
    /// Units of `to` per unit of `from`
    pub rate: Decimal,
    pub as_of: DateTime<Utc>,
}

/// A converted amount
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
    pub rate: Decimal,
    pub converted: Decimal,
    pub as_of: DateTime<Utc>,
}

impl Conversion {
    pub fn from_quote(amount: Decimal, quote: RateQuote) -> Result<Self> {
        let converted = amount
            .checked_mul(quote.rate)
            .ok_or_else(|| TravelError::InvalidInput("amount too large to convert".into()))?;
        Ok(Self {
            amount,
            converted: converted.round_dp(2),
            from: quote.from,
            to: quote.to,
            rate: quote.rate,
            as_of: quote.as_of,
        })
    }
}

/// Normalize and check a 3-letter ISO 4217 code
pub fn currency_code(raw: &str) -> Result<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(TravelError::InvalidInput(format!(
            "'{raw}' is not a 3-letter currency code"
        )))
    }
}

/// Exact decimal for the shortest representation of `value`
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

/// Money from a JSON number or numeric string
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_u64().map(Decimal::from))
            .or_else(|| n.as_f64().and_then(decimal_from_f64)),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// One line of a trip budget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseLine {
    pub label: String,
    pub unit_amount: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
}

/// Trip budget with per-day and per-person splits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseBreakdown {
    pub lines: Vec<ExpenseLine>,
    pub total: Decimal,
    pub days: u32,
    pub travelers: u32,
    pub per_day: Decimal,
    pub per_person: Decimal,
    pub per_person_per_day: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_category_parse() {
        assert_eq!(PlaceCategory::parse("Restaurants").unwrap(), PlaceCategory::Restaurants);
        assert!(PlaceCategory::parse("hotels").is_err());
    }

    #[test]
    fn test_currency_code() {
        assert_eq!(currency_code(" eur ").unwrap(), "EUR");
        assert!(currency_code("EURO").is_err());
        assert!(currency_code("E1R").is_err());
    }

    #[test]
    fn test_decimal_from_json() {
        use serde_json::json;
        assert_eq!(decimal_from_json(&json!(19.99)), Some(dec!(19.99)));
        assert_eq!(decimal_from_json(&json!(500)), Some(dec!(500)));
        assert_eq!(decimal_from_json(&json!("120.50")), Some(dec!(120.50)));
        assert_eq!(decimal_from_json(&json!(true)), None);
    }

    #[test]
    fn test_conversion_rounds_to_cents() {
        let quote = RateQuote {
            from: "USD".into(),
            to: "EUR".into(),
            rate: dec!(0.9254),
            as_of: Utc::now(),
        };
        let conversion = Conversion::from_quote(dec!(500), quote).unwrap();
        assert_eq!(conversion.converted, dec!(462.70));
    }

    #[test]
    fn test_conversion_overflow_is_invalid_input() {
        let quote = RateQuote {
            from: "IDR".into(),
            to: "VND".into(),
            rate: dec!(1.6),
            as_of: Utc::now(),
        };
        let err = Conversion::from_quote(Decimal::MAX, quote).unwrap_err();
        assert!(matches!(err, TravelError::InvalidInput(_)));
    }
}

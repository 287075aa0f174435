//! ExchangeRate-API client (`/v6/{key}/pair/{from}/{to}`)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::RateSource;
use crate::error::{Result, TravelError};
use crate::model::{RateQuote, decimal_from_f64};

const SERVICE: &str = "ExchangeRate-API";

pub struct ExchangeRateApiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ExchangeRateApiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://v6.exchangerate-api.com/v6";

    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TravelError::Config("ExchangeRate-API key is empty".into()));
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
}

#[async_trait]
impl RateSource for ExchangeRateApiClient {
    async fn rate(&self, from: &str, to: &str) -> Result<RateQuote> {
        tracing::debug!(from, to, "Fetching exchange rate");
        let response = self
            .http
            .get(format!("{}/{}/pair/{from}/{to}", self.base_url, self.api_key))
            .send()
            .await?;

        // errors come back as JSON bodies on 4xx too
        let status = response.status();
        let body = response.text().await?;
        parse_pair(&body).map_err(|e| match e {
            TravelError::Serialization(_) if !status.is_success() => TravelError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message: body.clone(),
            },
            other => other,
        })
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

#[derive(Deserialize)]
struct PairResponse {
    result: String,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
    #[serde(default)]
    base_code: Option<String>,
    #[serde(default)]
    target_code: Option<String>,
    #[serde(default)]
    conversion_rate: Option<f64>,
    #[serde(default)]
    time_last_update_unix: Option<i64>,
}

pub(crate) fn parse_pair(body: &str) -> Result<RateQuote> {
    let raw: PairResponse = serde_json::from_str(body)?;

    if raw.result != "success" {
        let error_type = raw.error_type.unwrap_or_else(|| "unknown-error".into());
        return Err(if error_type == "unsupported-code" {
            TravelError::UnsupportedCurrency(format!(
                "{}/{}",
                raw.base_code.unwrap_or_default(),
                raw.target_code.unwrap_or_default()
            ))
        } else {
            TravelError::Upstream {
                service: SERVICE,
                status: 200,
                message: error_type,
            }
        });
    }

    let incomplete = || TravelError::Upstream {
        service: SERVICE,
        status: 200,
        message: "incomplete pair response".into(),
    };
    let rate = raw.conversion_rate.and_then(decimal_from_f64).ok_or_else(incomplete)?;

    Ok(RateQuote {
        from: raw.base_code.ok_or_else(incomplete)?,
        to: raw.target_code.ok_or_else(incomplete)?,
        rate,
        as_of: raw
            .time_last_update_unix
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_success() {
        let body = r#"{
            "result": "success",
            "base_code": "USD",
            "target_code": "EUR",
            "conversion_rate": 0.9254,
            "time_last_update_unix": 1714521601
        }"#;
        let quote = parse_pair(body).unwrap();
        assert_eq!(quote.from, "USD");
        assert_eq!(quote.rate, dec!(0.9254));
        assert_eq!(quote.as_of.timestamp(), 1_714_521_601);
    }

    #[test]
    fn test_parse_errors() {
        let unsupported = parse_pair(r#"{"result": "error", "error-type": "unsupported-code"}"#);
        assert!(matches!(unsupported, Err(TravelError::UnsupportedCurrency(_))));

        let quota = parse_pair(r#"{"result": "error", "error-type": "quota-reached"}"#);
        assert!(matches!(quota, Err(TravelError::Upstream { .. })));
    }
}

//! Mock Rate Source
//!
//! Static USD-based table; cross rates are derived through USD.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::RateSource;
use crate::error::{Result, TravelError};
use crate::model::RateQuote;

#[derive(Default)]
pub struct MockRateSource;

impl MockRateSource {
    pub const fn new() -> Self {
        Self
    }

    /// Units of `code` per one USD
    fn per_usd(code: &str) -> Option<Decimal> {
        match code {
            "USD" => Some(Decimal::ONE),
            "EUR" => Some(dec!(0.925)),
            "GBP" => Some(dec!(0.79)),
            "CHF" => Some(dec!(0.88)),
            "JPY" => Some(dec!(151.5)),
            "CNY" => Some(dec!(7.2)),
            "INR" => Some(dec!(83.3)),
            "THB" => Some(dec!(36.2)),
            "AUD" => Some(dec!(1.52)),
            "CAD" => Some(dec!(1.36)),
            "MXN" => Some(dec!(17.1)),
            "BRL" => Some(dec!(5.0)),
            _ => None,
        }
    }
}

#[async_trait]
impl RateSource for MockRateSource {
    async fn rate(&self, from: &str, to: &str) -> Result<RateQuote> {
        let unsupported = |code: &str| TravelError::UnsupportedCurrency(code.to_string());
        let from_rate = Self::per_usd(from).ok_or_else(|| unsupported(from))?;
        let to_rate = Self::per_usd(to).ok_or_else(|| unsupported(to))?;

        Ok(RateQuote {
            from: from.to_string(),
            to: to.to_string(),
            rate: (to_rate / from_rate).round_dp(6),
            as_of: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "MockRates"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_rates() {
        let rates = MockRateSource::new();
        assert_eq!(rates.rate("USD", "EUR").await.unwrap().rate, dec!(0.925));
        assert_eq!(rates.rate("EUR", "EUR").await.unwrap().rate, Decimal::ONE);
        assert_eq!(rates.rate("GBP", "USD").await.unwrap().rate, dec!(1.265823));
        assert!(matches!(
            rates.rate("USD", "XYZ").await,
            Err(TravelError::UnsupportedCurrency(code)) if code == "XYZ"
        ));
    }
}

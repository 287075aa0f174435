//! Currency Converter Tool

use std::sync::Arc;

use agent_core::{ParamType, ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolSchema};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::currency::RateSource;
use crate::error::TravelError;
use crate::model::{Conversion, RateQuote, currency_code, decimal_from_json};

pub struct CurrencyConverterTool {
    rates: Arc<dyn RateSource>,
}

impl CurrencyConverterTool {
    pub fn new(rates: Arc<dyn RateSource>) -> Self {
        Self { rates }
    }
}

#[async_trait]
impl Tool for CurrencyConverterTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "convert_currency".into(),
            description: "Convert an amount between currencies at the latest exchange rate.".into(),
            parameters: vec![
                ParameterSchema::required("amount", ParamType::Number, "Amount to convert, greater than zero"),
                ParameterSchema::required("from_currency", ParamType::String, "ISO 4217 code, e.g. 'USD'"),
                ParameterSchema::required("to_currency", ParamType::String, "ISO 4217 code, e.g. 'EUR'"),
            ],
            category: Some("money".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<Value> {
        let amount = call
            .arg("amount")
            .and_then(decimal_from_json)
            .filter(|a| *a > Decimal::ZERO)
            .ok_or_else(|| TravelError::InvalidInput("amount must be a number greater than zero".into()))?;
        let from = currency_code(call.require_str("from_currency")?)?;
        let to = currency_code(call.require_str("to_currency")?)?;

        let quote = if from == to {
            RateQuote {
                from,
                to,
                rate: Decimal::ONE,
                as_of: Utc::now(),
            }
        } else {
            self.rates.rate(&from, &to).await?
        };

        Ok(serde_json::to_value(Conversion::from_quote(amount, quote)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::MockRateSource;
    use agent_core::{ToolFailureKind, ToolRegistry};
    use serde_json::json;
    use std::collections::HashMap;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(CurrencyConverterTool::new(Arc::new(MockRateSource::new())))
            .unwrap();
        registry
    }

    fn call(amount: Value, from: &str, to: &str) -> ToolCall {
        ToolCall::new(
            "convert_currency",
            HashMap::from([
                ("amount".to_string(), amount),
                ("from_currency".to_string(), json!(from)),
                ("to_currency".to_string(), json!(to)),
            ]),
        )
    }

    #[tokio::test]
    async fn test_usd_to_eur() {
        let result = registry().invoke(&call(json!(500), "usd", "EUR")).await;
        let agent_core::tool::ToolOutcome::Success { data } = result.outcome else {
            panic!("expected success");
        };
        let conversion: Conversion = serde_json::from_value(data).unwrap();
        assert_eq!(conversion.from, "USD");
        assert_eq!(conversion.converted, rust_decimal_macros::dec!(462.50));
    }

    #[tokio::test]
    async fn test_invalid_inputs() {
        let registry = registry();
        for bad in [
            call(json!(-5), "USD", "EUR"),
            call(json!(0), "USD", "EUR"),
            call(json!(10), "DOLLARS", "EUR"),
            call(json!(10), "USD", "XYZ"),
            call(json!("79228162514264337593543950335"), "USD", "JPY"),
        ] {
            let result = registry.invoke(&bad).await;
            assert_eq!(result.failure_kind(), Some(ToolFailureKind::InvalidArguments), "{bad:?}");
        }
    }
}

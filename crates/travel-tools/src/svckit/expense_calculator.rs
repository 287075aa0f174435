//! Expense Calculator Tool
//!
//! Totals a trip budget and splits it per day and per traveler.

use agent_core::{ParamType, ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolSchema};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{Result, TravelError};
use crate::model::{ExpenseBreakdown, ExpenseLine, currency_code, decimal_from_json};

pub struct ExpenseCalculatorTool;

#[async_trait]
impl Tool for ExpenseCalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculate_expenses".into(),
            description: "Total a trip budget. Each item is {label, amount, quantity?}; returns the total plus per-day and per-person splits.".into(),
            parameters: vec![
                ParameterSchema::required("items", ParamType::Array, "Budget lines: [{\"label\": \"hotel\", \"amount\": 120, \"quantity\": 3}]"),
                ParameterSchema::optional("days", ParamType::Integer, "Trip length in days (default 1)"),
                ParameterSchema::optional("travelers", ParamType::Integer, "Number of travelers (default 1)"),
                ParameterSchema::optional("currency", ParamType::String, "ISO 4217 code the amounts are in"),
            ],
            category: Some("money".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<Value> {
        let items = call.arg("items").and_then(Value::as_array).map_or(&[][..], Vec::as_slice);
        let days = count_arg(call, "days")?;
        let travelers = count_arg(call, "travelers")?;
        let currency = call.str_arg("currency").map(currency_code).transpose()?;

        let breakdown = calculate_expenses(items, days, travelers, currency)?;
        Ok(serde_json::to_value(breakdown)?)
    }
}

fn count_arg(call: &ToolCall, name: &str) -> Result<u32> {
    match call.u64_arg(name) {
        None if call.arg(name).is_none() => Ok(1),
        Some(n) if n >= 1 => u32::try_from(n).map_err(|_| TravelError::InvalidInput(format!("{name} is too large"))),
        _ => Err(TravelError::InvalidInput(format!("{name} must be a whole number of at least 1"))),
    }
}

/// Sum `items` and split by `days` and `travelers` (both at least 1)
pub fn calculate_expenses(
    items: &[Value],
    days: u32,
    travelers: u32,
    currency: Option<String>,
) -> Result<ExpenseBreakdown> {
    if items.is_empty() {
        return Err(TravelError::InvalidInput("items must contain at least one expense".into()));
    }
    if days == 0 || travelers == 0 {
        return Err(TravelError::InvalidInput("days and travelers must be at least 1".into()));
    }

    let lines = items
        .iter()
        .enumerate()
        .map(|(i, item)| expense_line(i, item))
        .collect::<Result<Vec<_>>>()?;

    let total = lines
        .iter()
        .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.subtotal))
        .ok_or_else(too_large)?;
    let days_d = Decimal::from(days);
    let travelers_d = Decimal::from(travelers);
    let split = |by: Decimal| total.checked_div(by).map(|d| d.round_dp(2)).ok_or_else(too_large);

    Ok(ExpenseBreakdown {
        total: total.round_dp(2),
        per_day: split(days_d)?,
        per_person: split(travelers_d)?,
        per_person_per_day: split(days_d * travelers_d)?,
        days,
        travelers,
        lines,
        currency,
    })
}

fn expense_line(index: usize, item: &Value) -> Result<ExpenseLine> {
    let invalid = |what: &str| TravelError::InvalidInput(format!("item {index}: {what}"));

    let label = item
        .get("label")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| invalid("label must be a non-empty string"))?;
    let unit_amount = item
        .get("amount")
        .and_then(decimal_from_json)
        .filter(|a| !a.is_sign_negative())
        .ok_or_else(|| invalid("amount must be a non-negative number"))?;
    let quantity = match item.get("quantity").filter(|q| !q.is_null()) {
        None => 1,
        Some(q) => q
            .as_u64()
            .filter(|q| *q >= 1)
            .and_then(|q| u32::try_from(q).ok())
            .ok_or_else(|| invalid("quantity must be a whole number of at least 1"))?,
    };

    let subtotal = unit_amount
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| invalid("amount too large"))?;

    Ok(ExpenseLine {
        label: label.to_string(),
        unit_amount,
        quantity,
        subtotal,
    })
}

fn too_large() -> TravelError {
    TravelError::InvalidInput("amount too large".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{ToolFailureKind, ToolRegistry};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_breakdown() {
        let items = json!([
            {"label": "hotel", "amount": 95.50, "quantity": 3},
            {"label": "food", "amount": 40, "quantity": 3},
            {"label": "museum pass", "amount": "29.99"}
        ]);
        let breakdown = calculate_expenses(items.as_array().unwrap(), 3, 2, Some("EUR".into())).unwrap();

        assert_eq!(breakdown.lines[0].subtotal, dec!(286.50));
        assert_eq!(breakdown.total, dec!(436.49));
        assert_eq!(breakdown.per_day, dec!(145.50));
        assert_eq!(breakdown.per_person, dec!(218.24));
        assert_eq!(breakdown.per_person_per_day, dec!(72.75));
    }

    #[test]
    fn test_rejects_bad_items() {
        let cases = [
            json!([]),
            json!([{"amount": 10}]),
            json!([{"label": "x", "amount": -1}]),
            json!([{"label": "x", "amount": 1, "quantity": 0}]),
        ];
        for items in cases {
            assert!(calculate_expenses(items.as_array().unwrap(), 1, 1, None).is_err(), "{items}");
        }
    }

    #[test]
    fn test_overflowing_amounts_are_rejected() {
        let huge_line = json!([{"label": "villa", "amount": "70000000000000000000000000000", "quantity": 2}]);
        let err = calculate_expenses(huge_line.as_array().unwrap(), 1, 1, None).unwrap_err();
        assert!(err.to_string().contains("amount too large"), "{err}");

        let huge_total = json!([
            {"label": "villa", "amount": "70000000000000000000000000000"},
            {"label": "yacht", "amount": "70000000000000000000000000000"}
        ]);
        let err = calculate_expenses(huge_total.as_array().unwrap(), 1, 1, None).unwrap_err();
        assert!(matches!(err, TravelError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_overflow_reaches_model_as_invalid_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(ExpenseCalculatorTool).unwrap();

        let call = ToolCall::new(
            "calculate_expenses",
            HashMap::from([(
                "items".to_string(),
                json!([{"label": "villa", "amount": "70000000000000000000000000000", "quantity": 2}]),
            )]),
        );
        let result = registry.invoke(&call).await;
        let agent_core::tool::ToolOutcome::Failure(failure) = result.outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, ToolFailureKind::InvalidArguments);
        assert!(failure.message.contains("amount too large"), "{}", failure.message);
    }

    #[tokio::test]
    async fn test_tool_defaults_and_validation() {
        let mut registry = ToolRegistry::new();
        registry.register(ExpenseCalculatorTool).unwrap();

        let ok = ToolCall::new(
            "calculate_expenses",
            HashMap::from([("items".to_string(), json!([{"label": "taxi", "amount": 12}]))]),
        );
        let result = registry.invoke(&ok).await;
        let agent_core::tool::ToolOutcome::Success { data } = result.outcome else {
            panic!("expected success");
        };
        assert_eq!(data["days"], 1);
        assert_eq!(data["travelers"], 1);

        let zero_days = ToolCall::new(
            "calculate_expenses",
            HashMap::from([
                ("items".to_string(), json!([{"label": "taxi", "amount": 12}])),
                ("days".to_string(), json!(0)),
            ]),
        );
        assert_eq!(
            registry.invoke(&zero_days).await.failure_kind(),
            Some(ToolFailureKind::InvalidArguments)
        );
    }
}

//! Built-in tools: transaction lookup, weather lookup, calculator

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::calc;
use super::{Tool, ToolArguments, ToolRegistry};

const CALC_ALLOWED: &str = "0123456789+-*/(). ";

/// Registry holding the built-in tool set
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CheckTransactionStatus);
    registry.register(GetWeather);
    registry.register(Calculate);
    registry
}

fn string_arg<'a>(arguments: &'a ToolArguments, name: &str) -> anyhow::Result<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .with_context(|| format!("missing string argument '{}'", name))
}

/// Looks up a transaction in a fixed table
pub struct CheckTransactionStatus;

struct TransactionRow {
    id: &'static str,
    status: &'static str,
    amount: f64,
    date: &'static str,
}

const TRANSACTIONS: &[TransactionRow] = &[
    TransactionRow { id: "TXN-001", status: "completed", amount: 150.00, date: "2024-01-15" },
    TransactionRow { id: "TXN-002", status: "pending", amount: 250.50, date: "2024-01-16" },
    TransactionRow { id: "TXN-003", status: "failed", amount: 75.25, date: "2024-01-14" },
];

#[async_trait]
impl Tool for CheckTransactionStatus {
    fn name(&self) -> &str {
        "check_transaction_status"
    }

    fn description(&self) -> &str {
        "Check the status of a transaction by its ID"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "transaction_id": {
                    "type": "string",
                    "description": "The unique transaction ID to check"
                }
            },
            "required": ["transaction_id"]
        })
    }

    async fn execute(&self, arguments: &ToolArguments) -> anyhow::Result<Value> {
        let transaction_id = string_arg(arguments, "transaction_id")?;

        Ok(match TRANSACTIONS.iter().find(|row| row.id == transaction_id) {
            Some(row) => json!({
                "transaction_id": transaction_id,
                "status": row.status,
                "amount": row.amount,
                "date": row.date,
            }),
            None => json!({
                "transaction_id": transaction_id,
                "status": "not_found",
                "message": format!("Transaction {} not found", transaction_id),
            }),
        })
    }
}

/// Current conditions for a handful of cities
pub struct GetWeather;

struct WeatherRow {
    city: &'static str,
    celsius: f64,
    condition: &'static str,
    humidity: u32,
}

const WEATHER: &[WeatherRow] = &[
    WeatherRow { city: "san francisco", celsius: 18.0, condition: "Partly cloudy", humidity: 65 },
    WeatherRow { city: "new york", celsius: 12.0, condition: "Sunny", humidity: 45 },
    WeatherRow { city: "london", celsius: 10.0, condition: "Rainy", humidity: 80 },
    WeatherRow { city: "tokyo", celsius: 22.0, condition: "Clear", humidity: 50 },
];

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[async_trait]
impl Tool for GetWeather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get current weather information for a location"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City name or location"
                },
                "unit": {
                    "type": "string",
                    "enum": ["celsius", "fahrenheit"],
                    "description": "Temperature unit",
                    "default": "celsius"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, arguments: &ToolArguments) -> anyhow::Result<Value> {
        let location = string_arg(arguments, "location")?;
        let unit = arguments.get("unit").and_then(Value::as_str).unwrap_or("celsius");

        let key = location.to_lowercase();
        let Some(row) = WEATHER.iter().find(|row| row.city == key) else {
            return Ok(json!({
                "location": location,
                "error": format!("Weather data not available for {}", location),
            }));
        };

        let temperature = match unit {
            "fahrenheit" => row.celsius * 9.0 / 5.0 + 32.0,
            _ => row.celsius,
        };

        Ok(json!({
            "location": location,
            "temperature": round1(temperature),
            "unit": unit,
            "condition": row.condition,
            "humidity": row.humidity,
        }))
    }
}

/// Arithmetic over `+ - * /` and parentheses
pub struct Calculate;

#[async_trait]
impl Tool for Calculate {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Perform mathematical calculations"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Mathematical expression to evaluate (e.g., '2 + 2', '10 * 5')"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: &ToolArguments) -> anyhow::Result<Value> {
        let expression = string_arg(arguments, "expression")?;

        if !expression.chars().all(|c| CALC_ALLOWED.contains(c)) {
            return Ok(json!({
                "expression": expression,
                "error": "Invalid characters in expression. Only numbers and +, -, *, /, (, ) are allowed.",
            }));
        }

        Ok(match calc::evaluate(expression) {
            Ok(value) => json!({
                "expression": expression,
                "result": number_value(value),
            }),
            Err(e) => json!({
                "expression": expression,
                "error": format!("Calculation error: {}", e),
            }),
        })
    }
}

/// Whole results render as JSON integers
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

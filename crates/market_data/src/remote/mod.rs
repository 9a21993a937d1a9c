use serde_json::Value;

pub mod exchange_client;
pub mod kline_response;
pub mod ticker_response;

pub use exchange_client::{Exchange, ExchangeClient, UniverseFilter};
pub use kline_response::KlineRow;
pub use ticker_response::{PriceTicker, Ticker24h};

/// Exchanges send numbers either as JSON numbers or as decimal strings.
pub(crate) fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_strings_both_parse() {
        assert_eq!(value_f64(&json!("1.25")), Some(1.25));
        assert_eq!(value_f64(&json!(3)), Some(3.0));
        assert_eq!(value_f64(&json!(null)), None);
        assert_eq!(value_f64(&json!("n/a")), None);
    }
}

use chrono::DateTime;
use common::errors::ScanError;
use common::models::PriceBar;
use serde::Deserialize;
use serde_json::Value;

use super::value_f64;
use crate::traits::RemoteResponse;

/// One row of `/api/v3/klines`:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
#[derive(Debug, Deserialize)]
pub struct KlineRow(pub Vec<Value>);

impl RemoteResponse<PriceBar> for KlineRow {
    fn to_model(&self) -> Result<PriceBar, ScanError> {
        let field = |i: usize| {
            self.0
                .get(i)
                .and_then(value_f64)
                .ok_or_else(|| ScanError::InsufficientData(format!("kline field {} missing", i)))
        };

        let open_time = self
            .0
            .first()
            .and_then(Value::as_i64)
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| ScanError::InsufficientData("kline open time missing".to_string()))?;

        Ok(PriceBar {
            timestamp: open_time,
            open: field(1)?,
            high: field(2)?,
            low: field(3)?,
            close: field(4)?,
            volume: field(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binance_row() {
        let row: KlineRow = serde_json::from_str(
            r#"[1700000000000,"35.10","36.00","34.90","35.80","12345.6",1700003599999,"441000.1",100,"6000","210000","0"]"#,
        )
        .unwrap();
        let bar = row.to_model().unwrap();

        assert_eq!(bar.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(bar.open, 35.10);
        assert_eq!(bar.high, 36.00);
        assert_eq!(bar.low, 34.90);
        assert_eq!(bar.close, 35.80);
        assert_eq!(bar.volume, 12345.6);
    }

    #[test]
    fn short_row_is_rejected() {
        let row: KlineRow = serde_json::from_str(r#"[1700000000000,"1.0","1.1"]"#).unwrap();
        assert!(row.to_model().is_err());
    }
}

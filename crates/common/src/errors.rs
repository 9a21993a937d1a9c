use thiserror::Error;

/// Failure taxonomy of a scan. Every variant except a failure of the scan
/// loop itself is contained at the boundary where it happens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    /// Instrument fetch failed or the market is not listed.
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Not enough (or unusable) bars to compute the indicators.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Zero or non-finite ATR, or a stop distance that collapses to nothing.
    #[error("degenerate trade: {0}")]
    DegenerateTrade(String),

    #[error("notification failed: {0}")]
    NotificationFailure(String),

    #[error("config merge failed: {0}")]
    ConfigMergeFailure(String),
}

impl ScanError {
    pub fn unavailable(symbol: &str, reason: impl ToString) -> Self {
        Self::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }
}

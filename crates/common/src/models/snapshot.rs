/// Point-in-time indicator values taken from the tail of a series.
/// Built fresh for every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub ema9: f64,
    pub ema21: f64,
    pub ema50: f64,
    pub ema9_prev: f64,
    pub ema21_prev: f64,
    pub macd_diff_prev: f64,
    pub macd_diff_now: f64,
    pub rsi_prev: f64,
    pub rsi_now: f64,
    pub atr: f64,
    pub adx: f64,
    pub volume_now: f64,
    pub volume_avg20: f64,
    /// Mean close-to-close return over the regime window (50 bars).
    pub mean_return_long: f64,
    /// Mean close-to-close return over the trend-strength window (5 bars).
    pub mean_return_short: f64,
}

impl IndicatorSnapshot {
    pub fn is_finite(&self) -> bool {
        [
            self.close,
            self.ema9,
            self.ema21,
            self.ema50,
            self.ema9_prev,
            self.ema21_prev,
            self.macd_diff_prev,
            self.macd_diff_now,
            self.rsi_prev,
            self.rsi_now,
            self.atr,
            self.adx,
            self.volume_now,
            self.volume_avg20,
            self.mean_return_long,
            self.mean_return_short,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

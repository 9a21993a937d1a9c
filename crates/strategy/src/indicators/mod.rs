pub mod adx;
pub mod rsi;

use common::errors::ScanError;
use common::models::{IndicatorSnapshot, PriceBar};
use ta::indicators::{
    AverageTrueRange, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
};
use ta::{DataItem, Next};

pub const EMA_FAST: usize = 9;
pub const EMA_MID: usize = 21;
pub const EMA_SLOW: usize = 50;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const REGIME_WINDOW: usize = 50;
pub const TREND_WINDOW: usize = 5;

/// Computes an [`IndicatorSnapshot`] from the tail of a bar series.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorSet {
    volume_window: usize,
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self::new(20)
    }
}

impl IndicatorSet {
    pub fn new(volume_window: usize) -> Self {
        Self {
            volume_window: volume_window.max(1),
        }
    }

    /// Fewest bars for which every indicator in the snapshot is defined.
    pub fn min_len(&self) -> usize {
        [
            EMA_SLOW,
            MACD_SLOW + 1,
            RSI_PERIOD + 2,
            2 * ADX_PERIOD,
            self.volume_window,
            REGIME_WINDOW + 1,
            TREND_WINDOW + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(REGIME_WINDOW + 1)
    }

    pub fn compute(&self, bars: &[PriceBar]) -> Result<IndicatorSnapshot, ScanError> {
        let required = self.min_len();
        if bars.len() < required {
            return Err(ScanError::InsufficientData(format!(
                "{} bars available, {} required",
                bars.len(),
                required
            )));
        }

        let invalid = |_| ScanError::InsufficientData("invalid indicator period".to_string());
        let mut ema9 = ExponentialMovingAverage::new(EMA_FAST).map_err(invalid)?;
        let mut ema21 = ExponentialMovingAverage::new(EMA_MID).map_err(invalid)?;
        let mut ema50 = ExponentialMovingAverage::new(EMA_SLOW).map_err(invalid)?;
        let mut macd = MovingAverageConvergenceDivergence::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL)
            .map_err(invalid)?;
        let mut atr = AverageTrueRange::new(ATR_PERIOD).map_err(invalid)?;

        let mut snap = IndicatorSnapshot::default();

        for bar in bars {
            let item = DataItem::builder()
                .open(bar.open)
                .high(bar.high)
                .low(bar.low)
                .close(bar.close)
                .volume(bar.volume)
                .build()
                .map_err(|_| {
                    ScanError::InsufficientData(format!("malformed bar at {}", bar.timestamp))
                })?;

            snap.ema9_prev = snap.ema9;
            snap.ema21_prev = snap.ema21;
            snap.macd_diff_prev = snap.macd_diff_now;

            snap.ema9 = ema9.next(bar.close);
            snap.ema21 = ema21.next(bar.close);
            snap.ema50 = ema50.next(bar.close);
            snap.macd_diff_now = macd.next(bar.close).histogram;
            snap.atr = atr.next(&item);
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let rsi_values = rsi::rsi(&closes, RSI_PERIOD);
        snap.rsi_prev = rsi_values[rsi_values.len() - 2];
        snap.rsi_now = rsi_values[rsi_values.len() - 1];

        let last = bars[bars.len() - 1];
        snap.close = last.close;
        snap.volume_now = last.volume;
        snap.volume_avg20 = mean(bars[bars.len() - self.volume_window..].iter().map(|b| b.volume));
        snap.adx = adx::adx(bars, ADX_PERIOD)
            .last()
            .copied()
            .unwrap_or(f64::NAN);

        let returns = close_returns(bars);
        snap.mean_return_long = mean(returns[returns.len() - REGIME_WINDOW..].iter().copied());
        snap.mean_return_short = mean(returns[returns.len() - TREND_WINDOW..].iter().copied());

        if !snap.is_finite() {
            return Err(ScanError::InsufficientData(
                "non-finite indicator values".to_string(),
            ));
        }
        Ok(snap)
    }
}

/// Period-over-period close returns; one shorter than `bars`.
fn close_returns(bars: &[PriceBar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

//! ADX (Wilder).
//!
//! +DM/-DM and true range are Wilder-smoothed over `period`, turned into
//! +DI/-DI and DX, and DX is smoothed once more. First value lands at bar
//! `2 * period - 1`.

use common::models::PriceBar;

/// Wilder smoothing seeded with the simple mean of the first `period`
/// values after any leading NaNs.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return out;
    };
    let seed_end = start + period;
    if seed_end > values.len() {
        return out;
    }
    let seed = &values[start..seed_end];
    if seed.iter().any(|v| v.is_nan()) {
        return out;
    }

    let mut prev = seed.iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = prev;
    for i in seed_end..values.len() {
        if values[i].is_nan() {
            break;
        }
        prev += (values[i] - prev) / period as f64;
        out[i] = prev;
    }
    out
}

/// True range per bar. The first bar has no previous close and stays NaN.
pub fn true_range(bars: &[PriceBar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for i in 1..bars.len() {
        let prev_close = bars[i - 1].close;
        let bar = &bars[i];
        tr[i] = (bar.high - bar.low)
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs());
    }
    tr
}

pub fn adx(bars: &[PriceBar], period: usize) -> Vec<f64> {
    let n = bars.len();
    if n < 2 {
        return vec![f64::NAN; n];
    }

    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let tr = wilder_smooth(&true_range(bars), period);
    let plus = wilder_smooth(&plus_dm, period);
    let minus = wilder_smooth(&minus_dm, period);

    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if tr[i].is_nan() || plus[i].is_nan() || minus[i].is_nan() {
            continue;
        }
        if tr[i] == 0.0 {
            dx[i] = 0.0;
            continue;
        }
        let plus_di = 100.0 * plus[i] / tr[i];
        let minus_di = 100.0 * minus[i] / tr[i];
        let di_sum = plus_di + minus_di;
        dx[i] = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
    }

    wilder_smooth(&dx, period)
}

/// Average True Range (ATR) indicator
///
/// Measures market volatility by averaging true ranges over a period.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// Uses Wilder's smoothing for the moving average.

use crate::models::Bar;

fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| {
            let high = w[1].high;
            let low = w[1].low;
            let prev_close = w[0].close;

            (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs())
        })
        .collect()
}

/// Calculate the current ATR, or None if there are fewer than `period + 1` bars
pub fn calculate_atr(bars: &[Bar], period: usize) -> Option<f64> {
    atr_series(bars, period).last().copied().flatten()
}

/// ATR aligned with `bars`: `None` until index `period`, then one value per bar
pub fn atr_series(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut series = vec![None; bars.len()];
    if period == 0 || bars.len() < period + 1 {
        return series;
    }

    let trs = true_ranges(bars);

    // First ATR is simple average of first 'period' true ranges
    let mut atr = trs.iter().take(period).sum::<f64>() / period as f64;
    series[period] = Some(atr);

    for (i, tr) in trs.iter().enumerate().skip(period) {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        // true range i belongs to bar i + 1
        series[i + 1] = Some(atr);
    }

    series
}

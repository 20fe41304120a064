/// Calculate Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes over the last
/// `period` changes. Bounded to [0, 100].
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let (gains, losses) = prices
        .windows(2)
        .rev()
        .take(period)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), change: f64| {
            if change > 0.0 {
                (g + change, l)
            } else {
                (g, l + change.abs())
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// RSI aligned with `prices`: `None` until index `period`
pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            if i < period {
                None
            } else {
                calculate_rsi(&prices[i - period..=i], period)
            }
        })
        .collect()
}

// Technical indicators module
// ATR and RSI columns attached to a market snapshot

pub mod atr;
pub mod rsi;

pub use atr::{atr_series, calculate_atr};
pub use rsi::{calculate_rsi, rsi_series};

use serde::Deserialize;

use crate::models::{Bar, MarketSnapshot};

/// Lookback windows for the indicator columns
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorPeriods {
    pub atr: usize,
    pub rsi: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self { atr: 14, rsi: 14 }
    }
}

/// Attach ATR and RSI to every row of the snapshot
///
/// Deterministic for fixed periods. Rows inside the warm-up window keep `None`.
pub fn annotate(mut snapshot: MarketSnapshot, periods: IndicatorPeriods) -> MarketSnapshot {
    let bars: Vec<Bar> = snapshot.rows().iter().map(|r| r.bar.clone()).collect();
    let closes = snapshot.closes();

    let atr = atr_series(&bars, periods.atr);
    let rsi = rsi_series(&closes, periods.rsi);

    for ((row, atr), rsi) in snapshot.rows_mut().iter_mut().zip(atr).zip(rsi) {
        row.atr = atr;
        row.rsi = rsi;
    }

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn snapshot(n: usize) -> MarketSnapshot {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = 100.0 + (i % 3) as f64;
                Bar {
                    timestamp: start + Duration::minutes(15 * i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0,
                }
            })
            .collect();
        MarketSnapshot::from_bars("BTC", Duration::minutes(15), bars)
    }

    #[test]
    fn test_annotate_fills_latest_row() {
        let annotated = annotate(snapshot(30), IndicatorPeriods::default());
        let latest = annotated.latest().unwrap();

        assert!(latest.atr.unwrap() > 0.0);
        let rsi = latest.rsi.unwrap();
        assert!((0.0..=100.0).contains(&rsi));
        assert!(annotated.rows()[0].atr.is_none());
    }

    #[test]
    fn test_annotate_short_history_leaves_none() {
        let annotated = annotate(snapshot(5), IndicatorPeriods::default());
        assert!(annotated.latest().unwrap().atr.is_none());
        assert!(annotated.latest().unwrap().rsi.is_none());
    }

    #[test]
    fn test_annotate_is_deterministic() {
        let a = annotate(snapshot(40), IndicatorPeriods::default());
        let b = annotate(snapshot(40), IndicatorPeriods::default());
        assert_eq!(a.rows(), b.rows());
    }
}

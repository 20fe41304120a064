/// Quantization applied to the limit distance on coarse-tick venues
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSnap {
    /// Distance is rounded to the nearest multiple of this
    pub step: f64,
    /// Smallest distance allowed after rounding (one tick)
    pub min_distance: f64,
}

/// Entry/exit limit prices around the current price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitPrices {
    pub buy_price: f64,
    pub sell_price: f64,
    pub distance: f64,
}

/// `distance = volatility * ratio`; buy below and sell above `current_price`
///
/// With a snap, the distance is rounded to `snap.step` and never smaller
/// than `snap.min_distance`, so neither price lands inside one tick of the
/// market. A non-positive snap step leaves the distance unrounded.
pub fn limit_prices(
    current_price: f64,
    volatility: f64,
    ratio: f64,
    snap: Option<PriceSnap>,
) -> LimitPrices {
    let mut distance = volatility * ratio;

    if let Some(snap) = snap {
        if snap.step > 0.0 {
            distance = (distance / snap.step).round() * snap.step;
        }
        distance = distance.max(snap.min_distance);
    }

    let prices = LimitPrices {
        buy_price: current_price - distance,
        sell_price: current_price + distance,
        distance,
    };

    tracing::debug!(
        current_price,
        distance,
        buy_price = prices.buy_price,
        sell_price = prices.sell_price,
        "Computed limit prices"
    );

    prices
}

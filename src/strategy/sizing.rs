use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Decimal places kept on every computed quantity
pub const SIZE_DECIMALS: u32 = 6;

fn to_decimal(value: f64) -> Option<Decimal> {
    if value.is_finite() {
        Decimal::from_f64(value)
    } else {
        None
    }
}

fn floor_decimal(quantity: Decimal, step: Decimal) -> Option<Decimal> {
    quantity.checked_sub(quantity.checked_rem(step)?)
}

/// Tradable quantity for an entry
///
/// `raw = balance * equity_fraction / price`, floored to a multiple of
/// `size_step`, clamped to at least `min_size` and rounded to
/// [`SIZE_DECIMALS`]. Returns `0.0` ("do not trade") for any non-finite
/// input, a non-positive price, balance, fraction or step, or a negative
/// minimum. Never panics.
pub fn position_size(
    balance: f64,
    price: f64,
    equity_fraction: f64,
    min_size: f64,
    size_step: f64,
) -> f64 {
    match try_position_size(balance, price, equity_fraction, min_size, size_step) {
        Some(size) => {
            tracing::debug!(balance, price, equity_fraction, size, "Computed position size");
            size
        }
        None => {
            tracing::error!(
                balance,
                price,
                equity_fraction,
                min_size,
                size_step,
                "Position sizing failed, suppressing order"
            );
            0.0
        }
    }
}

fn try_position_size(
    balance: f64,
    price: f64,
    equity_fraction: f64,
    min_size: f64,
    size_step: f64,
) -> Option<f64> {
    let balance = to_decimal(balance)?;
    let price = to_decimal(price)?;
    let fraction = to_decimal(equity_fraction)?;
    let min_size = to_decimal(min_size)?;
    let step = to_decimal(size_step)?;

    if balance <= Decimal::ZERO
        || price <= Decimal::ZERO
        || fraction <= Decimal::ZERO
        || step <= Decimal::ZERO
        || min_size < Decimal::ZERO
    {
        return None;
    }

    let raw = balance.checked_mul(fraction)?.checked_div(price)?;
    let adjusted = floor_decimal(raw, step)?.max(min_size).round_dp(SIZE_DECIMALS);

    adjusted.to_f64()
}

/// Floor `quantity` to a multiple of `step`
///
/// Used on held balances before closing. Invalid input or a negative
/// quantity yields `0.0`.
pub fn floor_to_step(quantity: f64, step: f64) -> f64 {
    let floored = (|| {
        let quantity = to_decimal(quantity)?;
        let step = to_decimal(step)?;
        if quantity <= Decimal::ZERO || step <= Decimal::ZERO {
            return None;
        }
        floor_decimal(quantity, step)?
            .round_dp(SIZE_DECIMALS)
            .to_f64()
    })();

    floored.unwrap_or(0.0)
}

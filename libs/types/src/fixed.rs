//! Fixed-point arithmetic for prices and quantities
//!
//! All monetary accounting runs on 64-bit signed integers: one price tick is
//! 1e-6 of a nominal price unit, one quantity lot is 1e-6 of a nominal
//! quantity. Floats exist only at ingress/egress boundaries.

/// One nominal price unit expressed in ticks.
pub const PRICE_SCALE: i64 = 1_000_000;

/// One nominal quantity unit expressed in lots.
pub const QUANTITY_SCALE: i64 = 1_000_000;

/// One nominal notional unit: ticks × lots.
pub const NOTIONAL_SCALE: i64 = PRICE_SCALE * QUANTITY_SCALE;

/// Scale a float to an integer, rounding to nearest with ties away from zero.
///
/// Non-finite inputs map to 0; results outside the i64 range saturate.
pub fn round_to_i64(value: f64, scale: i64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    // `as` saturates at the i64 bounds, which is the behavior we want here.
    (value * scale as f64).round() as i64
}

pub fn to_price_ticks(price: f64) -> i64 {
    round_to_i64(price, PRICE_SCALE)
}

pub fn to_quantity_lots(quantity: f64) -> i64 {
    round_to_i64(quantity, QUANTITY_SCALE)
}

pub fn from_price_ticks(ticks: i64) -> f64 {
    ticks as f64 / PRICE_SCALE as f64
}

pub fn from_quantity_lots(lots: i64) -> f64 {
    lots as f64 / QUANTITY_SCALE as f64
}

/// Multiply ticks by lots in a widened accumulator, saturating before
/// narrowing back to i64.
pub fn to_notional_units(price_ticks: i64, quantity_lots: i64) -> i64 {
    let product = price_ticks as i128 * quantity_lots as i128;
    if product > i64::MAX as i128 {
        i64::MAX
    } else if product < i64::MIN as i128 {
        i64::MIN
    } else {
        product as i64
    }
}

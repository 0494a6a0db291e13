//! Rounding helpers shared by analyzers and memory trend math
//!
//! Scores and rates round half to even so that reported values are stable at
//! exact midpoints (`2.5 -> 2`, `3.5 -> 4`).

/// Round to the nearest integer, ties to even
pub fn round_half_even(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let fraction = (value - value.trunc()).abs();
    if fraction == 0.5 {
        2.0 * (value / 2.0).round()
    } else {
        value.round()
    }
}

/// Round to `digits` decimal places, ties to even
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    round_half_even(value * factor) / factor
}

//! Diagnostic syscalls with no kernel state.

/// Returns `value + 1`, wrapping at `i32::MAX`.
#[must_use]
pub fn practice(value: i32) -> i32 {
    value.wrapping_add(1)
}

/// Sums the first `terms` terms of `sum 1/k!` and returns the result scaled
/// by one million and rounded, or -1 for a negative count.
#[must_use]
#[expect(clippy::cast_possible_truncation, reason = "result is at most 2718282")]
pub fn compute_e(terms: i32) -> i32 {
    if terms < 0 {
        return -1;
    }
    let mut sum = 0.0f64;
    let mut term = 1.0f64;
    for k in 0..terms {
        sum += term;
        term /= f64::from(k + 1);
        if term < 1e-18 {
            break;
        }
    }
    (sum * 1_000_000.0 + 0.5) as i32
}

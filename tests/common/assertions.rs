//! Assertion utilities for testing.
//!
//! Helpers for comparing sampled values, which are floating point and may be missing.

/// Default epsilon for floating-point comparisons
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Assert that two floating-point values are approximately equal.
///
/// # Panics
///
/// Panics if the absolute difference between `actual` and `expected` is greater than `epsilon`.
pub fn assert_approx_eq(actual: f64, expected: f64, epsilon: Option<f64>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    let diff = (actual - expected).abs();

    assert!(
        diff <= epsilon,
        "Values not approximately equal: actual = {}, expected = {}, diff = {}, epsilon = {}",
        actual,
        expected,
        diff,
        epsilon
    );
}

/// Assert that a sampled value is present and approximately equal to `expected`.
pub fn assert_sample_eq(actual: Option<f64>, expected: f64) {
    match actual {
        Some(value) => assert_approx_eq(value, expected, None),
        None => panic!("Expected a sampled value of {}, got none", expected),
    }
}

/// Assert that two rows of sampled values are approximately element-wise equal.
///
/// # Panics
///
/// Panics if the rows have different lengths, or if one has a value where the other
/// has none.
pub fn assert_row_approx_eq(actual: &[Option<f64>], expected: &[Option<f64>]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Rows have different lengths: actual = {}, expected = {}",
        actual.len(),
        expected.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        match (a, e) {
            (Some(a), Some(e)) => {
                let diff = (a - e).abs();
                assert!(
                    diff <= DEFAULT_EPSILON,
                    "Rows differ at column {}: actual = {}, expected = {}, diff = {}",
                    i,
                    a,
                    e,
                    diff
                );
            }
            (None, None) => {}
            _ => panic!("Rows differ at column {}: actual = {:?}, expected = {:?}", i, a, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_approx_eq() {
        assert_approx_eq(1.0, 1.0, None);
        assert_approx_eq(1.0, 1.0 + 1e-12, None);
        assert_approx_eq(1.0, 1.001, Some(0.01));
    }

    #[test]
    fn test_assert_row_approx_eq() {
        assert_row_approx_eq(&[Some(1.0), None], &[Some(1.0), None]);
        assert_sample_eq(Some(2.5), 2.5);
    }

    #[test]
    #[should_panic]
    fn test_missing_value_differs() {
        assert_row_approx_eq(&[Some(1.0)], &[None]);
    }
}

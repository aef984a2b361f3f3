//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Normalise an angle into the range (-pi, pi].
///
/// Adding whole turns to the input does not change the result.
pub fn normalise_angle<T>(angle: T) -> T
where
    T: Float + std::ops::Rem
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    // Wrap into [0, 2pi) first, then shift the upper half turn down
    let wrapped = rem_euclid(angle, tau_t);

    if wrapped > pi_t {
        wrapped - tau_t
    }
    else {
        wrapped
    }
}

/// Get the bearing (angle to the positive X axis) of the line from one point
/// to another, in radians in the range (-pi, pi].
pub fn bearing<T>(from: &[T; 2], to: &[T; 2]) -> T
where
    T: Float
{
    (to[1] - from[1]).atan2(to[0] - from[0])
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float + std::ops::Rem
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;
    const TAU: f64 = std::f64::consts::TAU;

    #[test]
    fn test_normalise_angle() {
        assert_eq!(normalise_angle(0f64), 0f64);
        assert_eq!(normalise_angle(PI), PI);
        assert_eq!(normalise_angle(-PI), PI);
        assert!((normalise_angle(1.5 * PI) + 0.5 * PI).abs() < 1e-12);

        // Whole turns collapse onto the same angle
        for k in -3i32..=3 {
            let shifted = normalise_angle(1f64 + TAU * k as f64);
            assert!((shifted - 1f64).abs() < 1e-9);
        }

        // Result is always in (-pi, pi]
        for i in -100i32..=100 {
            let a = normalise_angle(0.1 * i as f64);
            assert!(a > -PI && a <= PI);
        }
    }

    #[test]
    fn test_bearing() {
        assert_eq!(bearing(&[0f64, 0f64], &[1f64, 0f64]), 0f64);
        assert_eq!(bearing(&[0f64, 0f64], &[0f64, 1f64]), 0.5 * PI);
        assert_eq!(bearing(&[0f64, 0f64], &[-1f64, 0f64]), PI);
        assert!((bearing(&[1f64, 1f64], &[0f64, 0f64]) + 0.75 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 1f64), (1000f64, 2000f64), 0.5), 1500f64);
        assert_eq!(lin_map((-1f64, 1f64), (1000f64, 2000f64), -1f64), 1000f64);
    }
}

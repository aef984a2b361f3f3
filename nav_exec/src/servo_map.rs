//! # Servo override mapping module
//!
//! Maps normalised manual-speed demands onto the PWM values driven through
//! the autopilot's servo override channels. The calibration is asymmetric by
//! design: forward and reverse throttle have independent ranges, and the
//! steering range admits `steering_left_max < steering_right_max` (a
//! calibration in which decreasing PWM turns the wheels left).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use comms_if::ap::{RcOverride, STEERING_CHANNEL, THROTTLE_CHANNEL};
use util::maths::lin_map;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// PWM calibration for the throttle and steering servo channels.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ServoCalibration {
    /// Throttle PWM at zero speed.
    pub throttle_neutral: f64,

    /// Throttle PWM at the smallest non-zero reverse speed.
    pub throttle_reverse_min: f64,

    /// Throttle PWM at full reverse. Below neutral for conventional ESCs.
    pub throttle_reverse_max: f64,

    /// Throttle PWM at the smallest non-zero forward speed.
    pub throttle_fwd_min: f64,

    /// Throttle PWM at full forward.
    pub throttle_fwd_max: f64,

    /// Steering PWM at zero turning.
    pub steering_neutral: f64,

    /// Steering PWM at full left wheel deflection.
    pub steering_left_max: f64,

    /// Steering PWM at full right wheel deflection.
    pub steering_right_max: f64
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a normalised manual-speed demand into a servo override.
///
/// `speed` and `turning` are in [-1, 1]; values outside the range are
/// clamped. Throttle rides [`THROTTLE_CHANNEL`] and steering
/// [`STEERING_CHANNEL`]; all other channels are left unchanged.
///
/// The wheel demand is the negation of the commanded turning when driving
/// forward, and is preserved when reversing. This matches ground-vehicle
/// steering geometry: when backing up, steering toward the target swings the
/// nose the same way as when driving toward it.
pub fn manual_speed_to_rc(
    speed: f64,
    turning: f64,
    cal: &ServoCalibration
) -> RcOverride {
    let speed = speed.clamp(-1.0, 1.0);

    let throttle_pwm = if speed == 0.0 {
        cal.throttle_neutral
    }
    else {
        let (throttle_min, throttle_limit) = if speed > 0.0 {
            (cal.throttle_fwd_min, cal.throttle_fwd_max)
        }
        else {
            (cal.throttle_reverse_min, cal.throttle_reverse_max)
        };

        let pwm = lin_map((0.0, 1.0), (throttle_min, throttle_limit), speed.abs());

        // The limit may sit on either side of neutral, clamp toward it
        // respecting the direction of the inequality
        if throttle_limit >= throttle_min {
            pwm.min(throttle_limit)
        }
        else {
            pwm.max(throttle_limit)
        }
    };

    let wheel = if speed > 0.0 { -turning } else { turning }
        .clamp(-1.0, 1.0);

    // Positive wheel deflections scale toward the right calibration limit,
    // negative toward the left
    let steering_pwm = if wheel >= 0.0 {
        lin_map((0.0, 1.0), (cal.steering_neutral, cal.steering_right_max), wheel)
    }
    else {
        lin_map((0.0, 1.0), (cal.steering_neutral, cal.steering_left_max), -wheel)
    };

    let mut rc = RcOverride::none();
    rc.channels[THROTTLE_CHANNEL] = throttle_pwm.round() as u16;
    rc.channels[STEERING_CHANNEL] = steering_pwm.round() as u16;
    rc
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::ap::RC_NO_CHANGE;

    fn cal() -> ServoCalibration {
        ServoCalibration {
            throttle_neutral: 1500.0,
            throttle_reverse_min: 1500.0,
            throttle_reverse_max: 1000.0,
            throttle_fwd_min: 1500.0,
            throttle_fwd_max: 2000.0,
            steering_neutral: 1500.0,
            steering_left_max: 1000.0,
            steering_right_max: 2000.0
        }
    }

    #[test]
    fn test_throttle_mapping() {
        // Zero speed maps to neutral exactly
        let rc = manual_speed_to_rc(0.0, 0.0, &cal());
        assert_eq!(rc.channels[THROTTLE_CHANNEL], 1500);

        // Full forward and reverse hit the calibration limits
        let rc = manual_speed_to_rc(1.0, 0.0, &cal());
        assert_eq!(rc.channels[THROTTLE_CHANNEL], 2000);
        let rc = manual_speed_to_rc(-1.0, 0.0, &cal());
        assert_eq!(rc.channels[THROTTLE_CHANNEL], 1000);

        // Half speed sits midway along the direction's range
        let rc = manual_speed_to_rc(0.5, 0.0, &cal());
        assert_eq!(rc.channels[THROTTLE_CHANNEL], 1750);
        let rc = manual_speed_to_rc(-0.5, 0.0, &cal());
        assert_eq!(rc.channels[THROTTLE_CHANNEL], 1250);

        // Out of range demands clamp to the limits
        let rc = manual_speed_to_rc(2.5, 0.0, &cal());
        assert_eq!(rc.channels[THROTTLE_CHANNEL], 2000);
    }

    #[test]
    fn test_steering_negated_forward_preserved_reverse() {
        // Driving forward the wheel demand is the negation of turning
        let rc = manual_speed_to_rc(0.5, 1.0, &cal());
        assert_eq!(rc.channels[STEERING_CHANNEL], 1000);

        // Reversing, the turning demand passes through unchanged
        let rc = manual_speed_to_rc(-0.5, 1.0, &cal());
        assert_eq!(rc.channels[STEERING_CHANNEL], 2000);

        let rc = manual_speed_to_rc(0.5, -0.5, &cal());
        assert_eq!(rc.channels[STEERING_CHANNEL], 1750);
    }

    #[test]
    fn test_turning_clamped() {
        // Turning demands beyond the normalised range saturate the wheel
        let rc = manual_speed_to_rc(0.2, 5.0, &cal());
        assert_eq!(rc.channels[STEERING_CHANNEL], 1000);
        let rc = manual_speed_to_rc(0.2, -5.0, &cal());
        assert_eq!(rc.channels[STEERING_CHANNEL], 2000);
    }

    #[test]
    fn test_untouched_channels() {
        let rc = manual_speed_to_rc(0.3, 0.3, &cal());
        for (i, ch) in rc.channels.iter().enumerate() {
            if i != THROTTLE_CHANNEL && i != STEERING_CHANNEL {
                assert_eq!(*ch, RC_NO_CHANGE);
            }
        }
    }
}

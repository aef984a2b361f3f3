//! # Mission model module
//!
//! The mission arrives as an ordered waypoint list whose altitude field is
//! overloaded to carry per-waypoint metadata, encoded as four decimal digits
//! `NXYY`:
//!
//! - `N`: 0 = plain waypoint, 1 = cone waypoint, 2 = final cone waypoint
//! - `X`: nominal cruise-speed factor in tens of percent, 0 meaning 100%
//! - `YY`: minimum speed toward the cone as a percent of nominal
//!
//! The encoding is part of the external interface; everything downstream of
//! this module works with the decoded [`WaypointMeta`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use comms_if::msg::mission::{Waypoint, WaypointList};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Metadata decoded from a waypoint's altitude field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaypointMeta {
    /// True if a cone must be touched at this waypoint.
    pub is_cone: bool,

    /// True if this is the final cone of the mission.
    pub is_last_cone: bool,

    /// Nominal cruise-speed factor in (0, 1].
    pub cruise_factor: f64,

    /// Minimum speed toward the cone as a fraction of nominal, in [0, 1).
    pub cone_min_speed_factor: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WaypointMeta {

    /// Decode the metadata carried in a waypoint's altitude field.
    pub fn decode(z_alt: f64) -> Self {
        let z = z_alt.round() as i64;

        let n = z / 1000;
        let x = (z / 100) % 10;
        let yy = z % 100;

        Self {
            is_cone: n >= 1,
            is_last_cone: n == 2,
            cruise_factor: match x {
                0 => 1.0,
                x => x as f64 * 0.1
            },
            cone_min_speed_factor: yy as f64 * 0.01
        }
    }

    /// Encode this metadata back into an altitude value.
    pub fn encode(&self) -> f64 {
        let n = match (self.is_cone, self.is_last_cone) {
            (_, true) => 2,
            (true, false) => 1,
            (false, false) => 0
        };

        // A full-speed waypoint is encoded with a zero speed digit
        let x = if (self.cruise_factor - 1.0).abs() < 1e-9 {
            0
        }
        else {
            (self.cruise_factor * 10.0).round() as i64
        };

        let yy = (self.cone_min_speed_factor * 100.0).round() as i64;

        (n * 1000 + x * 100 + yy) as f64
    }

    /// The cruise speed for a waypoint with this metadata.
    pub fn cruise_speed_ms(&self, normal_speed_ms: f64) -> f64 {
        normal_speed_ms * self.cruise_factor
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Decode the metadata of the waypoint at the given index, or `None` if the
/// index is beyond the end of the list.
pub fn meta_at(list: &WaypointList, index: usize) -> Option<WaypointMeta> {
    list.waypoints.get(index).map(|wp| WaypointMeta::decode(wp.z_alt))
}

/// Index of the last waypoint in the list, or `None` for an empty list.
pub fn last_index(list: &WaypointList) -> Option<usize> {
    list.waypoints.len().checked_sub(1)
}

/// Rewrite a map-frame waypoint list so all points are relative to waypoint
/// 0.
///
/// The altitude field carries metadata rather than a coordinate so it is
/// copied unchanged. No rotational correction is applied: if the rover
/// heading at capture differed from the heading at adjustment the offset is
/// left uncorrected.
pub fn adjust_to_origin(list: &WaypointList) -> Option<WaypointList> {
    let origin = *list.waypoints.first()?;

    Some(WaypointList {
        waypoints: list.waypoints.iter()
            .map(|wp| Waypoint {
                x_lat: wp.x_lat - origin.x_lat,
                y_long: wp.y_long - origin.y_long,
                z_alt: wp.z_alt
            })
            .collect(),
        current_seq: list.current_seq
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode() {
        // Plain waypoint
        let meta = WaypointMeta::decode(0.0);
        assert!(!meta.is_cone);
        assert!(!meta.is_last_cone);
        assert_eq!(meta.cruise_factor, 1.0);
        assert_eq!(meta.cone_min_speed_factor, 0.0);

        // Cone waypoint, full cruise, 30% minimum approach speed
        let meta = WaypointMeta::decode(1030.0);
        assert!(meta.is_cone);
        assert!(!meta.is_last_cone);
        assert_eq!(meta.cruise_factor, 1.0);
        assert!((meta.cone_min_speed_factor - 0.3).abs() < 1e-9);

        // Final cone at 50% cruise
        let meta = WaypointMeta::decode(2500.0);
        assert!(meta.is_cone);
        assert!(meta.is_last_cone);
        assert!((meta.cruise_factor - 0.5).abs() < 1e-9);
        assert_eq!(meta.cone_min_speed_factor, 0.0);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        for n in 0..3 {
            for x in 0..10 {
                for yy in [0, 1, 30, 99] {
                    let z = (n * 1000 + x * 100 + yy) as f64;
                    let meta = WaypointMeta::decode(z);
                    let decoded = WaypointMeta::decode(meta.encode());
                    assert_eq!(meta, decoded, "round trip failed for {}", z);
                }
            }
        }
    }

    #[test]
    fn test_cruise_speed() {
        let meta = WaypointMeta::decode(1330.0);
        assert!((meta.cruise_speed_ms(2.0) - 0.6).abs() < 1e-9);

        let meta = WaypointMeta::decode(1030.0);
        assert!((meta.cruise_speed_ms(2.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_adjust_to_origin() {
        let list = WaypointList {
            waypoints: vec![
                Waypoint { x_lat: 10.0, y_long: -5.0, z_alt: 0.0 },
                Waypoint { x_lat: 12.0, y_long: -4.0, z_alt: 1030.0 },
                Waypoint { x_lat: 7.5, y_long: 0.0, z_alt: 2000.0 },
            ],
            current_seq: 1
        };

        let adjusted = adjust_to_origin(&list).unwrap();

        assert_eq!(adjusted.waypoints[0].x_lat, 0.0);
        assert_eq!(adjusted.waypoints[0].y_long, 0.0);
        assert_eq!(adjusted.waypoints[1].x_lat, 2.0);
        assert_eq!(adjusted.waypoints[1].y_long, 1.0);
        assert_eq!(adjusted.waypoints[2].x_lat, -2.5);
        assert_eq!(adjusted.waypoints[2].y_long, 5.0);

        // Metadata field is untouched
        assert_eq!(adjusted.waypoints[1].z_alt, 1030.0);
        assert_eq!(adjusted.current_seq, 1);

        // An empty list cannot be adjusted
        let empty = WaypointList { waypoints: vec![], current_seq: 0 };
        assert!(adjust_to_origin(&empty).is_none());
    }
}

//! Geofence math
//!
//! Pure functions over coordinates. A geofence failure is advisory: the
//! caller decides whether to proceed after confirmation, and the verdict is
//! always recorded with the visit.

use fieldvisit_domain::constants::EARTH_RADIUS_METERS;
use fieldvisit_domain::{GeofenceAnchor, GeofenceCheck, GeofenceVerdict, GpsFix};

/// Haversine great-circle distance between two coordinates, in meters.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` marginally past 1 for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_METERS * c
}

/// Boundary-inclusive geofence test.
pub fn is_within_geofence(distance_meters: f64, radius_meters: f64) -> bool {
    distance_meters <= radius_meters
}

/// Compare a fix against the cached anchor for the customer.
pub fn evaluate(
    anchor: Option<&GeofenceAnchor>,
    fix: &GpsFix,
    radius_meters: f64,
) -> GeofenceCheck {
    let Some(anchor) = anchor else {
        return GeofenceCheck {
            verdict: GeofenceVerdict::NoAnchor,
            distance_meters: None,
            radius_meters,
        };
    };

    let distance = distance_meters(anchor.latitude, anchor.longitude, fix.latitude, fix.longitude);
    let verdict = if is_within_geofence(distance, radius_meters) {
        GeofenceVerdict::Inside
    } else {
        GeofenceVerdict::Outside
    };

    GeofenceCheck { verdict, distance_meters: Some(distance), radius_meters }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    const JAKARTA: (f64, f64) = (-6.2088, 106.8456);
    const BANDUNG: (f64, f64) = (-6.9175, 107.6191);

    /// Move `meters` due north; one degree of latitude is a constant arc.
    fn north_of(origin: (f64, f64), meters: f64) -> (f64, f64) {
        let degrees = (meters / EARTH_RADIUS_METERS).to_degrees();
        (origin.0 + degrees, origin.1)
    }

    fn anchor_at(point: (f64, f64)) -> GeofenceAnchor {
        let fix = GpsFix::new(point.0, point.1, 5.0, Utc::now());
        GeofenceAnchor::from_fix("anchor-1".into(), "CUST-1", &fix)
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(distance_meters(JAKARTA.0, JAKARTA.1, JAKARTA.0, JAKARTA.1), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let there = distance_meters(JAKARTA.0, JAKARTA.1, BANDUNG.0, BANDUNG.1);
        let back = distance_meters(BANDUNG.0, BANDUNG.1, JAKARTA.0, JAKARTA.1);
        assert!((there - back).abs() < 1e-6);
        // Roughly 116 km as the crow flies.
        assert!((110_000.0..125_000.0).contains(&there), "got {there}");
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let d = distance_meters(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn boundary_is_inclusive() {
        assert!(is_within_geofence(100.0, 100.0));
        assert!(!is_within_geofence(100.001, 100.0));
    }

    #[test]
    fn fifty_meters_is_inside_and_five_hundred_is_outside() {
        let anchor = anchor_at(JAKARTA);

        let near = north_of(JAKARTA, 50.0);
        let check = evaluate(Some(&anchor), &GpsFix::new(near.0, near.1, 5.0, Utc::now()), 100.0);
        assert_eq!(check.verdict, GeofenceVerdict::Inside);
        assert!(check.within_geofence());
        assert!((check.distance_meters.unwrap() - 50.0).abs() < 0.5);

        let far = north_of(JAKARTA, 500.0);
        let check = evaluate(Some(&anchor), &GpsFix::new(far.0, far.1, 5.0, Utc::now()), 100.0);
        assert_eq!(check.verdict, GeofenceVerdict::Outside);
        assert!(!check.within_geofence());
    }

    #[test]
    fn missing_anchor_is_not_a_violation() {
        let fix = GpsFix::new(JAKARTA.0, JAKARTA.1, 5.0, Utc::now());
        let check = evaluate(None, &fix, 100.0);
        assert_eq!(check.verdict, GeofenceVerdict::NoAnchor);
        assert_eq!(check.distance_meters, None);
        assert!(check.within_geofence());
    }
}

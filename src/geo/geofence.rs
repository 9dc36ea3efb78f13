use serde::Serialize;
use utoipa::ToSchema;

use crate::geo::distance::Coordinate;
use crate::model::work_location::WorkLocation;

/// Operator switches for the two permissive fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeofencePolicy {
    /// Reject when no active work location exists instead of letting the check pass.
    pub require_configured: bool,
    /// Reject check-in/out that carries no usable GPS reading.
    pub require_gps: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SiteDistance {
    pub location_id: u64,
    pub name: String,
    pub distance_meters: f64,
    pub radius_meters: f64,
}

impl SiteDistance {
    fn measure(position: Coordinate, location: &WorkLocation) -> Self {
        Self {
            location_id: location.id,
            name: location.name.clone(),
            distance_meters: position.distance_to(&location.center()),
            radius_meters: location.radius_meters,
        }
    }

    fn contains(&self) -> bool {
        self.distance_meters <= self.radius_meters
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GeofenceOutcome {
    pub valid: bool,
    /// False when no active site was available to check against.
    pub enforced: bool,
    /// The first active site whose radius contains the position.
    pub matched: Option<SiteDistance>,
    /// Closest active site, reported when the position is outside every site.
    pub nearest: Option<SiteDistance>,
    pub accuracy: Option<f64>,
    pub message: String,
}

impl GeofenceOutcome {
    /// Whether a real geofence confirmed the position.
    pub fn confirmed(&self) -> bool {
        self.valid && self.matched.is_some()
    }
}

/// Checks `position` against every active location in `locations`.
///
/// First containing site in slice order wins. Accuracy is reported back but
/// does not widen any radius.
pub fn validate_position(
    position: Coordinate,
    accuracy: Option<f64>,
    locations: &[WorkLocation],
    policy: &GeofencePolicy,
) -> GeofenceOutcome {
    let measured: Vec<SiteDistance> = locations
        .iter()
        .filter(|loc| loc.is_active)
        .map(|loc| SiteDistance::measure(position, loc))
        .collect();

    if measured.is_empty() {
        let (valid, message) = if policy.require_configured {
            (false, "No active work location is configured".to_string())
        } else {
            (
                true,
                "No active work location is configured, location check skipped".to_string(),
            )
        };
        return GeofenceOutcome {
            valid,
            enforced: false,
            matched: None,
            nearest: None,
            accuracy,
            message,
        };
    }

    if let Some(site) = measured.iter().find(|site| site.contains()) {
        let message = format!(
            "Within {}m of {} ({} meters away)",
            site.radius_meters.round(),
            site.name,
            site.distance_meters.round()
        );
        return GeofenceOutcome {
            valid: true,
            enforced: true,
            matched: Some(site.clone()),
            nearest: None,
            accuracy,
            message,
        };
    }

    // total_cmp sorts a NaN distance after every real one.
    let nearest = measured
        .into_iter()
        .min_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));

    let message = match &nearest {
        Some(site) => format!(
            "{} meters from {}, max allowed {}m",
            site.distance_meters.round(),
            site.name,
            site.radius_meters.round()
        ),
        None => "Outside every work location".to_string(),
    };

    GeofenceOutcome {
        valid: false,
        enforced: true,
        matched: None,
        nearest,
        accuracy,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance::haversine_meters;
    use crate::model::work_location::sample_location;

    fn at(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate::new(latitude, longitude).unwrap()
    }

    #[test]
    fn site_center_is_valid() {
        let sites = vec![sample_location(1, "Main Clinic", -6.2, 106.816, 100.0)];
        let outcome = validate_position(at(-6.2, 106.816), None, &sites, &GeofencePolicy::default());

        assert!(outcome.valid);
        assert!(outcome.confirmed());
        let matched = outcome.matched.unwrap();
        assert_eq!(matched.location_id, 1);
        assert_eq!(matched.distance_meters, 0.0);
    }

    #[test]
    fn eleven_meters_away_is_inside_hundred_meter_fence() {
        let sites = vec![sample_location(1, "Main Clinic", -6.2, 106.816, 100.0)];
        let outcome = validate_position(
            at(-6.2, 106.8161),
            Some(8.0),
            &sites,
            &GeofencePolicy::default(),
        );

        assert!(outcome.valid);
        assert_eq!(outcome.accuracy, Some(8.0));
        assert_eq!(outcome.matched.unwrap().distance_meters.round(), 11.0);
    }

    #[test]
    fn outside_reports_nearest_site() {
        let sites = vec![
            sample_location(1, "Main Clinic", -6.2, 106.816, 100.0),
            sample_location(2, "North Branch", -6.1, 106.816, 100.0),
        ];
        let outcome = validate_position(at(-6.205, 106.816), None, &sites, &GeofencePolicy::default());

        assert!(!outcome.valid);
        assert!(outcome.enforced);
        let nearest = outcome.nearest.clone().unwrap();
        assert_eq!(nearest.name, "Main Clinic");
        assert!((550.0..560.0).contains(&nearest.distance_meters));
        assert_eq!(
            outcome.message,
            format!(
                "{} meters from Main Clinic, max allowed 100m",
                nearest.distance_meters.round()
            )
        );
    }

    #[test]
    fn first_containing_site_wins() {
        let sites = vec![
            sample_location(7, "Wide Fence", -6.2, 106.817, 1_000.0),
            sample_location(8, "Exact Spot", -6.2, 106.816, 50.0),
        ];
        let outcome = validate_position(at(-6.2, 106.816), None, &sites, &GeofencePolicy::default());

        assert_eq!(outcome.matched.unwrap().location_id, 7);
    }

    #[test]
    fn inactive_sites_are_ignored() {
        let mut closed = sample_location(1, "Closed Clinic", -6.2, 106.816, 100.0);
        closed.is_active = false;
        let open = sample_location(2, "Far Branch", -7.0, 110.0, 100.0);

        let outcome = validate_position(
            at(-6.2, 106.816),
            None,
            &[closed, open],
            &GeofencePolicy::default(),
        );

        assert!(!outcome.valid);
        assert_eq!(outcome.nearest.unwrap().name, "Far Branch");
    }

    #[test]
    fn no_active_site_passes_with_message() {
        let mut closed = sample_location(1, "Closed Clinic", -6.2, 106.816, 100.0);
        closed.is_active = false;

        for sites in [vec![], vec![closed]] {
            let outcome = validate_position(at(10.0, 10.0), None, &sites, &GeofencePolicy::default());
            assert!(outcome.valid);
            assert!(!outcome.enforced);
            assert!(!outcome.confirmed());
            assert!(outcome.message.contains("No active work location"));
        }
    }

    #[test]
    fn no_active_site_fails_when_configuration_required() {
        let policy = GeofencePolicy {
            require_configured: true,
            ..Default::default()
        };
        let outcome = validate_position(at(10.0, 10.0), None, &[], &policy);

        assert!(!outcome.valid);
        assert!(outcome.nearest.is_none());
    }

    #[test]
    fn boundary_distance_counts_as_inside() {
        let mut site = sample_location(1, "Edge", 0.0, 0.0, 1.0);
        let position = at(0.0, 0.001);
        site.radius_meters = haversine_meters(position, site.center());

        let outcome = validate_position(position, None, &[site], &GeofencePolicy::default());
        assert!(outcome.valid);
    }
}

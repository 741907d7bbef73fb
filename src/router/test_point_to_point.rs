// Point-to-point routing against the fixture feed.

use serde_json::json;

use crate::api::{LegMode, PtRequest, PtResponse, RequestPoint};
use crate::error::RoutingError;
use crate::router::test_fixture::{instant, Fixture, ORIGIN};

fn station(id: &str) -> RequestPoint {
    RequestPoint::Station {
        stop_id: id.to_string(),
    }
}

fn coordinate(lat: f64, lon: f64) -> RequestPoint {
    RequestPoint::Coordinate { lat, lon }
}

/// Legs are contiguous except for the wait absorbed into boarding.
fn assert_monotone_legs(response: &PtResponse) {
    for itinerary in &response.itineraries {
        let mut previous_end = None;
        for leg in &itinerary.legs {
            assert!(leg.start_time <= leg.end_time, "leg runs backward");
            if let Some(previous) = previous_end {
                assert!(
                    leg.start_time >= previous,
                    "leg starts before its predecessor ends"
                );
            }
            previous_end = Some(leg.end_time);
        }
    }
}

#[test]
fn station_to_station_direct() {
    let router = Fixture::standard().router();
    let request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");

    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);

    let itinerary = &response.itineraries[0];
    assert_eq!(itinerary.end_time, instant("2020-01-01T08:15:00Z"));
    assert_eq!(itinerary.transfers, 0);
    let rides: Vec<_> = itinerary
        .legs
        .iter()
        .filter(|l| l.mode == LegMode::Transit)
        .collect();
    assert_eq!(rides.len(), 1);
    assert_eq!(rides[0].trip_id.as_deref(), Some("r1-1"));
    assert_eq!(rides[0].start_stop_id.as_deref(), Some("A"));
    assert_eq!(rides[0].end_stop_id.as_deref(), Some("B"));
    assert_monotone_legs(&response);
}

#[test]
fn coordinate_origin_walks_to_the_station() {
    let router = Fixture::standard().router();
    let request = PtRequest::new(
        coordinate(ORIGIN.0, ORIGIN.1),
        station("B"),
        "2020-01-01T08:00:00Z",
    );

    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);

    let itinerary = &response.itineraries[0];
    let walk = itinerary
        .legs
        .iter()
        .find(|l| l.mode == LegMode::Walk)
        .expect("walk leg to the station");
    // 200 m at 5 km/h.
    assert_eq!(walk.distance_meters, 200);
    assert_eq!((walk.end_time - walk.start_time).num_seconds(), 144);
    assert_eq!(walk.start_time, instant("2020-01-01T08:00:00Z"));

    let ride = itinerary
        .legs
        .iter()
        .find(|l| l.mode == LegMode::Transit)
        .expect("ride leg");
    assert_eq!(ride.start_time, instant("2020-01-01T08:05:00Z"));
    assert_eq!(itinerary.end_time, instant("2020-01-01T08:15:00Z"));
    assert_monotone_legs(&response);
}

#[test]
fn station_to_coordinate_uses_the_egress_side() {
    let router = Fixture::standard().router();
    // A few meters from stop B's street node.
    let request = PtRequest::new(station("A"), coordinate(0.0, 0.0201), "2020-01-01T08:00:00Z");

    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);
    let itinerary = &response.itineraries[0];
    assert!(itinerary.legs.iter().any(|l| l.mode == LegMode::Transit));
    assert_eq!(itinerary.end_time, instant("2020-01-01T08:15:00Z"));
    assert_monotone_legs(&response);
}

#[test]
fn forced_transfer_changes_at_the_middle_stop() {
    let router = Fixture::standard().router();
    let request = PtRequest::new(station("A"), station("C"), "2020-01-01T08:00:00Z");

    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);

    let itinerary = &response.itineraries[0];
    let rides: Vec<_> = itinerary
        .legs
        .iter()
        .filter(|l| l.mode == LegMode::Transit)
        .collect();
    assert_eq!(rides.len(), 2);
    assert_eq!(itinerary.transfers, 1);
    assert_eq!(rides[0].trip_id.as_deref(), Some("r1-1"));
    assert_eq!(rides[1].trip_id.as_deref(), Some("r2-1"));
    assert_eq!(itinerary.end_time, instant("2020-01-01T08:30:00Z"));
    // The reported transfer count matches the boardings on the path.
    assert_eq!(itinerary.transfers as usize, rides.len() - 1);
    assert_monotone_legs(&response);
}

#[test]
fn arrive_by_finds_the_latest_feasible_departure() {
    let router = Fixture::standard().router();
    let mut request = PtRequest::new(station("A"), station("C"), "2020-01-01T09:00:00Z");
    request.arrive_by = true;

    let response = router.route(&request).unwrap();
    assert!(!response.itineraries.is_empty());

    let itinerary = &response.itineraries[0];
    assert!(itinerary.end_time <= instant("2020-01-01T09:00:00Z"));
    assert_eq!(itinerary.start_time, instant("2020-01-01T08:05:00Z"));
    assert_eq!(itinerary.end_time, instant("2020-01-01T08:30:00Z"));
    assert_eq!(itinerary.transfers, 1);
    assert_monotone_legs(&response);
}

/// Forward at t0 arriving t1, then arrive_by at t1, must depart no earlier
/// than t0.
#[test]
fn direction_symmetry() {
    let router = Fixture::standard().router();
    let forward = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    let forward_response = router.route(&forward).unwrap();
    let arrival = forward_response.itineraries[0].end_time;

    let mut backward = PtRequest::new(station("A"), station("B"), &arrival.to_rfc3339());
    backward.arrive_by = true;
    let backward_response = router.route(&backward).unwrap();
    let itinerary = &backward_response.itineraries[0];
    assert!(itinerary.start_time >= instant("2020-01-01T08:00:00Z"));
    assert!(itinerary.end_time <= arrival);
}

#[test]
fn visit_budget_returns_partial_results_without_error() {
    let router = Fixture::standard().router();
    let mut request = PtRequest::new(station("A"), station("C"), "2020-01-01T08:00:00Z");
    request.max_visited_nodes = Some(10);

    let response = router.route(&request).unwrap();
    assert_eq!(response.hints.get("visited_nodes.exhausted"), Some(&json!(true)));
    let sum = response
        .hints
        .get("visited_nodes.sum")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert!(sum >= 10);
    // An exhausted search is not an error; here it simply found nothing.
    assert_eq!(response.hints.get("no_path"), Some(&json!(true)));
}

#[test]
fn walk_budget_rejects_the_access_walk() {
    let router = Fixture::standard().router();
    let mut request = PtRequest::new(
        coordinate(ORIGIN.0, ORIGIN.1),
        station("B"),
        "2020-01-01T08:00:00Z",
    );
    request.max_walk_distance_per_leg = Some(100.0);

    let response = router.route(&request).unwrap();
    assert!(response.itineraries.is_empty());
    assert_eq!(response.hints.get("no_path"), Some(&json!(true)));
}

#[test]
fn walk_budget_admits_a_short_enough_access_walk() {
    let router = Fixture::standard().router();
    let mut request = PtRequest::new(
        coordinate(ORIGIN.0, ORIGIN.1),
        station("B"),
        "2020-01-01T08:00:00Z",
    );
    request.max_walk_distance_per_leg = Some(250.0);

    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);
    for leg in &response.itineraries[0].legs {
        if leg.mode == LegMode::Walk {
            assert!(leg.distance_meters <= 250);
        }
    }
}

#[test]
fn wrong_point_count_is_invalid() {
    let router = Fixture::standard().router();
    let mut request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    request.points.pop();
    assert!(matches!(
        router.route(&request),
        Err(RoutingError::InvalidArgument(_))
    ));
}

#[test]
fn malformed_departure_time_is_invalid() {
    let router = Fixture::standard().router();
    let request = PtRequest::new(station("A"), station("B"), "around eight");
    assert!(matches!(
        router.route(&request),
        Err(RoutingError::InvalidArgument(_))
    ));
}

#[test]
fn unknown_stop_id_is_invalid() {
    let router = Fixture::standard().router();
    let request = PtRequest::new(station("A"), station("Z"), "2020-01-01T08:00:00Z");
    assert!(matches!(
        router.route(&request),
        Err(RoutingError::InvalidArgument(_))
    ));
}

#[test]
fn unsnappable_coordinate_reports_the_point_index() {
    let router = Fixture::standard().router();
    let request = PtRequest::new(
        station("A"),
        coordinate(45.0, 45.0),
        "2020-01-01T08:00:00Z",
    );
    assert!(matches!(
        router.route(&request),
        Err(RoutingError::PointNotFound { index: 1 })
    ));
}

#[test]
fn visitor_sees_settled_labels() {
    let router = Fixture::standard().router();
    let request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    let mut settled = 0usize;
    let response = router
        .route_with_visitor(&request, &mut |_| settled += 1)
        .unwrap();
    assert!(!response.itineraries.is_empty());
    assert!(settled > 0);
}

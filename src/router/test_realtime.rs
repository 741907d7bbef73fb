// Realtime overlays: cancellations, delays, skipped stops, extra edges.

use serde_json::json;

use crate::api::{LegMode, PtRequest, RequestPoint};
use crate::graph::{Edge, EdgeKind, NO_GEOMETRY};
use crate::realtime::{FeedOverlay, StopDelay};
use crate::router::test_fixture::{instant, Fixture};

fn station(id: &str) -> RequestPoint {
    RequestPoint::Station {
        stop_id: id.to_string(),
    }
}

#[test]
fn cancelled_trip_yields_no_solutions() {
    let fixture = Fixture::standard();
    let r1 = fixture.timetable.trip_idx("r1-1").unwrap();
    let mut overlay = FeedOverlay::empty();
    overlay.cancelled.insert((r1, 0));
    let router = fixture.router_with_overlay(overlay);

    let request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    let response = router.route(&request).unwrap();
    assert!(response.itineraries.is_empty());
    assert_eq!(response.hints.get("no_path"), Some(&json!(true)));
}

#[test]
fn cancellation_on_another_day_does_not_bite() {
    let fixture = Fixture::standard();
    let r1 = fixture.timetable.trip_idx("r1-1").unwrap();
    let mut overlay = FeedOverlay::empty();
    overlay.cancelled.insert((r1, 1));
    let router = fixture.router_with_overlay(overlay);

    let request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);
    assert_eq!(
        response.itineraries[0].end_time,
        instant("2020-01-01T08:15:00Z")
    );
}

#[test]
fn cancelled_instances_never_appear_as_rides() {
    let fixture = Fixture::standard();
    let r1 = fixture.timetable.trip_idx("r1-1").unwrap();
    let mut overlay = FeedOverlay::empty();
    overlay.cancelled.insert((r1, 0));
    let router = fixture.router_with_overlay(overlay);

    let request = PtRequest::new(station("A"), station("C"), "2020-01-01T08:00:00Z");
    let response = router.route(&request).unwrap();
    for itinerary in &response.itineraries {
        for leg in &itinerary.legs {
            assert_ne!(leg.trip_id.as_deref(), Some("r1-1"));
        }
    }
}

#[test]
fn delays_shift_realized_times() {
    let fixture = Fixture::standard();
    let r1 = fixture.timetable.trip_idx("r1-1").unwrap();
    let mut overlay = FeedOverlay::empty();
    overlay.delays.insert(
        (r1, 1),
        StopDelay {
            arrival: 120,
            departure: 120,
        },
    );
    let router = fixture.router_with_overlay(overlay);

    let request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);
    let itinerary = &response.itineraries[0];
    assert_eq!(itinerary.end_time, instant("2020-01-01T08:17:00Z"));

    let ride = itinerary
        .legs
        .iter()
        .find(|l| l.mode == LegMode::Transit)
        .unwrap();
    let alighting = ride.stop_calls.last().unwrap();
    assert_eq!(
        alighting.scheduled_arrival,
        Some(instant("2020-01-01T08:15:00Z"))
    );
    assert_eq!(
        alighting.realized_arrival,
        Some(instant("2020-01-01T08:17:00Z"))
    );
}

#[test]
fn missed_connection_rolls_to_the_next_service_day() {
    let fixture = Fixture::standard();
    let r1 = fixture.timetable.trip_idx("r1-1").unwrap();
    let mut overlay = FeedOverlay::empty();
    // R1 reaches B at 08:21, after the 08:20 R2 departure.
    overlay.delays.insert(
        (r1, 1),
        StopDelay {
            arrival: 360,
            departure: 360,
        },
    );
    let router = fixture.router_with_overlay(overlay);

    let request = PtRequest::new(station("A"), station("C"), "2020-01-01T08:00:00Z");
    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);
    // The only remaining connection is tomorrow's R2 run.
    assert_eq!(
        response.itineraries[0].end_time,
        instant("2020-01-02T08:30:00Z")
    );
    assert_eq!(response.itineraries[0].transfers, 1);
}

#[test]
fn skipped_stop_blocks_alighting() {
    let fixture = Fixture::standard();
    let r1 = fixture.timetable.trip_idx("r1-1").unwrap();
    let mut overlay = FeedOverlay::empty();
    overlay.skipped.insert((r1, 1));
    let router = fixture.router_with_overlay(overlay);

    let request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    let response = router.route(&request).unwrap();
    assert!(response.itineraries.is_empty());
}

#[test]
fn extra_edges_open_new_connections() {
    let fixture = Fixture::standard();
    let mut overlay = FeedOverlay::empty();
    // Street nodes are laid out origin=0, A=1, B=2, C=3; splice a walkable
    // shortcut between the A and B street nodes.
    for (from, to) in [(1u32, 2u32), (2, 1)] {
        overlay.push_extra_edge(Edge {
            from,
            to,
            kind: EdgeKind::Highway,
            time: 0,
            distance: 500,
            validity: None,
            trip: None,
            geometry_id: NO_GEOMETRY,
        });
    }
    let router = fixture.router_with_overlay(overlay);

    let request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 2);

    // The walking shortcut arrives first and uses no vehicle.
    let walk = &response.itineraries[0];
    assert!(walk.legs.iter().all(|l| l.mode != LegMode::Transit));
    assert_eq!(walk.distance_meters, 500);
    assert_eq!(walk.end_time, instant("2020-01-01T08:06:00Z"));

    let ride = &response.itineraries[1];
    assert!(ride.legs.iter().any(|l| l.mode == LegMode::Transit));
}

#[test]
fn published_snapshots_do_not_disturb_captured_ones() {
    let fixture = Fixture::standard();
    let r1 = fixture.timetable.trip_idx("r1-1").unwrap();
    let router = fixture.router();

    let request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    assert_eq!(router.route(&request).unwrap().itineraries.len(), 1);

    let mut overlay = FeedOverlay::empty();
    overlay.cancelled.insert((r1, 0));
    router.publish_realtime(overlay);
    assert!(router.route(&request).unwrap().itineraries.is_empty());
}

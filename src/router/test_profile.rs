// Profile queries, Pareto behavior, and the transfer criterion switch.

use crate::api::{Itinerary, LegMode, PtRequest, RequestPoint};
use crate::router::test_fixture::{instant, Fixture, T0805, T0815, T0830};

fn station(id: &str) -> RequestPoint {
    RequestPoint::Station {
        stop_id: id.to_string(),
    }
}

/// Standard schedule plus a second, slower R1 run departing later:
/// A 08:12 -> B 08:30.
fn two_departure_fixture() -> Fixture {
    let mut fixture = Fixture::standard();
    fixture.add_trip(
        "r1-2",
        "R1",
        &[("A", 8 * 3600 + 12 * 60, 8 * 3600 + 12 * 60), ("B", T0830, T0830)],
    );
    fixture
}

/// Weak domination on (arrival, transfers, departure reversed).
fn dominates(a: &Itinerary, b: &Itinerary) -> bool {
    a.end_time <= b.end_time
        && a.transfers <= b.transfers
        && a.start_time >= b.start_time
        && (a.end_time < b.end_time || a.transfers < b.transfers || a.start_time > b.start_time)
}

#[test]
fn point_query_keeps_only_the_best_departure() {
    let router = two_departure_fixture().router();
    let request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");

    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);
    assert_eq!(
        response.itineraries[0].end_time,
        instant("2020-01-01T08:15:00Z")
    );
}

#[test]
fn profile_query_enumerates_the_departure_window() {
    let router = two_departure_fixture().router();
    let mut request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    request.profile_query = true;

    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 2);

    let departures: Vec<_> = response.itineraries.iter().map(|i| i.start_time).collect();
    assert!(departures.contains(&instant("2020-01-01T08:05:00Z")));
    assert!(departures.contains(&instant("2020-01-01T08:12:00Z")));

    // Sorted by total travel time.
    assert!(response.itineraries[0].duration_seconds <= response.itineraries[1].duration_seconds);

    // Pareto: no emitted solution dominates another.
    for a in &response.itineraries {
        for b in &response.itineraries {
            if !std::ptr::eq(a, b) {
                assert!(!dominates(a, b), "emitted solutions must be mutually optimal");
            }
        }
    }
}

#[test]
fn profile_query_respects_the_solution_limit() {
    let mut fixture = Fixture::standard();
    // Departures every few minutes, all inside the window closed by the
    // first arrival at 09:00.
    for i in 0..8u32 {
        let dep = T0805 + i * 180;
        fixture.add_trip(
            &format!("r1-x{}", i),
            "R1",
            &[("A", dep, dep), ("B", dep + 2700, dep + 2700)],
        );
    }
    let router = fixture.router();
    let mut request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    request.profile_query = true;

    let response = router.route(&request).unwrap();
    assert!(response.itineraries.len() <= 5, "default profile limit is 5");
    assert!(response.itineraries.len() > 1);
}

#[test]
fn ignore_transfers_drops_the_transfer_criterion() {
    let mut fixture = Fixture::standard();
    // A direct but slow express: A 08:10 -> C 08:45.
    fixture.add_trip(
        "r3-1",
        "R3",
        &[("A", 8 * 3600 + 10 * 60, 8 * 3600 + 10 * 60), ("C", 8 * 3600 + 45 * 60, 8 * 3600 + 45 * 60)],
    );
    let router = fixture.router();

    // With the transfer criterion both the fast two-ride journey and the
    // transfer-free express survive.
    let request = PtRequest::new(station("A"), station("C"), "2020-01-01T08:00:00Z");
    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 2);
    let transfer_counts: Vec<u32> = response.itineraries.iter().map(|i| i.transfers).collect();
    assert!(transfer_counts.contains(&0));
    assert!(transfer_counts.contains(&1));
    assert_eq!(
        response.itineraries[0].end_time,
        instant("2020-01-01T08:30:00Z"),
        "fastest journey sorts first"
    );

    // Ignoring transfers, the slower express is dominated away.
    let mut request = PtRequest::new(station("A"), station("C"), "2020-01-01T08:00:00Z");
    request.ignore_transfers = true;
    let response = router.route(&request).unwrap();
    assert_eq!(response.itineraries.len(), 1);
    assert_eq!(
        response.itineraries[0].end_time,
        instant("2020-01-01T08:30:00Z")
    );
    let rides = response.itineraries[0]
        .legs
        .iter()
        .filter(|l| l.mode == LegMode::Transit)
        .count();
    assert_eq!(rides, 2);
}

#[test]
fn reported_transfers_match_the_ride_legs() {
    let router = Fixture::standard().router();
    let request = PtRequest::new(station("A"), station("C"), "2020-01-01T08:00:00Z");
    let response = router.route(&request).unwrap();
    for itinerary in &response.itineraries {
        let rides = itinerary
            .legs
            .iter()
            .filter(|l| l.mode == LegMode::Transit)
            .count();
        assert_eq!(itinerary.transfers as usize, rides.saturating_sub(1));
    }
}

#[test]
fn profile_window_excludes_departures_after_the_first_arrival() {
    let mut fixture = Fixture::standard();
    // Departs well after the first possible arrival (08:15); outside the
    // profile window.
    fixture.add_trip("r1-late", "R1", &[("A", T0815 + 3600, T0815 + 3600), ("B", T0815 + 4200, T0815 + 4200)]);
    let router = fixture.router();
    let mut request = PtRequest::new(station("A"), station("B"), "2020-01-01T08:00:00Z");
    request.profile_query = true;

    let response = router.route(&request).unwrap();
    for itinerary in &response.itineraries {
        assert!(itinerary.start_time <= instant("2020-01-01T08:15:00Z"));
    }
}

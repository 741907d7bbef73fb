// Shared fixture feed for the router tests.
//
// Stops A, B, C sit on a meridian roughly 2.2 km apart, far beyond the
// transfer footpath radius, so every multi-route journey has to change
// inside a station column. The walk network is a single 200 m street stub
// west of A: coordinate origins snap there, and there is deliberately no
// street path between stations so the expected solution sets stay exact.

use chrono::{DateTime, NaiveDate, Utc};
use compact_str::CompactString;

use crate::graph_builder::{build_graph, GraphBuilderConfig};
use crate::models::{RouteRecord, ServiceDays, StopEvent, StopRecord, Timetable, TripRecord};
use crate::realtime::FeedOverlay;
use crate::router::PtRouter;
use crate::street::StreetNetwork;

pub const STOP_A: (f64, f64) = (0.0, 0.0);
pub const STOP_B: (f64, f64) = (0.0, 0.02);
pub const STOP_C: (f64, f64) = (0.0, 0.04);
/// Roughly 200 m west of stop A, on the only street edge.
pub const ORIGIN: (f64, f64) = (0.0, -0.0018);

// Seconds since service-day midnight.
pub const T0805: u32 = 8 * 3600 + 5 * 60;
pub const T0815: u32 = 8 * 3600 + 15 * 60;
pub const T0820: u32 = 8 * 3600 + 20 * 60;
pub const T0830: u32 = 8 * 3600 + 30 * 60;

pub struct Fixture {
    pub timetable: Timetable,
    pub street: StreetNetwork,
}

impl Fixture {
    pub fn empty() -> Fixture {
        let mut timetable = Timetable::empty(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 7);
        for (idx, (id, (lat, lon))) in [("A", STOP_A), ("B", STOP_B), ("C", STOP_C)]
            .into_iter()
            .enumerate()
        {
            timetable.stops.push(StopRecord {
                id: CompactString::from(id),
                name: format!("Stop {}", id),
                lat,
                lon,
            });
            timetable
                .stop_index
                .insert(CompactString::from(id), idx as u32);
        }
        timetable.services.push(ServiceDays::always(7));
        for id in ["R1", "R2", "R3"] {
            timetable.routes.push(RouteRecord {
                id: CompactString::from(id),
                short_name: id.to_string(),
                long_name: format!("Route {}", id),
            });
        }

        let mut street = StreetNetwork::new();
        let origin = street.add_node(ORIGIN.0, ORIGIN.1);
        let a = street.add_node(STOP_A.0, STOP_A.1);
        street.add_node(STOP_B.0, STOP_B.1);
        street.add_node(STOP_C.0, STOP_C.1);
        street.link(origin, a, 200);

        Fixture { timetable, street }
    }

    /// The two-route base schedule: R1 A 08:05 -> B 08:15 and
    /// R2 B 08:20 -> C 08:30, every day of the horizon.
    pub fn standard() -> Fixture {
        let mut fixture = Fixture::empty();
        fixture.add_trip("r1-1", "R1", &[("A", T0805, T0805), ("B", T0815, T0815)]);
        fixture.add_trip("r2-1", "R2", &[("B", T0820, T0820), ("C", T0830, T0830)]);
        fixture
    }

    pub fn add_trip(&mut self, id: &str, route: &str, calls: &[(&str, u32, u32)]) {
        let route_idx = self
            .timetable
            .routes
            .iter()
            .position(|r| r.id == route)
            .expect("route exists") as u32;
        let events = calls
            .iter()
            .enumerate()
            .map(|(i, (stop, arrival, departure))| StopEvent {
                stop: self.timetable.stop_idx(stop).expect("stop exists"),
                arrival: *arrival,
                departure: *departure,
                seq: (i + 1) as u16,
            })
            .collect();
        let idx = self.timetable.trips.len() as u32;
        self.timetable.trips.push(TripRecord {
            id: CompactString::from(id),
            route: route_idx,
            headsign: calls.last().map(|(s, _, _)| s.to_string()).unwrap_or_default(),
            service: 0,
            events,
        });
        self.timetable
            .trip_index
            .insert(CompactString::from(id), idx);
    }

    pub fn router(self) -> PtRouter {
        let graph = build_graph(&self.street, &self.timetable, &GraphBuilderConfig::default());
        PtRouter::new(graph, self.timetable, self.street)
    }

    pub fn router_with_overlay(self, overlay: FeedOverlay) -> PtRouter {
        let graph = build_graph(&self.street, &self.timetable, &GraphBuilderConfig::default());
        PtRouter::with_realtime(graph, self.timetable, self.street, overlay)
    }
}

pub fn instant(rfc3339: &str) -> DateTime<Utc> {
    rfc3339.parse().expect("valid instant")
}

#[test]
fn fixture_graph_wires_the_expected_columns() {
    use crate::graph::EdgeKind;

    let fixture = Fixture::standard();
    let graph = build_graph(
        &fixture.street,
        &fixture.timetable,
        &GraphBuilderConfig::default(),
    );

    let count = |kind: EdgeKind| graph.edges.iter().filter(|e| e.kind == kind).count();
    // One boarding per trip departure event.
    assert_eq!(count(EdgeKind::Board), 2);
    assert_eq!(count(EdgeKind::Hop), 2);
    assert_eq!(count(EdgeKind::Alight), 2);
    // Stations are too far apart for footpaths.
    assert_eq!(count(EdgeKind::Transfer), 0);
    // Every stop is linked to the street layer.
    assert_eq!(count(EdgeKind::EnterPt), 3);
    assert_eq!(count(EdgeKind::ExitPt), 3);
    // The single street link contributes one directed pair.
    assert_eq!(count(EdgeKind::Highway), 2);
    assert_eq!(graph.stop_nodes.len(), 3);
}

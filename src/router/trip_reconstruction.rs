// From a terminal label back to an itinerary.
//
// The parent chain is flattened into travel-ordered steps, then folded:
// consecutive walking edges coalesce into walk legs, Board..Alight spans
// become ride legs with per-stop calls (scheduled and overlay-adjusted
// realized times), Transfer edges become transfer legs. Waiting is
// absorbed into the boarding boundary, so legs are contiguous except for
// the wait before a ride.

use chrono::{DateTime, Utc};
use geo::{HaversineDistance, Point};

use crate::api::{Itinerary, Leg, LegMode, StopCall};
use crate::graph::{Edge, EdgeKind, NodeId};
use crate::models::{Timetable, SECONDS_PER_DAY};
use crate::realtime::FeedOverlay;
use crate::router::explorer::GraphExplorer;
use crate::router::label_setting::Label;

/// One traversed edge in travel order: the label clock at the edge's tail
/// and head.
struct Step {
    edge: u32,
    t_from: i64,
    t_to: i64,
}

pub fn itinerary_from_label(
    explorer: &GraphExplorer,
    timetable: &Timetable,
    overlay: &FeedOverlay,
    arena: &[Label],
    terminal: u32,
    reverse: bool,
) -> Itinerary {
    let steps = travel_ordered_steps(arena, terminal, reverse);
    let anchor = arena[terminal as usize].time;

    let mut legs: Vec<Leg> = Vec::new();
    let mut walk: Option<WalkAccumulator> = None;
    let mut ride: Option<RideAccumulator> = None;

    for step in &steps {
        let Some(edge) = explorer.edge(step.edge) else {
            log::error!("label chain references unknown edge {}", step.edge);
            continue;
        };
        match edge.kind {
            EdgeKind::Highway | EdgeKind::StopMarker => {
                extend_walk(&mut walk, explorer, step, edge);
            }
            // Virtual access edges carry the whole snapped walk; base
            // boundary edges are zero-size and stay invisible.
            EdgeKind::EnterPt | EdgeKind::ExitPt => {
                if edge.distance > 0 || step.t_to != step.t_from {
                    extend_walk(&mut walk, explorer, step, edge);
                }
            }
            EdgeKind::Board => {
                flush_walk(&mut legs, &mut walk);
                ride = start_ride(explorer, timetable, overlay, step, edge);
            }
            EdgeKind::Hop => {
                if let Some(ride) = ride.as_mut() {
                    ride.push_arrival(timetable, overlay, edge);
                } else {
                    log::error!("hop edge {} outside a ride", step.edge);
                }
            }
            EdgeKind::Dwell => {
                if let Some(ride) = ride.as_mut() {
                    ride.mark_departure(timetable, overlay, edge);
                }
            }
            EdgeKind::Alight => {
                if let Some(ride) = ride.take() {
                    legs.push(ride.into_leg(timetable, step.t_from));
                }
            }
            EdgeKind::Transfer => {
                flush_walk(&mut legs, &mut walk);
                legs.push(transfer_leg(explorer, timetable, step, edge));
            }
            // Waiting and column wiring: absorbed into the next boundary.
            EdgeKind::EnterTimeExpanded
            | EdgeKind::LeaveTimeExpanded
            | EdgeKind::StopEnter
            | EdgeKind::StopExit
            | EdgeKind::Wait
            | EdgeKind::WaitArrival
            | EdgeKind::Overnight => {}
        }
    }
    flush_walk(&mut legs, &mut walk);
    if let Some(ride) = ride.take() {
        log::error!("ride leg without alight at end of chain");
        let end = ride.last_instant();
        legs.push(ride.into_leg(timetable, end));
    }

    let start_time = legs.first().map(|l| l.start_time).unwrap_or_else(|| ts(anchor));
    let end_time = legs.last().map(|l| l.end_time).unwrap_or_else(|| ts(anchor));
    let duration_seconds = (end_time - start_time).num_seconds().max(0) as u64;
    let distance_meters = legs.iter().map(|l| l.distance_meters).sum();
    let transfers = legs
        .iter()
        .filter(|l| l.mode == LegMode::Transit)
        .count()
        .saturating_sub(1) as u32;
    let geometry = legs.iter().flat_map(|l| l.geometry.iter().copied()).collect();

    Itinerary {
        start_time,
        end_time,
        duration_seconds,
        distance_meters,
        transfers,
        legs,
        geometry,
    }
}

/// Flattens the parent chain into travel order. A forward search settles
/// the destination last, so its chain is reversed; a reverse search
/// settles the origin last and the chain already reads in travel order,
/// with every edge stored in its forward orientation.
fn travel_ordered_steps(arena: &[Label], terminal: u32, reverse: bool) -> Vec<Step> {
    let mut chain = Vec::new();
    let mut cursor = Some(terminal);
    while let Some(idx) = cursor {
        chain.push(idx);
        cursor = arena[idx as usize].parent;
    }

    let mut steps = Vec::with_capacity(chain.len().saturating_sub(1));
    if reverse {
        for pair in chain.windows(2) {
            let (child, parent) = (&arena[pair[0] as usize], &arena[pair[1] as usize]);
            if let Some(edge) = child.edge {
                steps.push(Step {
                    edge,
                    t_from: child.time,
                    t_to: parent.time,
                });
            }
        }
    } else {
        chain.reverse();
        for pair in chain.windows(2) {
            let (parent, child) = (&arena[pair[0] as usize], &arena[pair[1] as usize]);
            if let Some(edge) = child.edge {
                steps.push(Step {
                    edge,
                    t_from: parent.time,
                    t_to: child.time,
                });
            }
        }
    }
    steps
}

struct WalkAccumulator {
    start: i64,
    end: i64,
    meters: u32,
    points: Vec<(f64, f64)>,
}

fn extend_walk(
    walk: &mut Option<WalkAccumulator>,
    explorer: &GraphExplorer,
    step: &Step,
    edge: &Edge,
) {
    let acc = walk.get_or_insert_with(|| WalkAccumulator {
        start: step.t_from,
        end: step.t_to,
        meters: 0,
        points: vec![explorer.node_coord(edge.from)],
    });
    acc.end = step.t_to;
    acc.meters += edge.distance;
    match explorer.edge_geometry(step.edge) {
        Some(geometry) if !geometry.is_empty() => acc.points.extend_from_slice(geometry),
        _ => acc.points.push(explorer.node_coord(edge.to)),
    }
}

fn flush_walk(legs: &mut Vec<Leg>, walk: &mut Option<WalkAccumulator>) {
    let Some(acc) = walk.take() else { return };
    if acc.meters == 0 && acc.start == acc.end {
        return;
    }
    legs.push(Leg {
        mode: LegMode::Walk,
        start_time: ts(acc.start),
        end_time: ts(acc.end),
        distance_meters: acc.meters,
        start_stop_id: None,
        start_stop_name: None,
        end_stop_id: None,
        end_stop_name: None,
        route_id: None,
        trip_id: None,
        trip_headsign: None,
        stop_calls: Vec::new(),
        geometry: acc.points,
    });
}

struct RideAccumulator {
    trip: u32,
    /// Midnight of the trip instance's service day, unix seconds.
    day_midnight: i64,
    start: i64,
    calls: Vec<StopCall>,
    stops: Vec<u32>,
}

fn start_ride(
    explorer: &GraphExplorer,
    timetable: &Timetable,
    overlay: &FeedOverlay,
    step: &Step,
    edge: &Edge,
) -> Option<RideAccumulator> {
    let reference = edge.trip?;
    let departure_rel = explorer.graph.node(edge.to).event_time()?;
    let delay = overlay.delay_at(reference.trip, reference.seq);
    let realized_offset = crate::router::weighting::effective_delay(delay.departure);
    // Nearest-day rounding: reverse chains carry scheduled instants, so the
    // delay offset may leave a sub-day residual.
    let day_midnight = {
        let base = explorer.graph.base_midnight;
        let offset = step.t_to - realized_offset - base - departure_rel as i64;
        let day = (offset + SECONDS_PER_DAY as i64 / 2).div_euclid(SECONDS_PER_DAY as i64);
        base + day * SECONDS_PER_DAY as i64
    };

    let event = timetable.trips[reference.trip as usize]
        .events
        .get(reference.seq as usize)?;
    let stop = &timetable.stops[event.stop as usize];
    let call = StopCall {
        stop_id: stop.id.clone(),
        stop_name: stop.name.clone(),
        scheduled_arrival: None,
        realized_arrival: None,
        scheduled_departure: Some(ts(day_midnight + event.departure as i64)),
        realized_departure: Some(ts(day_midnight + event.departure as i64 + delay.departure as i64)),
    };

    Some(RideAccumulator {
        trip: reference.trip,
        day_midnight,
        start: step.t_to,
        calls: vec![call],
        stops: vec![event.stop],
    })
}

impl RideAccumulator {
    fn push_arrival(&mut self, timetable: &Timetable, overlay: &FeedOverlay, edge: &Edge) {
        let Some(reference) = edge.trip else { return };
        let arriving_seq = reference.seq + 1;
        let Some(event) = timetable.trips[self.trip as usize]
            .events
            .get(arriving_seq as usize)
        else {
            return;
        };
        let delay = overlay.delay_at(self.trip, arriving_seq);
        let stop = &timetable.stops[event.stop as usize];
        self.calls.push(StopCall {
            stop_id: stop.id.clone(),
            stop_name: stop.name.clone(),
            scheduled_arrival: Some(ts(self.day_midnight + event.arrival as i64)),
            realized_arrival: Some(ts(
                self.day_midnight + event.arrival as i64 + delay.arrival as i64
            )),
            scheduled_departure: None,
            realized_departure: None,
        });
        self.stops.push(event.stop);
    }

    fn mark_departure(&mut self, timetable: &Timetable, overlay: &FeedOverlay, edge: &Edge) {
        let Some(reference) = edge.trip else { return };
        let Some(event) = timetable.trips[self.trip as usize]
            .events
            .get(reference.seq as usize)
        else {
            return;
        };
        let delay = overlay.delay_at(self.trip, reference.seq);
        if let Some(last) = self.calls.last_mut() {
            last.scheduled_departure = Some(ts(self.day_midnight + event.departure as i64));
            last.realized_departure = Some(ts(
                self.day_midnight + event.departure as i64 + delay.departure as i64
            ));
        }
    }

    fn last_instant(&self) -> i64 {
        self.calls
            .last()
            .and_then(|c| c.realized_arrival.or(c.realized_departure))
            .map(|t| t.timestamp())
            .unwrap_or(self.start)
    }

    fn into_leg(self, timetable: &Timetable, end: i64) -> Leg {
        let trip = &timetable.trips[self.trip as usize];
        let route = &timetable.routes[trip.route as usize];
        let geometry: Vec<(f64, f64)> = self
            .stops
            .iter()
            .map(|&s| {
                let stop = &timetable.stops[s as usize];
                (stop.lat, stop.lon)
            })
            .collect();
        let distance_meters = geometry
            .windows(2)
            .map(|w| {
                Point::new(w[0].1, w[0].0)
                    .haversine_distance(&Point::new(w[1].1, w[1].0))
                    .round() as u32
            })
            .sum();

        Leg {
            mode: LegMode::Transit,
            start_time: ts(self.start),
            end_time: ts(end),
            distance_meters,
            start_stop_id: self.calls.first().map(|c| c.stop_id.clone()),
            start_stop_name: self.calls.first().map(|c| c.stop_name.clone()),
            end_stop_id: self.calls.last().map(|c| c.stop_id.clone()),
            end_stop_name: self.calls.last().map(|c| c.stop_name.clone()),
            route_id: Some(route.id.clone()),
            trip_id: Some(trip.id.clone()),
            trip_headsign: Some(trip.headsign.clone()),
            stop_calls: self.calls,
            geometry,
        }
    }
}

fn transfer_leg(
    explorer: &GraphExplorer,
    timetable: &Timetable,
    step: &Step,
    edge: &Edge,
) -> Leg {
    let stop_record = |node: NodeId| {
        explorer
            .graph
            .node(node)
            .stop()
            .map(|s| &timetable.stops[s as usize])
    };
    let from = stop_record(edge.from);
    let to = stop_record(edge.to);
    let geometry = vec![
        explorer.node_coord(edge.from),
        explorer.node_coord(edge.to),
    ];
    Leg {
        mode: LegMode::Transfer,
        start_time: ts(step.t_from),
        end_time: ts(step.t_to),
        distance_meters: edge.distance,
        start_stop_id: from.map(|s| s.id.clone()),
        start_stop_name: from.map(|s| s.name.clone()),
        end_stop_id: to.map(|s| s.id.clone()),
        end_stop_name: to.map(|s| s.name.clone()),
        route_id: None,
        trip_id: None,
        trip_headsign: None,
        stop_calls: Vec::new(),
        geometry,
    }
}

fn ts(unix_seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix_seconds, 0).unwrap_or_default()
}

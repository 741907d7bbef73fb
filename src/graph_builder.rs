// Assembles the base graph from the walk network and the timetable.
//
// Per stop the builder emits a station column: the canonical stop node, an
// entrance and an exit, a departure timeline (distinct seconds-of-day,
// chained by Wait and wrapped by Overnight) and an arrival timeline
// (chained by WaitArrival, drained by LeaveTimeExpanded). Trips hang off
// the timelines through Board edges and contribute Hop/Dwell/Alight chains.
// Stations within walking range of each other get Transfer footpaths.

use ahash::AHashMap;
use geo::{HaversineDistance, Point};
use itertools::Itertools;
use serde::Deserialize;

use crate::graph::{Edge, EdgeKind, NodeId, NodeKind, PtGraph, TripEventRef, NO_GEOMETRY};
use crate::models::{Timetable, SECONDS_PER_DAY};
use crate::street::StreetNetwork;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GraphBuilderConfig {
    /// Stations closer than this get a Transfer footpath.
    pub transfer_radius_m: f64,
    /// A stop farther than this from every walk node stays unlinked.
    pub max_stop_link_m: f64,
}

impl Default for GraphBuilderConfig {
    fn default() -> Self {
        GraphBuilderConfig {
            transfer_radius_m: 400.0,
            max_stop_link_m: 500.0,
        }
    }
}

struct StopColumn {
    enter: NodeId,
    exit: NodeId,
    /// seconds-of-day -> departure timeline node
    dep_timeline: AHashMap<u32, NodeId>,
    /// seconds-of-day -> arrival timeline node
    arr_timeline: AHashMap<u32, NodeId>,
}

pub fn build_graph(
    street: &StreetNetwork,
    timetable: &Timetable,
    config: &GraphBuilderConfig,
) -> PtGraph {
    let mut graph = PtGraph {
        base_midnight: timetable.base_midnight(),
        geometries: street.geometries.clone(),
        validity_masks: timetable.services.clone(),
        ..PtGraph::default()
    };

    // 1. Street layer. Node ids are shared with the street network so the
    // spatial index can address graph nodes directly.
    for node in &street.nodes {
        graph.add_node(NodeKind::Street, node.lat, node.lon);
    }
    for edge in &street.edges {
        graph.add_edge(Edge {
            from: edge.from,
            to: edge.to,
            kind: EdgeKind::Highway,
            time: 0,
            distance: edge.distance,
            validity: None,
            trip: None,
            geometry_id: edge.geometry_id,
        });
    }

    // 2. Departure/arrival seconds-of-day per stop, from every trip.
    let mut dep_times: Vec<Vec<u32>> = vec![Vec::new(); timetable.stops.len()];
    let mut arr_times: Vec<Vec<u32>> = vec![Vec::new(); timetable.stops.len()];
    for trip in &timetable.trips {
        let n = trip.events.len();
        for (i, event) in trip.events.iter().enumerate() {
            if i + 1 < n {
                dep_times[event.stop as usize].push(event.departure % SECONDS_PER_DAY);
            }
            if i > 0 {
                arr_times[event.stop as usize].push(event.arrival % SECONDS_PER_DAY);
            }
        }
    }

    // 3. Station columns.
    let mut columns = Vec::with_capacity(timetable.stops.len());
    for (stop_idx, stop) in timetable.stops.iter().enumerate() {
        let stop_idx = stop_idx as u32;
        let stop_node = graph.add_node(NodeKind::Stop { stop: stop_idx }, stop.lat, stop.lon);
        let enter = graph.add_node(NodeKind::StopEnterNode { stop: stop_idx }, stop.lat, stop.lon);
        let exit = graph.add_node(NodeKind::StopExitNode { stop: stop_idx }, stop.lat, stop.lon);
        graph.add_edge(Edge::wiring(stop_node, enter, EdgeKind::StopEnter));
        graph.add_edge(Edge::wiring(exit, stop_node, EdgeKind::StopExit));
        graph.stop_nodes.push(stop_node);

        if let Some((street_node, distance)) =
            nearest_street_node(street, stop.lat, stop.lon, config.max_stop_link_m)
        {
            graph.add_edge(Edge {
                from: street_node,
                to: enter,
                kind: EdgeKind::EnterPt,
                time: 0,
                distance: 0,
                validity: None,
                trip: None,
                geometry_id: NO_GEOMETRY,
            });
            graph.add_edge(Edge {
                from: exit,
                to: street_node,
                kind: EdgeKind::ExitPt,
                time: 0,
                distance: 0,
                validity: None,
                trip: None,
                geometry_id: NO_GEOMETRY,
            });
            let distance = distance.round() as u32;
            let mut marker = Edge::wiring(stop_node, street_node, EdgeKind::StopMarker);
            marker.distance = distance;
            graph.add_edge(marker);
            let mut marker_back = Edge::wiring(street_node, stop_node, EdgeKind::StopMarker);
            marker_back.distance = distance;
            graph.add_edge(marker_back);
        } else {
            log::warn!(
                "stop {} is farther than {}m from the walk network, not linked",
                stop.id,
                config.max_stop_link_m
            );
        }

        // Departure timeline: Wait chain plus the Overnight wrap, with the
        // entrance fanning out to every slot.
        let mut dep_timeline = AHashMap::new();
        let slots: Vec<u32> = dep_times[stop_idx as usize]
            .iter()
            .copied()
            .sorted()
            .dedup()
            .collect();
        let mut previous: Option<NodeId> = None;
        let mut first: Option<NodeId> = None;
        for time in slots {
            let node = graph.add_node(
                NodeKind::DepTimeline { stop: stop_idx, time },
                stop.lat,
                stop.lon,
            );
            dep_timeline.insert(time, node);
            graph.add_edge(Edge::wiring(enter, node, EdgeKind::EnterTimeExpanded));
            if let Some(prev) = previous {
                graph.add_edge(Edge::wiring(prev, node, EdgeKind::Wait));
            }
            first.get_or_insert(node);
            previous = Some(node);
        }
        if let (Some(last), Some(head)) = (previous, first) {
            if last != head {
                graph.add_edge(Edge::wiring(last, head, EdgeKind::Overnight));
            }
        }

        // Arrival timeline, drained into the exit node.
        let mut arr_timeline = AHashMap::new();
        let slots: Vec<u32> = arr_times[stop_idx as usize]
            .iter()
            .copied()
            .sorted()
            .dedup()
            .collect();
        let mut previous: Option<NodeId> = None;
        for time in slots {
            let node = graph.add_node(
                NodeKind::ArrTimeline { stop: stop_idx, time },
                stop.lat,
                stop.lon,
            );
            arr_timeline.insert(time, node);
            graph.add_edge(Edge::wiring(node, exit, EdgeKind::LeaveTimeExpanded));
            if let Some(prev) = previous {
                graph.add_edge(Edge::wiring(prev, node, EdgeKind::WaitArrival));
            }
            previous = Some(node);
        }

        columns.push(StopColumn {
            enter,
            exit,
            dep_timeline,
            arr_timeline,
        });
    }

    // 4. Trip chains: Board -> (Hop -> Dwell)* -> Hop -> Alight.
    for (trip_idx, trip) in timetable.trips.iter().enumerate() {
        let trip_idx = trip_idx as u32;
        let n = trip.events.len();
        let mut dep_nodes: Vec<Option<NodeId>> = vec![None; n];
        let mut arr_nodes: Vec<Option<NodeId>> = vec![None; n];

        for (i, event) in trip.events.iter().enumerate() {
            let stop = &timetable.stops[event.stop as usize];
            if i + 1 < n {
                dep_nodes[i] = Some(graph.add_node(
                    NodeKind::TripDeparture {
                        stop: event.stop,
                        trip: trip_idx,
                        seq: i as u16,
                        time: event.departure,
                    },
                    stop.lat,
                    stop.lon,
                ));
            }
            if i > 0 {
                arr_nodes[i] = Some(graph.add_node(
                    NodeKind::TripArrival {
                        stop: event.stop,
                        trip: trip_idx,
                        seq: i as u16,
                        time: event.arrival,
                    },
                    stop.lat,
                    stop.lon,
                ));
            }
        }

        for (i, event) in trip.events.iter().enumerate() {
            let column = &columns[event.stop as usize];
            let reference = TripEventRef {
                trip: trip_idx,
                seq: i as u16,
            };

            if let Some(dep_node) = dep_nodes[i] {
                let slot = event.departure % SECONDS_PER_DAY;
                match column.dep_timeline.get(&slot) {
                    Some(&timeline_node) => {
                        graph.add_edge(Edge {
                            from: timeline_node,
                            to: dep_node,
                            kind: EdgeKind::Board,
                            time: 0,
                            distance: 0,
                            validity: Some(trip.service),
                            trip: Some(reference),
                            geometry_id: NO_GEOMETRY,
                        });
                    }
                    None => log::error!(
                        "trip {} departure slot {} missing from timeline of stop {}",
                        trip.id,
                        slot,
                        timetable.stops[event.stop as usize].id
                    ),
                }
            }

            if let (Some(arr_node), Some(dep_node)) = (arr_nodes[i], dep_nodes[i]) {
                let mut dwell = Edge::wiring(arr_node, dep_node, EdgeKind::Dwell);
                dwell.time = event.departure.saturating_sub(event.arrival);
                dwell.trip = Some(reference);
                graph.add_edge(dwell);
            }

            if let Some(arr_node) = arr_nodes[i] {
                let slot = event.arrival % SECONDS_PER_DAY;
                if let Some(&timeline_node) = column.arr_timeline.get(&slot) {
                    let mut alight = Edge::wiring(arr_node, timeline_node, EdgeKind::Alight);
                    alight.trip = Some(reference);
                    graph.add_edge(alight);
                }
            }

            if i + 1 < n {
                let next = &trip.events[i + 1];
                let (Some(dep_node), Some(arr_node)) = (dep_nodes[i], arr_nodes[i + 1]) else {
                    continue;
                };
                if next.arrival < event.departure {
                    log::warn!(
                        "trip {} arrives at seq {} before departing seq {}",
                        trip.id,
                        next.seq,
                        event.seq
                    );
                }
                let mut hop = Edge::wiring(dep_node, arr_node, EdgeKind::Hop);
                hop.time = next.arrival.saturating_sub(event.departure);
                hop.trip = Some(reference);
                graph.add_edge(hop);
            }
        }
    }

    // 5. Transfer footpaths between nearby stations.
    let mut transfer_count = 0usize;
    for (a, stop_a) in timetable.stops.iter().enumerate() {
        for (b, stop_b) in timetable.stops.iter().enumerate() {
            if a == b {
                continue;
            }
            let distance = Point::new(stop_a.lon, stop_a.lat)
                .haversine_distance(&Point::new(stop_b.lon, stop_b.lat));
            if distance > config.transfer_radius_m {
                continue;
            }
            graph.add_edge(Edge {
                from: columns[a].exit,
                to: columns[b].enter,
                kind: EdgeKind::Transfer,
                time: 0,
                distance: distance.round() as u32,
                validity: None,
                trip: None,
                geometry_id: NO_GEOMETRY,
            });
            transfer_count += 1;
        }
    }

    log::info!(
        "graph: {} nodes, {} edges ({} street), {} transfers",
        graph.node_count(),
        graph.edge_count(),
        street.edges.len(),
        transfer_count
    );
    graph
}

fn nearest_street_node(
    street: &StreetNetwork,
    lat: f64,
    lon: f64,
    max_distance_m: f64,
) -> Option<(NodeId, f64)> {
    let here = Point::new(lon, lat);
    let mut best: Option<(NodeId, f64)> = None;
    for (idx, node) in street.nodes.iter().enumerate() {
        let distance = here.haversine_distance(&Point::new(node.lon, node.lat));
        if distance <= max_distance_m && best.map_or(true, |(_, d)| distance < d) {
            best = Some((idx as NodeId, distance));
        }
    }
    best
}

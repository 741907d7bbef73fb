// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

// Request orchestration.
//
// A PtRouter owns the immutable load-time artifacts (graph, timetable,
// street network, snap index) and the handle to the current realtime
// snapshot. Each request gets its own handler: validate, resolve the two
// endpoints (snapping coordinates and materializing access edges), run the
// main multi-criteria search, and fold the surviving labels into
// itineraries. Everything per-request dies with the handler.

pub mod explorer;
pub mod label_setting;
pub mod query_graph;
pub mod station_access;
pub mod trip_reconstruction;
pub mod weighting;

#[cfg(test)]
mod test_fixture;
#[cfg(test)]
mod test_point_to_point;
#[cfg(test)]
mod test_profile;
#[cfg(test)]
mod test_realtime;

use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::api::{PtRequest, PtResponse, RequestPoint};
use crate::error::RoutingError;
use crate::graph::{NodeId, PtGraph};
use crate::models::Timetable;
use crate::realtime::{FeedOverlay, OverlayHandle};
use crate::spatial::{SnapIndex, DEFAULT_MAX_SNAP_DISTANCE_M};
use crate::street::StreetNetwork;

use explorer::GraphExplorer;
use label_setting::{
    Label, MultiCriteriaLabelSetting, SearchParams, DEFAULT_MAX_VISITED_NODES,
};
use query_graph::QueryGraph;
use station_access::materialize_access_edges;
use trip_reconstruction::itinerary_from_label;
use weighting::Weighting;

pub struct PtRouter {
    graph: Arc<PtGraph>,
    timetable: Arc<Timetable>,
    street: Arc<StreetNetwork>,
    snap_index: Arc<SnapIndex>,
    overlay: Arc<OverlayHandle>,
}

impl PtRouter {
    /// A router without a realtime feed.
    pub fn new(graph: PtGraph, timetable: Timetable, street: StreetNetwork) -> PtRouter {
        let snap_index = SnapIndex::build(&street);
        PtRouter {
            graph: Arc::new(graph),
            timetable: Arc::new(timetable),
            street: Arc::new(street),
            snap_index: Arc::new(snap_index),
            overlay: Arc::new(OverlayHandle::default()),
        }
    }

    /// A router with an initial realtime snapshot.
    pub fn with_realtime(
        graph: PtGraph,
        timetable: Timetable,
        street: StreetNetwork,
        overlay: FeedOverlay,
    ) -> PtRouter {
        let router = PtRouter::new(graph, timetable, street);
        router.publish_realtime(overlay);
        router
    }

    /// Atomically swaps in a new realtime snapshot. In-flight queries keep
    /// the snapshot they captured at entry.
    pub fn publish_realtime(&self, overlay: FeedOverlay) {
        self.overlay.publish(overlay);
    }

    pub fn graph(&self) -> &PtGraph {
        &self.graph
    }

    pub fn route(&self, request: &PtRequest) -> Result<PtResponse, RoutingError> {
        self.route_with_visitor(request, &mut |_| {})
    }

    /// Streaming variant: the visitor sees every label the main search
    /// settles, in settlement order.
    pub fn route_with_visitor(
        &self,
        request: &PtRequest,
        visitor: &mut dyn FnMut(&Label),
    ) -> Result<PtResponse, RoutingError> {
        RequestHandler::new(self, request)?.route(visitor)
    }
}

/// One endpoint after resolution: where the main search binds it.
struct ResolvedEndpoint {
    search_node: NodeId,
}

struct RequestHandler<'a> {
    router: &'a PtRouter,
    overlay: Arc<FeedOverlay>,
    points: Vec<RequestPoint>,
    weighting: Weighting,
    anchor: i64,
    arrive_by: bool,
    profile_query: bool,
    ignore_transfers: bool,
    limit_solutions: usize,
    max_walk_meters: Option<u32>,
    max_transfer_meters: Option<u32>,
    max_visited_nodes: usize,
    /// Visited-node counts per label-setting run (access passes + main).
    run_visited: Vec<usize>,
}

impl<'a> RequestHandler<'a> {
    fn new(router: &'a PtRouter, request: &PtRequest) -> Result<RequestHandler<'a>, RoutingError> {
        if request.points.len() != 2 {
            return Err(RoutingError::InvalidArgument(format!(
                "exactly 2 points have to be specified, but was: {}",
                request.points.len()
            )));
        }
        let anchor = chrono::DateTime::parse_from_rfc3339(&request.earliest_departure_time)
            .map_err(|_| {
                RoutingError::InvalidArgument(format!(
                    "illegal value for required parameter {}: [{}]",
                    crate::api::HINT_EARLIEST_DEPARTURE_TIME,
                    request.earliest_departure_time
                ))
            })?
            .timestamp();

        Ok(RequestHandler {
            router,
            overlay: router.overlay.snapshot(),
            points: request.points.clone(),
            weighting: Weighting::new(request.walk_speed),
            anchor,
            arrive_by: request.arrive_by,
            profile_query: request.profile_query,
            ignore_transfers: request.ignore_transfers,
            limit_solutions: request.solution_limit(),
            max_walk_meters: request.max_walk_distance_per_leg.map(|m| m as u32),
            max_transfer_meters: request.max_transfer_distance_per_leg.map(|m| m as u32),
            max_visited_nodes: request
                .max_visited_nodes
                .unwrap_or(DEFAULT_MAX_VISITED_NODES),
            run_visited: Vec::new(),
        })
    }

    fn route(mut self, visitor: &mut dyn FnMut(&Label)) -> Result<PtResponse, RoutingError> {
        let request_points = self.points.clone();
        let mut response = PtResponse::default();
        let mut query = QueryGraph::new(&self.router.graph, &self.overlay);

        let lookup_timer = Instant::now();
        let origin = self.resolve_endpoint(0, &request_points[0], &mut query)?;
        let destination = self.resolve_endpoint(1, &request_points[1], &mut query)?;
        response.hints.insert(
            "idLookup".to_string(),
            json!(lookup_timer.elapsed().as_secs_f64()),
        );

        let (start, dest) = if self.arrive_by {
            (destination.search_node, origin.search_node)
        } else {
            (origin.search_node, destination.search_node)
        };

        let routing_timer = Instant::now();
        let graph_explorer = GraphExplorer {
            graph: &self.router.graph,
            overlay: &self.overlay,
            query: &query,
            weighting: &self.weighting,
            reverse: self.arrive_by,
            walk_only: false,
        };
        let params = SearchParams {
            reverse: self.arrive_by,
            transfer_criterion: !self.ignore_transfers,
            profile_query: self.profile_query,
            max_walk_meters_per_leg: self.max_walk_meters,
            max_transfer_meters_per_leg: self.max_transfer_meters,
            max_visited_nodes: self.max_visited_nodes,
            limit_solutions: self.limit_solutions,
            remaining_estimate: None,
        };
        let search = MultiCriteriaLabelSetting::new(&graph_explorer, params);
        let outcome = search.run(start, self.anchor, Some(dest), Some(visitor));
        self.run_visited.push(outcome.visited_nodes);
        response.hints.insert(
            "routing".to_string(),
            json!(routing_timer.elapsed().as_secs_f64()),
        );

        for &terminal in &outcome.solutions {
            response.itineraries.push(itinerary_from_label(
                &graph_explorer,
                &self.router.timetable,
                &self.overlay,
                &outcome.arena,
                terminal,
                self.arrive_by,
            ));
        }
        response
            .itineraries
            .sort_by_key(|itinerary| (itinerary.duration_seconds, itinerary.end_time));

        let visited_sum: usize = self.run_visited.iter().sum();
        response
            .hints
            .insert("visited_nodes.sum".to_string(), json!(visited_sum));
        response.hints.insert(
            "visited_nodes.average".to_string(),
            json!(visited_sum as f64 / self.run_visited.len().max(1) as f64),
        );
        if outcome.exhausted {
            response
                .hints
                .insert("visited_nodes.exhausted".to_string(), json!(true));
        }
        if response.itineraries.is_empty() {
            response.hints.insert("no_path".to_string(), json!(true));
        }

        log::info!(
            "routed {:?} -> {:?}: {} itineraries, {} visited nodes",
            request_points[0],
            request_points[1],
            response.itineraries.len(),
            visited_sum
        );
        Ok(response)
    }

    /// Resolves one endpoint. Stations bind to their station node;
    /// coordinates snap to the walk network, get a virtual node, and run
    /// the station-access pass in the fitting direction.
    fn resolve_endpoint(
        &mut self,
        index: usize,
        point: &RequestPoint,
        query: &mut QueryGraph,
    ) -> Result<ResolvedEndpoint, RoutingError> {
        match point {
            RequestPoint::Station { stop_id } => {
                let stop = self
                    .router
                    .timetable
                    .stop_idx(stop_id)
                    .and_then(|s| self.router.graph.stop_node(s))
                    .ok_or_else(|| {
                        RoutingError::InvalidArgument(format!("unknown stop id: {}", stop_id))
                    })?;
                Ok(ResolvedEndpoint { search_node: stop })
            }
            RequestPoint::Coordinate { lat, lon } => {
                let snap = self
                    .router
                    .snap_index
                    .snap(*lat, *lon, DEFAULT_MAX_SNAP_DISTANCE_M)
                    .ok_or(RoutingError::PointNotFound { index })?;
                let snapped_node = query.bind_snap(&self.router.street, &snap);
                let virtual_node = query.add_virtual_node(*lat, *lon);

                let access = materialize_access_edges(
                    &self.router.graph,
                    &self.overlay,
                    &self.weighting,
                    query,
                    snapped_node,
                    self.anchor,
                    index == 1,
                    virtual_node,
                    self.max_walk_meters,
                    self.max_visited_nodes,
                );
                self.run_visited.push(access.visited_nodes);
                Ok(ResolvedEndpoint {
                    search_node: virtual_node,
                })
            }
        }
    }
}

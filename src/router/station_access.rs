// Station access and egress.
//
// A short walk-only label-setting pass from the snapped endpoint node.
// Every settled label sitting just past the station boundary (EnterPt
// going out, ExitPt coming back) is folded into one virtual edge between
// the endpoint's virtual node and the boundary node, priced with the
// reconstructed walk path. The main search then treats the whole access
// walk as a single fixed-cost, leg-resetting edge.

use crate::graph::{Edge, EdgeKind, NodeId, PtGraph, NO_GEOMETRY};
use crate::realtime::FeedOverlay;
use crate::router::explorer::GraphExplorer;
use crate::router::label_setting::{Label, MultiCriteriaLabelSetting, SearchParams};
use crate::router::query_graph::QueryGraph;
use crate::router::weighting::Weighting;

pub struct AccessOutcome {
    pub edges_added: usize,
    pub visited_nodes: usize,
}

/// Runs the access pass and appends the resulting virtual edges to the
/// query graph. `reverse=false` wires the origin side (virtual node ->
/// station entrances), `reverse=true` the destination side (station exits
/// -> virtual node).
#[allow(clippy::too_many_arguments)]
pub fn materialize_access_edges(
    graph: &PtGraph,
    overlay: &FeedOverlay,
    weighting: &Weighting,
    query: &mut QueryGraph,
    snapped_node: NodeId,
    start_time: i64,
    reverse: bool,
    virtual_node: NodeId,
    max_walk_meters_per_leg: Option<u32>,
    max_visited_nodes: usize,
) -> AccessOutcome {
    let boundary = if reverse {
        EdgeKind::ExitPt
    } else {
        EdgeKind::EnterPt
    };

    // The walk-only search and the harvested boundary labels; the explorer
    // borrow ends before the query graph is extended.
    let (outcome, reachable) = {
        let explorer = GraphExplorer {
            graph,
            overlay,
            query,
            weighting,
            reverse,
            walk_only: true,
        };
        let params = SearchParams {
            reverse,
            transfer_criterion: false,
            profile_query: false,
            max_walk_meters_per_leg,
            max_transfer_meters_per_leg: None,
            max_visited_nodes,
            limit_solutions: usize::MAX,
            remaining_estimate: None,
        };
        let search = MultiCriteriaLabelSetting::new(&explorer, params);
        let outcome = search.run(snapped_node, start_time, None, None);

        let mut reachable = Vec::new();
        for front in outcome.fronts.values() {
            for &idx in front {
                let label = &outcome.arena[idx as usize];
                let Some(edge_id) = label.edge else { continue };
                let Some(edge) = explorer.edge(edge_id) else { continue };
                if edge.kind != boundary {
                    continue;
                }
                let walk = reconstruct_walk(&explorer, &outcome.arena, idx, reverse);
                reachable.push((label.node, (label.time - start_time).abs(), walk));
            }
        }
        (outcome, reachable)
    };

    let edges_added = reachable.len();
    for (boundary_node, seconds, walk) in reachable {
        let (from, to) = if reverse {
            (boundary_node, virtual_node)
        } else {
            (virtual_node, boundary_node)
        };
        query.add_virtual_edge(
            Edge {
                from,
                to,
                kind: boundary,
                time: seconds as u32,
                distance: walk.meters,
                validity: None,
                trip: None,
                geometry_id: NO_GEOMETRY,
            },
            walk.geometry,
        );
    }

    if edges_added == 0 {
        log::debug!(
            "access pass from node {} reached no station boundary",
            snapped_node
        );
    }
    AccessOutcome {
        edges_added,
        visited_nodes: outcome.visited_nodes,
    }
}

struct WalkPath {
    meters: u32,
    geometry: Vec<(f64, f64)>,
}

/// Walks the boundary label's parent chain back to the snapped node and
/// assembles total distance plus a travel-ordered polyline.
fn reconstruct_walk(
    explorer: &GraphExplorer,
    arena: &[Label],
    terminal: u32,
    reverse: bool,
) -> WalkPath {
    let mut meters = 0u32;
    let mut points: Vec<(f64, f64)> = Vec::new();

    let mut cursor = Some(terminal);
    while let Some(idx) = cursor {
        let label = &arena[idx as usize];
        if let Some(edge_id) = label.edge {
            if let Some(edge) = explorer.edge(edge_id) {
                meters += edge.distance;
                match explorer.edge_geometry(edge_id) {
                    Some(geometry) => points.extend(geometry.iter().rev().copied()),
                    None => {
                        points.push(explorer.node_coord(label.node));
                        points.push(explorer.node_coord(edge_centered_parent(edge, label.node)));
                    }
                }
            }
        } else {
            points.push(explorer.node_coord(label.node));
        }
        cursor = label.parent;
    }

    // The chain runs terminal -> root. For a forward (origin) pass travel
    // order is root -> terminal; for the egress pass the chain already is
    // travel order.
    if !reverse {
        points.reverse();
    }
    points.dedup_by(|a, b| (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9);

    WalkPath { meters, geometry: points }
}

/// The other endpoint of an edge relative to the node a label sits on.
fn edge_centered_parent(edge: &Edge, node: NodeId) -> NodeId {
    if edge.to == node {
        edge.from
    } else {
        edge.to
    }
}

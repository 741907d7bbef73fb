// The query-time view of the graph.
//
// One operation: enumerate the edges leaving (or entering, under reverse)
// a node, each priced by the cost model at the label's current time. The
// stream merges three layers: base edges, the realtime overlay's extra
// edges, and the query graph's virtual edges, in that order. Suppressed
// trip instances never surface; the search cannot tell the layers apart.

use crate::graph::{Edge, EdgeId, EdgeKind, NodeId, PtGraph};
use crate::realtime::FeedOverlay;
use crate::router::query_graph::QueryGraph;
use crate::router::weighting::{EdgeCost, Weighting};

/// One priced edge as seen from a label.
#[derive(Clone, Copy, Debug)]
pub struct ExploredEdge {
    pub edge: EdgeId,
    pub neighbor: NodeId,
    pub kind: EdgeKind,
    pub cost: EdgeCost,
}

pub struct GraphExplorer<'a> {
    pub graph: &'a PtGraph,
    pub overlay: &'a FeedOverlay,
    pub query: &'a QueryGraph,
    pub weighting: &'a Weighting,
    /// Walk the reverse adjacency; time runs backward from the anchor.
    pub reverse: bool,
    /// Restrict to the walk network plus the station boundary of the
    /// current direction (the station-access pass view).
    pub walk_only: bool,
}

impl<'a> GraphExplorer<'a> {
    /// Resolves any edge id across the three layers.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        if id < self.graph.edge_count() {
            return Some(self.graph.edge(id));
        }
        if let Some(edge) = self.overlay.extra_edge(self.graph, id) {
            return Some(edge);
        }
        self.query.edge(id)
    }

    /// Geometry for an edge: the street pool for base edges, the attached
    /// walk path for virtual ones.
    pub fn edge_geometry(&self, id: EdgeId) -> Option<&[(f64, f64)]> {
        if id < self.graph.edge_count() {
            let geometry_id = self.graph.edge(id).geometry_id;
            return self
                .graph
                .geometries
                .get(geometry_id as usize)
                .map(|g| g.as_slice());
        }
        self.query.edge_geometry(id)
    }

    pub fn node_coord(&self, node: NodeId) -> (f64, f64) {
        if let Some(coord) = self.query.node_coord(node) {
            return coord;
        }
        self.graph
            .coords
            .get(node as usize)
            .copied()
            .unwrap_or((0.0, 0.0))
    }

    /// Yields every traversable edge at `node` for a label clocked at
    /// `now`, in layer order: base, overlay extras, query virtuals.
    pub fn for_each_edge(&self, node: NodeId, now: i64, f: &mut impl FnMut(ExploredEdge)) {
        if node < self.graph.node_count() {
            let base_ids = if self.reverse {
                self.graph.incoming(node)
            } else {
                self.graph.out(node)
            };
            for &id in base_ids {
                self.offer(id, self.graph.edge(id), now, f);
            }

            let extra_ids = if self.reverse {
                self.overlay.extra_by_to.get(&node)
            } else {
                self.overlay.extra_by_from.get(&node)
            };
            if let Some(extra_ids) = extra_ids {
                for &idx in extra_ids {
                    let id = self.graph.edge_count() + idx;
                    if let Some(edge) = self.overlay.extra.get(idx as usize) {
                        self.offer(id, edge, now, f);
                    }
                }
            }
        }

        let virtual_ids = if self.reverse {
            self.query.incoming_at(node)
        } else {
            self.query.out(node)
        };
        for &id in virtual_ids {
            if let Some(edge) = self.query.edge(id) {
                self.offer(id, edge, now, f);
            }
        }
    }

    fn offer(&self, id: EdgeId, edge: &Edge, now: i64, f: &mut impl FnMut(ExploredEdge)) {
        if self.walk_only && !self.walkable(edge.kind) {
            return;
        }
        let Some(cost) = self
            .weighting
            .evaluate(self.graph, self.overlay, edge, now, self.reverse)
        else {
            return;
        };
        f(ExploredEdge {
            edge: id,
            neighbor: if self.reverse { edge.from } else { edge.to },
            kind: edge.kind,
            cost,
        });
    }

    fn walkable(&self, kind: EdgeKind) -> bool {
        match kind {
            EdgeKind::Highway => true,
            EdgeKind::EnterPt => !self.reverse,
            EdgeKind::ExitPt => self.reverse,
            _ => false,
        }
    }
}

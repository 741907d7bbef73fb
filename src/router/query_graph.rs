// Query-time graph augmentation.
//
// Virtual nodes and edges exist for one request only: the endpoint nodes,
// the split of a snapped street segment, and the access/egress edges the
// station-access pass materializes. Ids are allocated above the base graph
// (and above the overlay's extra-edge range) so the explorer can resolve
// any id without knowing who owns it. The base graph is never touched.

use ahash::AHashMap;

use crate::graph::{Edge, EdgeId, EdgeKind, NodeId, PtGraph, NO_GEOMETRY};
use crate::realtime::FeedOverlay;
use crate::spatial::Snap;
use crate::street::StreetNetwork;

pub struct QueryGraph {
    base_nodes: u32,
    first_virtual_edge: u32,
    virtual_coords: Vec<(f64, f64)>,
    virtual_edges: Vec<Edge>,
    /// Walk geometry per virtual edge, parallel to `virtual_edges`.
    virtual_geometry: Vec<Vec<(f64, f64)>>,
    out: AHashMap<NodeId, Vec<EdgeId>>,
    incoming: AHashMap<NodeId, Vec<EdgeId>>,
}

impl QueryGraph {
    pub fn new(graph: &PtGraph, overlay: &FeedOverlay) -> QueryGraph {
        QueryGraph {
            base_nodes: graph.node_count(),
            first_virtual_edge: graph.edge_count() + overlay.extra.len() as u32,
            virtual_coords: Vec::new(),
            virtual_edges: Vec::new(),
            virtual_geometry: Vec::new(),
            out: AHashMap::new(),
            incoming: AHashMap::new(),
        }
    }

    pub fn is_virtual_node(&self, node: NodeId) -> bool {
        node >= self.base_nodes
    }

    pub fn add_virtual_node(&mut self, lat: f64, lon: f64) -> NodeId {
        self.virtual_coords.push((lat, lon));
        self.base_nodes + (self.virtual_coords.len() - 1) as u32
    }

    pub fn node_coord(&self, node: NodeId) -> Option<(f64, f64)> {
        if node < self.base_nodes {
            return None;
        }
        self.virtual_coords
            .get((node - self.base_nodes) as usize)
            .copied()
    }

    pub fn add_virtual_edge(&mut self, edge: Edge, geometry: Vec<(f64, f64)>) -> EdgeId {
        let id = self.first_virtual_edge + self.virtual_edges.len() as u32;
        self.out.entry(edge.from).or_default().push(id);
        self.incoming.entry(edge.to).or_default().push(id);
        self.virtual_edges.push(edge);
        self.virtual_geometry.push(geometry);
        id
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        if id < self.first_virtual_edge {
            return None;
        }
        self.virtual_edges.get((id - self.first_virtual_edge) as usize)
    }

    pub fn edge_geometry(&self, id: EdgeId) -> Option<&[(f64, f64)]> {
        if id < self.first_virtual_edge {
            return None;
        }
        self.virtual_geometry
            .get((id - self.first_virtual_edge) as usize)
            .map(|g| g.as_slice())
    }

    pub fn out(&self, node: NodeId) -> &[EdgeId] {
        self.out.get(&node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn incoming_at(&self, node: NodeId) -> &[EdgeId] {
        self.incoming.get(&node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Binds a snap result into the graph. A snap in the interior of a
    /// street segment splits it: a virtual node at the projection plus
    /// virtual Highway stubs to both endpoints, in both directions. A snap
    /// on a node binds to that node directly.
    pub fn bind_snap(&mut self, street: &StreetNetwork, snap: &Snap) -> NodeId {
        let Some((street_edge, fraction)) = snap.edge else {
            return snap.node;
        };
        let Some(edge) = street.edges.get(street_edge as usize) else {
            log::error!("snap references street edge {} out of range", street_edge);
            return snap.node;
        };

        let split = self.add_virtual_node(snap.point.0, snap.point.1);
        let to_from = (edge.distance as f64 * fraction).round() as u32;
        let to_to = edge.distance.saturating_sub(to_from);

        let from_coord = street.node_coord(edge.from);
        let to_coord = street.node_coord(edge.to);
        for (neighbor, distance, coord) in [
            (edge.from, to_from, from_coord),
            (edge.to, to_to, to_coord),
        ] {
            let stub = Edge {
                from: split,
                to: neighbor,
                kind: EdgeKind::Highway,
                time: 0,
                distance,
                validity: None,
                trip: None,
                geometry_id: NO_GEOMETRY,
            };
            let mut back = stub.clone();
            back.from = neighbor;
            back.to = split;
            self.add_virtual_edge(stub, vec![snap.point, coord]);
            self.add_virtual_edge(back, vec![coord, snap.point]);
        }
        split
    }
}

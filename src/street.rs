// The walk-network contract.
//
// The street layer is produced by an external OSM import step; this crate
// only consumes it. Topology is a plain edge list with per-node adjacency
// built on demand by the graph builder. Geometries are stored in a pool so
// the hot Edge struct stays small.

/// Sentinel for "no geometry attached".
pub const NO_GEOMETRY: u32 = u32::MAX;

/// A physical location on the walk network (intersection, dead end).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreetNode {
    /// Latitude in degrees (WGS84).
    pub lat: f64,
    /// Longitude in degrees (WGS84).
    pub lon: f64,
}

/// A directed walkable connection between two nodes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreetEdge {
    pub from: u32,
    pub to: u32,
    /// Length in meters.
    pub distance: u32,
    /// Index into `StreetNetwork::geometries`, or `NO_GEOMETRY`.
    pub geometry_id: u32,
}

/// The pedestrian street graph handed over by the OSM builder.
#[derive(Clone, Debug, Default)]
pub struct StreetNetwork {
    pub nodes: Vec<StreetNode>,
    pub edges: Vec<StreetEdge>,
    /// Pool of polyline geometries as (lat, lon) pairs.
    pub geometries: Vec<Vec<(f64, f64)>>,
}

impl StreetNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, lat: f64, lon: f64) -> u32 {
        self.nodes.push(StreetNode { lat, lon });
        (self.nodes.len() - 1) as u32
    }

    /// Adds a walkable connection in both directions.
    pub fn link(&mut self, a: u32, b: u32, distance: u32) {
        self.edges.push(StreetEdge {
            from: a,
            to: b,
            distance,
            geometry_id: NO_GEOMETRY,
        });
        self.edges.push(StreetEdge {
            from: b,
            to: a,
            distance,
            geometry_id: NO_GEOMETRY,
        });
    }

    pub fn node_coord(&self, node: u32) -> (f64, f64) {
        let n = &self.nodes[node as usize];
        (n.lat, n.lon)
    }
}

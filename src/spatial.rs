// Snap index over the walk network.
//
// Two bulk-loaded trees: one over nodes for the access-pass start, one over
// edge segments so a coordinate landing mid-segment can split that edge in
// the query graph. Planar [lon, lat] geometry inside the trees, haversine
// for the final radius check.

use geo::{HaversineDistance, Point};
use rstar::primitives::{GeomWithData, Line};
use rstar::RTree;

use crate::street::StreetNetwork;

/// Default maximum snap distance in meters.
pub const DEFAULT_MAX_SNAP_DISTANCE_M: f64 = 500.0;

/// Where a coordinate attached to the walk network.
#[derive(Clone, Debug, PartialEq)]
pub struct Snap {
    /// Closest walk node; the station-access pass starts here.
    pub node: u32,
    /// Street edge index and projection fraction, when the snap point lies
    /// in the interior of a segment. The query graph splits that edge.
    pub edge: Option<(u32, f64)>,
    /// The snapped point (lat, lon).
    pub point: (f64, f64),
    /// Haversine distance from the query coordinate to the snapped point.
    pub distance_m: f64,
}

pub struct SnapIndex {
    node_tree: RTree<GeomWithData<[f64; 2], u32>>,
    edge_tree: RTree<GeomWithData<Line<[f64; 2]>, u32>>,
}

impl SnapIndex {
    pub fn build(street: &StreetNetwork) -> SnapIndex {
        let node_items = street
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| GeomWithData::new([node.lon, node.lat], idx as u32))
            .collect();

        let mut edge_items = Vec::with_capacity(street.edges.len());
        for (idx, edge) in street.edges.iter().enumerate() {
            // One entry per undirected pair is enough for snapping.
            if edge.from > edge.to {
                continue;
            }
            let from = &street.nodes[edge.from as usize];
            let to = &street.nodes[edge.to as usize];
            edge_items.push(GeomWithData::new(
                Line::new([from.lon, from.lat], [to.lon, to.lat]),
                idx as u32,
            ));
        }

        SnapIndex {
            node_tree: RTree::bulk_load(node_items),
            edge_tree: RTree::bulk_load(edge_items),
        }
    }

    /// Snaps a coordinate to the walk network, or `None` when nothing lies
    /// within `max_distance_m`.
    pub fn snap(&self, lat: f64, lon: f64, max_distance_m: f64) -> Option<Snap> {
        let query = [lon, lat];
        let here = Point::new(lon, lat);

        let nearest_node = self.node_tree.nearest_neighbor(&query)?;
        let node_point = Point::new(nearest_node.geom()[0], nearest_node.geom()[1]);
        let node_distance = here.haversine_distance(&node_point);

        // Prefer a segment projection when it is meaningfully closer than
        // the nearest node; otherwise snap straight onto the node.
        if let Some(nearest_edge) = self.edge_tree.nearest_neighbor(&query) {
            let line = nearest_edge.geom();
            let (projection, fraction) = project_on_segment(&query, &line.from, &line.to);
            let projection_point = Point::new(projection[0], projection[1]);
            let edge_distance = here.haversine_distance(&projection_point);

            if edge_distance < node_distance && fraction > 0.001 && fraction < 0.999 {
                if edge_distance > max_distance_m {
                    return None;
                }
                return Some(Snap {
                    node: nearest_node.data,
                    edge: Some((nearest_edge.data, fraction)),
                    point: (projection[1], projection[0]),
                    distance_m: edge_distance,
                });
            }
        }

        if node_distance > max_distance_m {
            return None;
        }
        Some(Snap {
            node: nearest_node.data,
            edge: None,
            point: (node_point.y(), node_point.x()),
            distance_m: node_distance,
        })
    }
}

/// Projects `p` onto the segment `a`..`b`; returns the projection and its
/// fraction along the segment.
fn project_on_segment(p: &[f64; 2], a: &[f64; 2], b: &[f64; 2]) -> ([f64; 2], f64) {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return (*a, 0.0);
    }
    let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len2).clamp(0.0, 1.0);
    ([a[0] + t * dx, a[1] + t * dy], t)
}

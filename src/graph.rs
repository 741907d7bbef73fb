// The base routing multigraph.
//
// Streets and the time-expanded transit network share one id space so the
// search never cares which layer an edge belongs to. The graph is built once
// at load time and is strictly read-only afterwards; query-time additions
// (virtual endpoints, realtime extras) live in their own overlays and
// allocate ids above the base ranges.

use crate::models::ServiceDays;

pub type NodeId = u32;
pub type EdgeId = u32;

/// Sentinel for "no geometry attached".
pub const NO_GEOMETRY: u32 = u32::MAX;

/// Classification of every edge in the network. The kind fixes how the cost
/// model advances time, whether the edge counts as a transfer boundary, and
/// whether it contributes to a walk budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Street segment of the walk network.
    Highway,
    /// Walk network -> station entrance. Resets the per-leg walk budget.
    EnterPt,
    /// Station exit -> walk network. Resets the per-leg walk budget.
    ExitPt,
    /// Station entrance -> a departure-timeline slot (waits until the slot).
    EnterTimeExpanded,
    /// Arrival-timeline slot -> station exit.
    LeaveTimeExpanded,
    /// Station node <-> its snap point on the walk network.
    StopMarker,
    /// Station node -> station entrance (station-origin queries).
    StopEnter,
    /// Station exit -> station node (station-destination queries).
    StopExit,
    /// Scheduled vehicle movement between consecutive stops of a trip.
    Hop,
    /// Vehicle waiting at a stop between arrival and departure.
    Dwell,
    /// Departure-timeline slot -> a trip's departure event. The only edge
    /// kind that counts as a transfer; carries the trip's validity mask.
    Board,
    /// Trip arrival event -> arrival timeline.
    Alight,
    /// Wrap from the last departure-timeline slot to the first one of the
    /// next service day.
    Overnight,
    /// Precomputed footpath between two stations.
    Transfer,
    /// Departure timeline slot -> next slot.
    Wait,
    /// Arrival timeline slot -> next slot.
    WaitArrival,
}

impl EdgeKind {
    /// Accumulates into the per-leg walk budget.
    pub fn is_walk(self) -> bool {
        matches!(self, EdgeKind::Highway)
    }

    /// Accumulates into the per-leg transfer-walk budget.
    pub fn is_transfer_walk(self) -> bool {
        matches!(self, EdgeKind::Transfer)
    }

    /// Crossing this edge starts a new leg for budget purposes.
    pub fn resets_leg(self) -> bool {
        matches!(
            self,
            EdgeKind::EnterPt | EdgeKind::ExitPt | EdgeKind::Board | EdgeKind::Alight
        )
    }

    /// Boarding boundary: increments the transfer count.
    pub fn is_transfer_boundary(self) -> bool {
        matches!(self, EdgeKind::Board)
    }

    /// Time advance depends on the label's current time, not a stored value.
    pub fn is_schedule_bound(self) -> bool {
        matches!(
            self,
            EdgeKind::EnterTimeExpanded
                | EdgeKind::Wait
                | EdgeKind::WaitArrival
                | EdgeKind::Overnight
        )
    }
}

/// What a node represents. Timeline and trip-event nodes carry their
/// schedule anchor so schedule-bound edges can be evaluated without a side
/// lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    /// Walk-network node. Shares its id with `StreetNetwork::nodes`.
    Street,
    /// Canonical station node; stop ids resolve here.
    Stop { stop: u32 },
    /// Station entrance, upstream of the departure timeline.
    StopEnterNode { stop: u32 },
    /// Station exit, downstream of the arrival timeline.
    StopExitNode { stop: u32 },
    /// Departure-timeline slot. `time` is seconds-of-day (0..86400).
    DepTimeline { stop: u32, time: u32 },
    /// Arrival-timeline slot. `time` is seconds-of-day (0..86400).
    ArrTimeline { stop: u32, time: u32 },
    /// A trip's departure event. `time` is relative to the trip's service
    /// day and may exceed 86 400.
    TripDeparture { stop: u32, trip: u32, seq: u16, time: u32 },
    /// A trip's arrival event, same time convention.
    TripArrival { stop: u32, trip: u32, seq: u16, time: u32 },
}

impl NodeKind {
    pub fn stop(&self) -> Option<u32> {
        match *self {
            NodeKind::Street => None,
            NodeKind::Stop { stop }
            | NodeKind::StopEnterNode { stop }
            | NodeKind::StopExitNode { stop }
            | NodeKind::DepTimeline { stop, .. }
            | NodeKind::ArrTimeline { stop, .. }
            | NodeKind::TripDeparture { stop, .. }
            | NodeKind::TripArrival { stop, .. } => Some(stop),
        }
    }

    /// Schedule anchor in seconds-of-day, for timeline slots.
    pub fn timeline_time(&self) -> Option<u32> {
        match *self {
            NodeKind::DepTimeline { time, .. } | NodeKind::ArrTimeline { time, .. } => Some(time),
            _ => None,
        }
    }

    /// Service-day-relative event time, for trip event nodes.
    pub fn event_time(&self) -> Option<u32> {
        match *self {
            NodeKind::TripDeparture { time, .. } | NodeKind::TripArrival { time, .. } => Some(time),
            _ => None,
        }
    }
}

/// The trip event an edge belongs to. `seq` indexes the trip's event list
/// (positional, not the GTFS stop_sequence value).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TripEventRef {
    pub trip: u32,
    pub seq: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    /// Seconds. Fixed durations for Hop/Dwell, the stored walk duration for
    /// virtual access edges, 0 for boundary edges. Schedule-bound kinds
    /// ignore it.
    pub time: u32,
    /// Meters.
    pub distance: u32,
    /// Index into `PtGraph::validity_masks` for Board edges.
    pub validity: Option<u32>,
    /// The trip event behind Board/Hop/Dwell/Alight edges.
    pub trip: Option<TripEventRef>,
    /// Index into the geometry pool for street edges, or `NO_GEOMETRY`.
    pub geometry_id: u32,
}

impl Edge {
    /// A zero-cost wiring edge inside a station column.
    pub fn wiring(from: NodeId, to: NodeId, kind: EdgeKind) -> Edge {
        Edge {
            from,
            to,
            kind,
            time: 0,
            distance: 0,
            validity: None,
            trip: None,
            geometry_id: NO_GEOMETRY,
        }
    }
}

/// The read-only base graph: walk network plus the time-expanded transit
/// network, with forward and reverse adjacency.
#[derive(Clone, Debug, Default)]
pub struct PtGraph {
    pub nodes: Vec<NodeKind>,
    /// (lat, lon) per node. Timeline/trip nodes carry their stop's position.
    pub coords: Vec<(f64, f64)>,
    pub edges: Vec<Edge>,
    pub out_edges: Vec<Vec<EdgeId>>,
    pub in_edges: Vec<Vec<EdgeId>>,
    /// Pool of service-day masks referenced by Board edges.
    pub validity_masks: Vec<ServiceDays>,
    /// Street polyline pool, carried over from the street network.
    pub geometries: Vec<Vec<(f64, f64)>>,
    /// Unix seconds of midnight on service day 0.
    pub base_midnight: i64,
    /// Stop index -> its canonical station node.
    pub stop_nodes: Vec<NodeId>,
}

impl PtGraph {
    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    pub fn edge_count(&self) -> u32 {
        self.edges.len() as u32
    }

    pub fn add_node(&mut self, kind: NodeKind, lat: f64, lon: f64) -> NodeId {
        self.nodes.push(kind);
        self.coords.push((lat, lon));
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        (self.nodes.len() - 1) as NodeId
    }

    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        let id = self.edges.len() as EdgeId;
        self.out_edges[edge.from as usize].push(id);
        self.in_edges[edge.to as usize].push(id);
        self.edges.push(edge);
        id
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id as usize]
    }

    pub fn node(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id as usize]
    }

    pub fn out(&self, node: NodeId) -> &[EdgeId] {
        &self.out_edges[node as usize]
    }

    pub fn incoming(&self, node: NodeId) -> &[EdgeId] {
        &self.in_edges[node as usize]
    }

    /// The station node a stop id resolves to.
    pub fn stop_node(&self, stop: u32) -> Option<NodeId> {
        self.stop_nodes.get(stop as usize).copied()
    }
}

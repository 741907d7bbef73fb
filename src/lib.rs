// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Larkspur: a multimodal journey planner over a static GTFS feed and a
//! pedestrian street network, with optional GTFS-Realtime overlays.
//!
//! Load-time artifacts (timetable, street network, time-expanded graph,
//! snap index) are built once and shared read-only across queries; each
//! query runs a multi-criteria label-setting search over a transient view
//! that splices in virtual endpoints and the current realtime snapshot.

pub mod api;
pub mod error;
pub mod graph;
pub mod graph_builder;
pub mod models;
pub mod realtime;
pub mod router;
pub mod spatial;
pub mod street;

pub use api::{Itinerary, Leg, LegMode, PtRequest, PtResponse, RequestPoint, StopCall};
pub use error::RoutingError;
pub use graph::PtGraph;
pub use graph_builder::{build_graph, GraphBuilderConfig};
pub use models::Timetable;
pub use realtime::{FeedOverlay, OverlayHandle};
pub use router::PtRouter;
pub use spatial::SnapIndex;
pub use street::StreetNetwork;

// Request and response value types.
//
// Serialization of the response to a wire format is the caller's business;
// everything here is plain serde-able data. The hint-map constructor mirrors
// the `pt.*` keys of the upstream API so callers holding a string map can
// build a typed request without knowing the field names.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::RoutingError;

pub const HINT_EARLIEST_DEPARTURE_TIME: &str = "pt.earliest_departure_time";
pub const HINT_ARRIVE_BY: &str = "pt.arrive_by";
pub const HINT_PROFILE_QUERY: &str = "pt.profile_query";
pub const HINT_IGNORE_TRANSFERS: &str = "pt.ignore_transfers";
pub const HINT_LIMIT_SOLUTIONS: &str = "pt.limit_solutions";
pub const HINT_WALK_SPEED: &str = "pt.walk_speed";
pub const HINT_MAX_WALK_DISTANCE_PER_LEG: &str = "pt.max_walk_distance_per_leg";
pub const HINT_MAX_TRANSFER_DISTANCE_PER_LEG: &str = "pt.max_transfer_distance_per_leg";

/// An endpoint of the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestPoint {
    Coordinate { lat: f64, lon: f64 },
    Station { stop_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtRequest {
    /// Exactly two points: origin, destination.
    pub points: Vec<RequestPoint>,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// RFC 3339 anchor instant. Interpreted as the latest arrival when
    /// `arrive_by` is set. Required; validated before any search runs.
    pub earliest_departure_time: String,
    #[serde(default)]
    pub arrive_by: bool,
    #[serde(default)]
    pub profile_query: bool,
    #[serde(default)]
    pub ignore_transfers: bool,
    /// Cap on emitted solutions. Defaults to 5 under `profile_query`, 1
    /// under `ignore_transfers`, unbounded otherwise.
    #[serde(default)]
    pub limit_solutions: Option<usize>,
    /// Pedestrian speed in km/h.
    #[serde(default = "default_walk_speed")]
    pub walk_speed: f64,
    /// Per-leg walk budget in meters.
    #[serde(default)]
    pub max_walk_distance_per_leg: Option<f64>,
    /// Per-leg transfer-walk budget in meters.
    #[serde(default)]
    pub max_transfer_distance_per_leg: Option<f64>,
    /// Visit budget; the search returns best-so-far when it runs out.
    #[serde(default)]
    pub max_visited_nodes: Option<usize>,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_walk_speed() -> f64 {
    5.0
}

impl PtRequest {
    pub fn new(origin: RequestPoint, destination: RequestPoint, departure: &str) -> PtRequest {
        PtRequest {
            points: vec![origin, destination],
            locale: default_locale(),
            earliest_departure_time: departure.to_string(),
            arrive_by: false,
            profile_query: false,
            ignore_transfers: false,
            limit_solutions: None,
            walk_speed: default_walk_speed(),
            max_walk_distance_per_leg: None,
            max_transfer_distance_per_leg: None,
            max_visited_nodes: None,
        }
    }

    /// Builds a request from the `pt.*` hint map of the upstream API.
    pub fn from_hints(
        points: Vec<RequestPoint>,
        locale: &str,
        hints: &AHashMap<String, String>,
    ) -> Result<PtRequest, RoutingError> {
        let departure = hints.get(HINT_EARLIEST_DEPARTURE_TIME).ok_or_else(|| {
            RoutingError::InvalidArgument(format!(
                "missing required parameter {}",
                HINT_EARLIEST_DEPARTURE_TIME
            ))
        })?;

        Ok(PtRequest {
            points,
            locale: locale.to_string(),
            earliest_departure_time: departure.clone(),
            arrive_by: parse_hint(hints, HINT_ARRIVE_BY)?.unwrap_or(false),
            profile_query: parse_hint(hints, HINT_PROFILE_QUERY)?.unwrap_or(false),
            ignore_transfers: parse_hint(hints, HINT_IGNORE_TRANSFERS)?.unwrap_or(false),
            limit_solutions: parse_hint(hints, HINT_LIMIT_SOLUTIONS)?,
            walk_speed: parse_hint(hints, HINT_WALK_SPEED)?.unwrap_or_else(default_walk_speed),
            max_walk_distance_per_leg: parse_hint(hints, HINT_MAX_WALK_DISTANCE_PER_LEG)?,
            max_transfer_distance_per_leg: parse_hint(hints, HINT_MAX_TRANSFER_DISTANCE_PER_LEG)?,
            max_visited_nodes: None,
        })
    }

    /// The effective solution cap.
    pub fn solution_limit(&self) -> usize {
        match self.limit_solutions {
            Some(limit) => limit,
            None if self.profile_query => 5,
            None if self.ignore_transfers => 1,
            None => usize::MAX,
        }
    }
}

fn parse_hint<T: std::str::FromStr>(
    hints: &AHashMap<String, String>,
    key: &str,
) -> Result<Option<T>, RoutingError> {
    match hints.get(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            RoutingError::InvalidArgument(format!("illegal value for parameter {}: [{}]", key, raw))
        }),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LegMode {
    Walk,
    Transit,
    Transfer,
}

/// One scheduled call within a ride leg, with overlay-adjusted times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopCall {
    pub stop_id: CompactString,
    pub stop_name: String,
    pub scheduled_arrival: Option<DateTime<Utc>>,
    pub realized_arrival: Option<DateTime<Utc>>,
    pub scheduled_departure: Option<DateTime<Utc>>,
    pub realized_departure: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub mode: LegMode,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub distance_meters: u32,
    pub start_stop_id: Option<CompactString>,
    pub start_stop_name: Option<String>,
    pub end_stop_id: Option<CompactString>,
    pub end_stop_name: Option<String>,
    pub route_id: Option<CompactString>,
    pub trip_id: Option<CompactString>,
    pub trip_headsign: Option<String>,
    /// Every call of the ride including boarding and alighting.
    pub stop_calls: Vec<StopCall>,
    /// (lat, lon) polyline.
    pub geometry: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Itinerary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub distance_meters: u32,
    pub transfers: u32,
    pub legs: Vec<Leg>,
    pub geometry: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PtResponse {
    /// Sorted by ascending total travel time.
    pub itineraries: Vec<Itinerary>,
    /// Debug hints: timings, visited-node counters, no_path marker.
    pub hints: serde_json::Map<String, serde_json::Value>,
}

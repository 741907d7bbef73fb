// The realtime overlay.
//
// A FeedOverlay is an immutable snapshot distilled from one GTFS-Realtime
// FeedMessage: cancelled trip instances, per-event delays (propagated
// forward along the trip, per GTFS-RT semantics), skipped stop
// events, and extra edges to splice into the graph. Updates never mutate a
// published snapshot; `OverlayHandle::publish` swaps the Arc and in-flight
// queries keep whatever they captured.

use ahash::{AHashMap, AHashSet};
use chrono::NaiveDate;
use prost::Message;
use std::sync::{Arc, RwLock};

use crate::graph::{Edge, EdgeId, NodeId, PtGraph};
use crate::models::Timetable;

// GTFS-RT enum values, compared raw like the rest of the pipeline does.
const TRIP_ADDED: i32 = 1;
const TRIP_CANCELED: i32 = 3;
const STOP_TIME_SKIPPED: i32 = 1;

/// Realized-minus-scheduled seconds for one trip event.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StopDelay {
    pub arrival: i32,
    pub departure: i32,
}

#[derive(Clone, Debug, Default)]
pub struct FeedOverlay {
    /// (trip index, service day) instances suppressed by the feed.
    pub cancelled: AHashSet<(u32, u32)>,
    /// (trip index, positional event seq) -> delay.
    pub delays: AHashMap<(u32, u16), StopDelay>,
    /// Events the vehicle will not serve at all.
    pub skipped: AHashSet<(u32, u16)>,
    /// Extra edges spliced in at query time. Ids start at the base graph's
    /// edge count, in vector order.
    pub extra: Vec<Edge>,
    pub extra_by_from: AHashMap<NodeId, Vec<u32>>,
    pub extra_by_to: AHashMap<NodeId, Vec<u32>>,
    /// Feed header timestamp, when present.
    pub feed_timestamp: Option<u64>,
}

impl FeedOverlay {
    pub fn empty() -> FeedOverlay {
        FeedOverlay::default()
    }

    pub fn is_cancelled(&self, trip: u32, day: u32) -> bool {
        self.cancelled.contains(&(trip, day))
    }

    pub fn is_skipped(&self, trip: u32, seq: u16) -> bool {
        self.skipped.contains(&(trip, seq))
    }

    pub fn delay_at(&self, trip: u32, seq: u16) -> StopDelay {
        self.delays.get(&(trip, seq)).copied().unwrap_or_default()
    }

    /// Appends an extra edge; returns its position (the query-time id is
    /// `graph.edge_count() + position`).
    pub fn push_extra_edge(&mut self, edge: Edge) -> u32 {
        let idx = self.extra.len() as u32;
        self.extra_by_from.entry(edge.from).or_default().push(idx);
        self.extra_by_to.entry(edge.to).or_default().push(idx);
        self.extra.push(edge);
        idx
    }

    pub fn extra_edge(&self, graph: &PtGraph, id: EdgeId) -> Option<&Edge> {
        self.extra.get((id - graph.edge_count()) as usize)
    }

    /// Decodes a serialized FeedMessage and distills it.
    pub fn from_bytes(bytes: &[u8], timetable: &Timetable) -> Result<FeedOverlay, prost::DecodeError> {
        let message = gtfs_realtime::FeedMessage::decode(bytes)?;
        Ok(FeedOverlay::from_feed(&message, timetable))
    }

    /// Distills a FeedMessage into an overlay. Entities referencing unknown
    /// trips are logged and skipped; added trips are not materialized.
    pub fn from_feed(message: &gtfs_realtime::FeedMessage, timetable: &Timetable) -> FeedOverlay {
        let mut overlay = FeedOverlay {
            feed_timestamp: message.header.timestamp,
            ..FeedOverlay::default()
        };

        for entity in &message.entity {
            if entity.is_deleted() {
                continue;
            }
            let Some(trip_update) = &entity.trip_update else {
                continue;
            };
            let descriptor = &trip_update.trip;
            let Some(trip_id) = descriptor.trip_id.as_deref() else {
                continue;
            };
            let Some(trip_idx) = timetable.trip_idx(trip_id) else {
                log::debug!("trip update {} references unknown trip {}", entity.id, trip_id);
                continue;
            };

            if descriptor.schedule_relationship == Some(TRIP_ADDED) {
                log::warn!("added trip {} not materialized into extra edges", trip_id);
                continue;
            }

            let start_day = descriptor
                .start_date
                .as_deref()
                .and_then(parse_service_date)
                .and_then(|date| timetable.day_of(date));

            if descriptor.schedule_relationship == Some(TRIP_CANCELED) {
                match start_day {
                    Some(day) => {
                        overlay.cancelled.insert((trip_idx, day));
                    }
                    None => {
                        // No usable start date: suppress the trip on every
                        // day of the horizon.
                        log::debug!("cancelling trip {} without start date", trip_id);
                        for day in 0..timetable.horizon_days {
                            overlay.cancelled.insert((trip_idx, day));
                        }
                    }
                }
                continue;
            }

            overlay.apply_delays(trip_idx, trip_update, timetable, start_day);
        }

        log::info!(
            "overlay: {} cancelled instances, {} delayed events, {} skipped events",
            overlay.cancelled.len(),
            overlay.delays.len(),
            overlay.skipped.len()
        );
        overlay
    }

    fn apply_delays(
        &mut self,
        trip_idx: u32,
        trip_update: &gtfs_realtime::TripUpdate,
        timetable: &Timetable,
        start_day: Option<u32>,
    ) {
        let trip = &timetable.trips[trip_idx as usize];
        let base_midnight = timetable.base_midnight();

        // Updates keyed by GTFS stop_sequence; resolve to positional seq.
        let mut updates: AHashMap<u16, &gtfs_realtime::trip_update::StopTimeUpdate> =
            AHashMap::new();
        for update in &trip_update.stop_time_update {
            let position = match update.stop_sequence {
                Some(seq) => trip.events.iter().position(|e| e.seq as u32 == seq),
                None => update.stop_id.as_deref().and_then(|stop_id| {
                    let stop_idx = timetable.stop_idx(stop_id)?;
                    trip.events.iter().position(|e| e.stop == stop_idx)
                }),
            };
            match position {
                Some(position) => {
                    updates.insert(position as u16, update);
                }
                None => log::debug!(
                    "stop time update for trip {} matches no scheduled event",
                    trip.id
                ),
            }
        }

        // Walk the schedule in order, carrying the last known delay forward
        // until a later update overrides it.
        let mut current = trip_update.delay.map(|delay| StopDelay {
            arrival: delay,
            departure: delay,
        });
        for (position, event) in trip.events.iter().enumerate() {
            let position = position as u16;
            if let Some(update) = updates.get(&position) {
                if update.schedule_relationship == Some(STOP_TIME_SKIPPED) {
                    self.skipped.insert((trip_idx, position));
                    continue;
                }
                let arrival_delay = update
                    .arrival
                    .as_ref()
                    .and_then(|ev| resolve_delay(ev, start_day, base_midnight, event.arrival));
                let departure_delay = update
                    .departure
                    .as_ref()
                    .and_then(|ev| resolve_delay(ev, start_day, base_midnight, event.departure));
                let carried = current.unwrap_or_default();
                let arrival = arrival_delay.unwrap_or(carried.arrival);
                let departure = departure_delay.unwrap_or(arrival);
                current = Some(StopDelay { arrival, departure });
            }
            if let Some(delay) = current {
                if delay != StopDelay::default() {
                    self.delays.insert((trip_idx, position), delay);
                }
            }
        }
    }
}

/// A delay from a StopTimeEvent: the explicit delay field, or the realized
/// absolute time minus the scheduled instant when the service day is known.
fn resolve_delay(
    event: &gtfs_realtime::trip_update::StopTimeEvent,
    start_day: Option<u32>,
    base_midnight: i64,
    scheduled_rel: u32,
) -> Option<i32> {
    if let Some(delay) = event.delay {
        return Some(delay);
    }
    let (time, day) = (event.time?, start_day?);
    let scheduled = base_midnight + day as i64 * 86_400 + scheduled_rel as i64;
    Some((time - scheduled) as i32)
}

fn parse_service_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
}

/// Shared holder for the current snapshot. Queries capture the Arc once on
/// entry and never revalidate.
#[derive(Debug, Default)]
pub struct OverlayHandle {
    current: RwLock<Arc<FeedOverlay>>,
}

impl OverlayHandle {
    pub fn new(overlay: FeedOverlay) -> OverlayHandle {
        OverlayHandle {
            current: RwLock::new(Arc::new(overlay)),
        }
    }

    pub fn publish(&self, overlay: FeedOverlay) {
        *self.current.write().unwrap() = Arc::new(overlay);
    }

    pub fn snapshot(&self) -> Arc<FeedOverlay> {
        self.current.read().unwrap().clone()
    }
}

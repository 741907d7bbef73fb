// The edge cost model.
//
// For every edge kind this fixes how crossing it advances time, which walk
// budget it feeds, and whether it boards a vehicle. Fixed-duration kinds
// read the stored edge time; schedule-bound kinds align the label's clock
// to the target slot's seconds-of-day. Board edges are additionally gated
// by the trip's service-day mask and the realtime overlay.
//
// Delays enter the arithmetic clamped to zero (a vehicle never leaves
// early here) so the day-alignment invariant survives; reconstruction
// reports the true signed delays.

use crate::graph::{Edge, EdgeKind, PtGraph};
use crate::models::SECONDS_PER_DAY;
use crate::realtime::FeedOverlay;

/// What crossing one edge costs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EdgeCost {
    pub seconds: i64,
    /// Contribution to the per-leg walk budget.
    pub walk_meters: u32,
    /// Contribution to the per-leg transfer-walk budget.
    pub transfer_meters: u32,
    /// 1 on Board edges.
    pub boards: u8,
}

#[derive(Clone, Copy, Debug)]
pub struct Weighting {
    walk_speed_mps: f64,
}

impl Weighting {
    /// Walk speed comes in km/h from the request; zero or negative speeds
    /// fall back to the default.
    pub fn new(walk_speed_kmh: f64) -> Weighting {
        let kmh = if walk_speed_kmh > 0.0 { walk_speed_kmh } else { 5.0 };
        Weighting {
            walk_speed_mps: kmh / 3.6,
        }
    }

    pub fn walk_seconds(&self, meters: u32) -> i64 {
        (meters as f64 / self.walk_speed_mps).ceil() as i64
    }

    /// Cost of crossing `edge` when the label sits at the tail (head under
    /// `reverse`) at absolute unix second `now`. `None` means the edge is
    /// not traversable: invalid service day, cancelled or skipped instance.
    pub fn evaluate(
        &self,
        graph: &PtGraph,
        overlay: &FeedOverlay,
        edge: &Edge,
        now: i64,
        reverse: bool,
    ) -> Option<EdgeCost> {
        match edge.kind {
            EdgeKind::Highway => Some(EdgeCost {
                seconds: self.walk_seconds(edge.distance),
                walk_meters: edge.distance,
                ..EdgeCost::default()
            }),
            EdgeKind::Transfer => Some(EdgeCost {
                seconds: self.walk_seconds(edge.distance),
                transfer_meters: edge.distance,
                ..EdgeCost::default()
            }),
            // The station <-> street stitch is an ordinary short walk.
            EdgeKind::StopMarker => Some(EdgeCost {
                seconds: self.walk_seconds(edge.distance),
                walk_meters: edge.distance,
                ..EdgeCost::default()
            }),
            // Fixed-duration boundary and wiring edges. Base edges store 0;
            // virtual access edges store their reconstructed walk time.
            EdgeKind::EnterPt
            | EdgeKind::ExitPt
            | EdgeKind::StopEnter
            | EdgeKind::StopExit => Some(EdgeCost {
                seconds: edge.time as i64,
                ..EdgeCost::default()
            }),
            EdgeKind::EnterTimeExpanded => {
                if reverse {
                    // Leaving the timeline backwards costs nothing: the
                    // label could have entered exactly at its slot.
                    Some(EdgeCost::default())
                } else {
                    let slot = graph.node(edge.to).timeline_time()?;
                    Some(EdgeCost {
                        seconds: wait_until(now, graph.base_midnight, slot),
                        ..EdgeCost::default()
                    })
                }
            }
            EdgeKind::LeaveTimeExpanded => {
                if reverse {
                    let slot = graph.node(edge.from).timeline_time()?;
                    Some(EdgeCost {
                        seconds: wait_since(now, graph.base_midnight, slot),
                        ..EdgeCost::default()
                    })
                } else {
                    Some(EdgeCost::default())
                }
            }
            EdgeKind::Wait | EdgeKind::WaitArrival | EdgeKind::Overnight => {
                let seconds = if reverse {
                    let slot = graph.node(edge.from).timeline_time()?;
                    wait_since(now, graph.base_midnight, slot)
                } else {
                    let slot = graph.node(edge.to).timeline_time()?;
                    wait_until(now, graph.base_midnight, slot)
                };
                Some(EdgeCost {
                    seconds,
                    ..EdgeCost::default()
                })
            }
            EdgeKind::Board => {
                let reference = edge.trip?;
                if overlay.is_skipped(reference.trip, reference.seq) {
                    return None;
                }
                let departure_rel = graph.node(edge.to).event_time()?;
                // Reverse searches run on the scheduled timetable: the
                // arrival timeline anchors to scheduled slots, so delay
                // offsets would break the day alignment going backward.
                // Cancellations and skips still apply.
                let delay = if reverse {
                    0
                } else {
                    effective_delay(overlay.delay_at(reference.trip, reference.seq).departure)
                };
                let day = service_day(graph.base_midnight, now, departure_rel)?;
                let mask = graph.validity_masks.get(edge.validity? as usize)?;
                if !mask.is_set(day) || overlay.is_cancelled(reference.trip, day) {
                    return None;
                }
                Some(EdgeCost {
                    seconds: delay,
                    boards: 1,
                    ..EdgeCost::default()
                })
            }
            EdgeKind::Hop => {
                let reference = edge.trip?;
                let departure_rel = graph.node(edge.from).event_time()?;
                let arrival_rel = graph.node(edge.to).event_time()?;
                let (dep_delay, arr_delay) = if reverse {
                    (0, 0)
                } else {
                    (
                        effective_delay(overlay.delay_at(reference.trip, reference.seq).departure),
                        effective_delay(overlay.delay_at(reference.trip, reference.seq + 1).arrival),
                    )
                };
                let anchor = if reverse { now } else { now - dep_delay };
                let anchor_rel = if reverse { arrival_rel } else { departure_rel };
                let day = service_day(graph.base_midnight, anchor, anchor_rel)?;
                if overlay.is_cancelled(reference.trip, day) {
                    return None;
                }
                let scheduled = arrival_rel as i64 - departure_rel as i64;
                Some(EdgeCost {
                    seconds: (scheduled + arr_delay - dep_delay).max(0),
                    ..EdgeCost::default()
                })
            }
            EdgeKind::Dwell => {
                let reference = edge.trip?;
                let arrival_rel = graph.node(edge.from).event_time()?;
                let departure_rel = graph.node(edge.to).event_time()?;
                let (arr_delay, dep_delay) = if reverse {
                    (0, 0)
                } else {
                    let delays = overlay.delay_at(reference.trip, reference.seq);
                    (
                        effective_delay(delays.arrival),
                        effective_delay(delays.departure),
                    )
                };
                let anchor = if reverse { now } else { now - arr_delay };
                let anchor_rel = if reverse { departure_rel } else { arrival_rel };
                let day = service_day(graph.base_midnight, anchor, anchor_rel)?;
                if overlay.is_cancelled(reference.trip, day) {
                    return None;
                }
                let scheduled = departure_rel as i64 - arrival_rel as i64;
                Some(EdgeCost {
                    seconds: (scheduled + dep_delay - arr_delay).max(0),
                    ..EdgeCost::default()
                })
            }
            EdgeKind::Alight => {
                let reference = edge.trip?;
                if overlay.is_skipped(reference.trip, reference.seq) {
                    return None;
                }
                Some(EdgeCost::default())
            }
        }
    }
}

pub fn effective_delay(delay: i32) -> i64 {
    delay.max(0) as i64
}

/// Seconds-of-day of an absolute instant.
fn seconds_of_day(base_midnight: i64, now: i64) -> i64 {
    (now - base_midnight).rem_euclid(SECONDS_PER_DAY as i64)
}

/// Forward wait from `now` to the next occurrence of `slot` seconds-of-day.
/// Zero when already aligned.
fn wait_until(now: i64, base_midnight: i64, slot: u32) -> i64 {
    (slot as i64 - seconds_of_day(base_midnight, now)).rem_euclid(SECONDS_PER_DAY as i64)
}

/// Backward wait from `now` to the previous occurrence of `slot`.
fn wait_since(now: i64, base_midnight: i64, slot: u32) -> i64 {
    (seconds_of_day(base_midnight, now) - slot as i64).rem_euclid(SECONDS_PER_DAY as i64)
}

/// The service day on which an event with relative time `event_rel` happens
/// at absolute instant `at`. `None` when the instant does not align with
/// any day's occurrence of the event, or predates day zero.
fn service_day(base_midnight: i64, at: i64, event_rel: u32) -> Option<u32> {
    let since_base = at - base_midnight;
    if since_base < event_rel as i64 {
        return None;
    }
    let offset = since_base - event_rel as i64;
    if offset % SECONDS_PER_DAY as i64 != 0 {
        return None;
    }
    Some((offset / SECONDS_PER_DAY as i64) as u32)
}

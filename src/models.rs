// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

// In-memory timetable tables.
//
// The GTFS zip has already been parsed by `gtfs_structures` upstream; this
// module flattens the parts the router needs into contiguous indexed tables
// and resolves calendars into per-service day masks over the feed horizon.
// Everything here is read-only after construction.

use ahash::AHashMap;
use chrono::{Datelike, NaiveDate};
use compact_str::CompactString;

use crate::error::RoutingError;

pub const SECONDS_PER_DAY: u32 = 86_400;

/// Which days (0..horizon, relative to the base date) a service runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceDays {
    bits: Vec<u64>,
}

impl ServiceDays {
    pub fn with_capacity(days: u32) -> Self {
        ServiceDays {
            bits: vec![0; (days as usize + 63) / 64],
        }
    }

    pub fn set(&mut self, day: u32) {
        let word = day as usize / 64;
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        self.bits[word] |= 1 << (day % 64);
    }

    pub fn clear(&mut self, day: u32) {
        let word = day as usize / 64;
        if word < self.bits.len() {
            self.bits[word] &= !(1 << (day % 64));
        }
    }

    pub fn is_set(&self, day: u32) -> bool {
        let word = day as usize / 64;
        word < self.bits.len() && self.bits[word] & (1 << (day % 64)) != 0
    }

    /// Service that runs on every day of the horizon.
    pub fn always(days: u32) -> Self {
        let mut mask = ServiceDays::with_capacity(days);
        for d in 0..days {
            mask.set(d);
        }
        mask
    }
}

#[derive(Clone, Debug)]
pub struct StopRecord {
    pub id: CompactString,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug)]
pub struct RouteRecord {
    pub id: CompactString,
    pub short_name: String,
    pub long_name: String,
}

/// One scheduled call of a trip at a stop. Times are seconds relative to
/// the trip's service-day midnight and may exceed 86 400 for overnight runs.
#[derive(Clone, Copy, Debug)]
pub struct StopEvent {
    pub stop: u32,
    pub arrival: u32,
    pub departure: u32,
    pub seq: u16,
}

#[derive(Clone, Debug)]
pub struct TripRecord {
    pub id: CompactString,
    pub route: u32,
    pub headsign: String,
    /// Index into `Timetable::services`.
    pub service: u32,
    /// Calls ordered by stop_sequence.
    pub events: Vec<StopEvent>,
}

/// The flattened static feed.
#[derive(Clone, Debug)]
pub struct Timetable {
    /// Service day 0. All validity masks and relative times anchor here.
    pub base_date: NaiveDate,
    pub horizon_days: u32,
    pub stops: Vec<StopRecord>,
    pub stop_index: AHashMap<CompactString, u32>,
    pub routes: Vec<RouteRecord>,
    pub trips: Vec<TripRecord>,
    pub trip_index: AHashMap<CompactString, u32>,
    pub services: Vec<ServiceDays>,
}

impl Timetable {
    pub fn empty(base_date: NaiveDate, horizon_days: u32) -> Self {
        Timetable {
            base_date,
            horizon_days,
            stops: Vec::new(),
            stop_index: AHashMap::new(),
            routes: Vec::new(),
            trips: Vec::new(),
            trip_index: AHashMap::new(),
            services: Vec::new(),
        }
    }

    /// Unix seconds of midnight UTC on the base date.
    pub fn base_midnight(&self) -> i64 {
        self.base_date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0)
    }

    pub fn stop_idx(&self, id: &str) -> Option<u32> {
        self.stop_index.get(id).copied()
    }

    pub fn trip_idx(&self, id: &str) -> Option<u32> {
        self.trip_index.get(id).copied()
    }

    /// Day index of a calendar date relative to the base date, if within
    /// the horizon.
    pub fn day_of(&self, date: NaiveDate) -> Option<u32> {
        let offset = (date - self.base_date).num_days();
        if offset >= 0 && (offset as u32) < self.horizon_days {
            Some(offset as u32)
        } else {
            None
        }
    }

    /// Flattens a parsed GTFS feed into indexed tables.
    ///
    /// Trips whose stop times are incomplete (missing arrival or departure)
    /// are dropped with a log line rather than failing the whole feed.
    pub fn from_gtfs(
        feed: &gtfs_structures::Gtfs,
        base_date: NaiveDate,
        horizon_days: u32,
    ) -> Result<Timetable, RoutingError> {
        let mut timetable = Timetable::empty(base_date, horizon_days);

        let mut stop_ids: Vec<&String> = feed.stops.keys().collect();
        stop_ids.sort();
        for stop_id in stop_ids {
            let stop = &feed.stops[stop_id];
            let (lat, lon) = match (stop.latitude, stop.longitude) {
                (Some(lat), Some(lon)) => (lat, lon),
                _ => {
                    log::warn!("stop {} has no coordinates, skipping", stop_id);
                    continue;
                }
            };
            let idx = timetable.stops.len() as u32;
            timetable.stops.push(StopRecord {
                id: CompactString::from(stop_id.as_str()),
                name: stop.name.clone().unwrap_or_default(),
                lat,
                lon,
            });
            timetable
                .stop_index
                .insert(CompactString::from(stop_id.as_str()), idx);
        }

        let mut route_ids: Vec<&String> = feed.routes.keys().collect();
        route_ids.sort();
        let mut route_lookup: AHashMap<&str, u32> = AHashMap::new();
        for route_id in route_ids {
            let route = &feed.routes[route_id];
            route_lookup.insert(route_id.as_str(), timetable.routes.len() as u32);
            timetable.routes.push(RouteRecord {
                id: CompactString::from(route_id.as_str()),
                short_name: route.short_name.clone().unwrap_or_default(),
                long_name: route.long_name.clone().unwrap_or_default(),
            });
        }

        let mut service_lookup: AHashMap<&str, u32> = AHashMap::new();
        let mut trip_ids: Vec<&String> = feed.trips.keys().collect();
        trip_ids.sort();
        for trip_id in trip_ids {
            let trip = &feed.trips[trip_id];
            let Some(&route) = route_lookup.get(trip.route_id.as_str()) else {
                log::warn!(
                    "trip {} references unknown route {}",
                    trip_id,
                    trip.route_id
                );
                continue;
            };

            let service = match service_lookup.get(trip.service_id.as_str()) {
                Some(&idx) => idx,
                None => {
                    let mask =
                        resolve_service_mask(feed, &trip.service_id, base_date, horizon_days);
                    let idx = timetable.services.len() as u32;
                    timetable.services.push(mask);
                    service_lookup.insert(trip.service_id.as_str(), idx);
                    idx
                }
            };

            let mut events = Vec::with_capacity(trip.stop_times.len());
            let mut complete = true;
            for st in &trip.stop_times {
                let (Some(arrival), Some(departure)) = (st.arrival_time, st.departure_time) else {
                    complete = false;
                    break;
                };
                let Some(&stop) = timetable.stop_index.get(st.stop.id.as_str()) else {
                    complete = false;
                    break;
                };
                events.push(StopEvent {
                    stop,
                    arrival,
                    departure,
                    seq: st.stop_sequence,
                });
            }
            if !complete || events.len() < 2 {
                log::debug!("dropping trip {} with incomplete stop times", trip_id);
                continue;
            }
            events.sort_by_key(|e| e.seq);

            let idx = timetable.trips.len() as u32;
            timetable.trips.push(TripRecord {
                id: CompactString::from(trip_id.as_str()),
                route,
                headsign: trip.trip_headsign.clone().unwrap_or_default(),
                service,
                events,
            });
            timetable
                .trip_index
                .insert(CompactString::from(trip_id.as_str()), idx);
        }

        if timetable.stops.is_empty() {
            return Err(RoutingError::InvalidArgument(
                "feed contains no usable stops".to_string(),
            ));
        }
        log::info!(
            "timetable: {} stops, {} routes, {} trips, {} services over {} days",
            timetable.stops.len(),
            timetable.routes.len(),
            timetable.trips.len(),
            timetable.services.len(),
            horizon_days
        );
        Ok(timetable)
    }
}

fn resolve_service_mask(
    feed: &gtfs_structures::Gtfs,
    service_id: &str,
    base_date: NaiveDate,
    horizon_days: u32,
) -> ServiceDays {
    let mut mask = ServiceDays::with_capacity(horizon_days);

    if let Some(calendar) = feed.calendar.get(service_id) {
        for day in 0..horizon_days {
            let date = base_date + chrono::Days::new(day as u64);
            if date < calendar.start_date || date > calendar.end_date {
                continue;
            }
            let runs = match date.weekday() {
                chrono::Weekday::Mon => calendar.monday,
                chrono::Weekday::Tue => calendar.tuesday,
                chrono::Weekday::Wed => calendar.wednesday,
                chrono::Weekday::Thu => calendar.thursday,
                chrono::Weekday::Fri => calendar.friday,
                chrono::Weekday::Sat => calendar.saturday,
                chrono::Weekday::Sun => calendar.sunday,
            };
            if runs {
                mask.set(day);
            }
        }
    }

    if let Some(exceptions) = feed.calendar_dates.get(service_id) {
        for exception in exceptions {
            let offset = (exception.date - base_date).num_days();
            if offset < 0 || offset as u32 >= horizon_days {
                continue;
            }
            match exception.exception_type {
                gtfs_structures::Exception::Added => mask.set(offset as u32),
                gtfs_structures::Exception::Deleted => mask.clear(offset as u32),
            }
        }
    }

    mask
}

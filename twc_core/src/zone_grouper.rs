//! Partitions pickup events into one schedule per zone.

use std::collections::BTreeMap;

use tracing::warn;

use crate::pickup::{PickupEvent, Zone, ZoneSchedule};

/// Zone schedules in zone order, plus the events that were dropped as repeated dates.
#[derive(Debug, Default, PartialEq)]
pub struct Grouping {
    pub schedules: BTreeMap<Zone, ZoneSchedule>,
    pub duplicates: Vec<PickupEvent>,
}

/// Group events by zone and sort each zone by date.
///
/// When a zone has more than one event on a date, the first one seen is kept.
pub fn group<I: IntoIterator<Item = PickupEvent>>(events: I) -> Grouping {
    let by_zone = events.into_iter().fold(
        BTreeMap::<Zone, Vec<PickupEvent>>::new(),
        |mut by_zone, event| {
            by_zone.entry(event.zone.clone()).or_default().push(event);
            by_zone
        },
    );
    by_zone
        .into_iter()
        .fold(Grouping::default(), |mut grouping, (zone, mut events)| {
            // stable, so equal dates keep their input order
            events.sort_by_key(|event| event.date);
            let mut kept: Vec<PickupEvent> = Vec::with_capacity(events.len());
            for event in events {
                if kept.last().is_some_and(|last| last.date == event.date) {
                    warn!("dropping repeated pickup for {} on {}", zone, event.date);
                    grouping.duplicates.push(event);
                } else {
                    kept.push(event);
                }
            }
            let schedule = ZoneSchedule {
                zone: zone.clone(),
                events: kept,
            };
            grouping.schedules.insert(zone, schedule);
            grouping
        })
}

//! Renders a zone schedule as an iCalendar document with one all-day event per pickup.

use chrono::NaiveDate;
use ical::{
    generator::{
        Emitter, IcalCalendar, IcalCalendarBuilder, IcalEvent, IcalEventBuilder, Property,
    },
    ical_param, ical_property,
};

use crate::{
    conversion::RenderOptions,
    error::SerializationError,
    pickup::{PickupEvent, Zone, ZoneSchedule},
};

static PROD_ID: [&str; 3] = ["twc", "Waste Pickup Calendar", "EN"];
static TIMEZONE: &str = "America/Toronto";
static FORMAT: &str = "%Y%m%d";
static UID_DOMAIN: &str = "twc";

/// Render the schedule as an iCalendar document.
///
/// The output only depends on the schedule and the options, so unchanged input
/// yields byte-identical calendars. Lines end in CRLF, folded lines included.
pub fn serialize(
    schedule: &ZoneSchedule,
    options: &RenderOptions,
) -> Result<Vec<u8>, SerializationError> {
    let document = get_calendar(schedule, options)?.generate();
    Ok(crlf(&document).into_bytes())
}

/// The generator ends lines with a bare LF.
fn crlf(document: &str) -> String {
    document.replace("\r\n", "\n").replace('\n', "\r\n")
}

/// Build the calendar of a single zone.
pub fn get_calendar(
    schedule: &ZoneSchedule,
    options: &RenderOptions,
) -> Result<IcalCalendar, SerializationError> {
    let mut calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(prod_id())
        .build();
    calendar
        .properties
        .push(ical_property!("METHOD", "PUBLISH"));
    calendar.properties.push(ical_property!(
        "X-WR-CALNAME",
        escape_text(&format!("{} Waste Pickup", schedule.zone))
    ));
    calendar
        .properties
        .push(ical_property!("X-WR-TIMEZONE", TIMEZONE));

    let mut previous: Option<NaiveDate> = None;
    for pickup in &schedule.events {
        if pickup.zone != schedule.zone {
            return Err(SerializationError::ForeignEvent {
                zone: schedule.zone.clone(),
                date: pickup.date,
                found: pickup.zone.clone(),
            });
        }
        if previous.is_some_and(|previous| previous >= pickup.date) {
            return Err(SerializationError::Unordered {
                zone: schedule.zone.clone(),
                date: pickup.date,
            });
        }
        previous = Some(pickup.date);
        calendar.events.push(get_event(pickup, options)?);
    }
    Ok(calendar)
}

/// Build the all-day event of a single pickup.
fn get_event(
    pickup: &PickupEvent,
    options: &RenderOptions,
) -> Result<IcalEvent, SerializationError> {
    let end = pickup
        .date
        .succ_opt()
        .ok_or_else(|| SerializationError::DateOutOfRange {
            zone: pickup.zone.clone(),
            date: pickup.date,
        })?;
    let start = pickup.date.format(FORMAT).to_string();
    // never the wall clock
    let stamp = format!("{start}T000000Z");
    Ok(IcalEventBuilder::tzid(TIMEZONE)
        .uid(uid(&pickup.zone, pickup.date))
        .changed_utc(stamp)
        .start_day(start)
        .end_day(end.format(FORMAT).to_string())
        .set(ical_property!(
            "SUMMARY",
            escape_text(&pickup.subject(options.emoji))
        ))
        .set(ical_property!(
            "DESCRIPTION",
            escape_text(&pickup.description())
        ))
        .set(ical_property!(
            "URL",
            pickup.streams.info_url(),
            ical_param!("VALUE", "URI")
        ))
        .set(ical_property!("TRANSP", "TRANSPARENT"))
        .build())
}

fn prod_id() -> String {
    let mut strings: Vec<&str> = Vec::from(PROD_ID);
    strings.insert(0, "-");
    strings.join("//")
}

/// Get a unique id for the pickup of a zone on a date.
///
/// Changing this function is a breaking change! Calendar applications use the id to
/// recognize re-imported events.
fn uid(zone: &Zone, date: NaiveDate) -> String {
    format!("{}{zone}@{UID_DOMAIN}", date.format(FORMAT))
}

/// Escape a TEXT value (RFC 5545, section 3.3.11).
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    escaped.push_str("\\n");
                }
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufReader, Cursor},
        str::FromStr,
    };

    use chrono::NaiveDate;
    use ical::IcalParser;

    use super::*;
    use crate::pickup::StreamSet;

    fn get_test_schedule() -> ZoneSchedule {
        let zone = Zone::parse("Tuesday 1").unwrap();
        ZoneSchedule {
            zone: zone.clone(),
            events: vec![
                PickupEvent {
                    zone: zone.clone(),
                    date: NaiveDate::from_str("2024-04-02").unwrap(),
                    streams: StreamSet::Garbage | StreamSet::Recycling,
                },
                PickupEvent {
                    zone,
                    date: NaiveDate::from_str("2024-04-09").unwrap(),
                    streams: StreamSet::Organics,
                },
            ],
        }
    }

    fn parse_back(document: &[u8]) -> IcalCalendar {
        let text = String::from_utf8(document.to_vec()).unwrap();
        IcalParser::new(BufReader::new(Cursor::new(text)))
            .next()
            .unwrap()
            .unwrap()
    }

    fn get_property_value<'a>(properties: &'a [Property], name: &str) -> &'a str {
        properties
            .iter()
            .find(|property| property.name == name)
            .unwrap()
            .value
            .as_deref()
            .unwrap()
    }

    #[test]
    fn test_serialize_one_event_per_pickup() {
        let document = serialize(&get_test_schedule(), &RenderOptions::default()).unwrap();
        let calendar = parse_back(&document);
        assert_eq!(calendar.events.len(), 2);
        assert_eq!(
            get_property_value(&calendar.properties, "X-WR-CALNAME"),
            "Tuesday1 Waste Pickup"
        );
        assert_eq!(
            get_property_value(&calendar.properties, "PRODID"),
            "-//twc//Waste Pickup Calendar//EN"
        );

        let first = &calendar.events[0].properties;
        assert_eq!(get_property_value(first, "DTSTART"), "20240402");
        assert_eq!(get_property_value(first, "DTEND"), "20240403");
        assert_eq!(get_property_value(first, "UID"), "20240402Tuesday1@twc");
        assert_eq!(get_property_value(first, "SUMMARY"), "Garbage\\, Recycling");
        assert!(get_property_value(first, "URL").ends_with("/waste-wizard/"));

        let text = String::from_utf8(document).unwrap();
        assert!(text.contains("DTSTAMP:20240402T000000Z\r\n"));
        assert!(!text.contains("DTSTAMP;"));
        assert!(text.contains("DTEND;VALUE=DATE:20240403\r\n"));

        let second = &calendar.events[1].properties;
        assert_eq!(get_property_value(second, "DTSTART"), "20240409");
        assert_eq!(get_property_value(second, "DTEND"), "20240410");
        assert_eq!(get_property_value(second, "SUMMARY"), "Organics");
    }

    #[test]
    fn test_serialize_is_reproducible() {
        let schedule = get_test_schedule();
        let options = RenderOptions {
            emoji: true,
            ..RenderOptions::default()
        };
        assert_eq!(
            serialize(&schedule, &options).unwrap(),
            serialize(&schedule.clone(), &options).unwrap()
        );
    }

    #[test]
    fn test_serialize_ends_lines_with_crlf() {
        let options = RenderOptions {
            emoji: true,
            ..RenderOptions::default()
        };
        let document = serialize(&get_test_schedule(), &options).unwrap();
        let text = String::from_utf8(document).unwrap();
        // the description is long enough to be folded
        assert!(text.contains("\r\n "));
        assert_eq!(text.matches('\n').count(), text.matches("\r\n").count());
        assert!(text.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(text.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_crlf_keeps_existing_crlf() {
        assert_eq!(crlf("A\nB\r\n C\n"), "A\r\nB\r\n C\r\n");
    }

    #[test]
    fn test_serialize_end_of_month_and_year() {
        let zone = Zone::parse("Friday2").unwrap();
        let schedule = ZoneSchedule {
            zone: zone.clone(),
            events: vec![PickupEvent {
                zone,
                date: NaiveDate::from_str("2024-12-31").unwrap(),
                streams: StreamSet::ChristmasTree,
            }],
        };
        let calendar = parse_back(&serialize(&schedule, &RenderOptions::default()).unwrap());
        assert_eq!(
            get_property_value(&calendar.events[0].properties, "DTEND"),
            "20250101"
        );
    }

    #[test]
    fn test_serialize_rejects_last_representable_date() {
        let zone = Zone::parse("Friday2").unwrap();
        let schedule = ZoneSchedule {
            zone: zone.clone(),
            events: vec![PickupEvent {
                zone,
                date: NaiveDate::MAX,
                streams: StreamSet::Garbage,
            }],
        };
        assert!(matches!(
            serialize(&schedule, &RenderOptions::default()),
            Err(SerializationError::DateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_serialize_rejects_unordered_schedule() {
        let mut schedule = get_test_schedule();
        schedule.events.reverse();
        assert!(matches!(
            serialize(&schedule, &RenderOptions::default()),
            Err(SerializationError::Unordered { .. })
        ));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("Garbage, Recycling"), "Garbage\\, Recycling");
        assert_eq!(escape_text("a;b\\c"), "a\\;b\\\\c");
        assert_eq!(escape_text("line\r\nnext\nlast"), "line\\nnext\\nlast");
        assert_eq!(escape_text("plain"), "plain");
    }
}

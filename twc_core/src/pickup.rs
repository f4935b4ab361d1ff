//! The pickup data model: zones, waste streams and pickup events.

use std::{fmt, str::FromStr};

use bitmask_enum::bitmask;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::row_parser::RowError;

static URL_GARBAGE: &str =
    "https://www.toronto.ca/services-payments/recycling-organics-garbage/houses/what-goes-in-my-green-bin/";
static URL_RECYCLING: &str =
    "https://www.toronto.ca/services-payments/recycling-organics-garbage/waste-wizard/";

/// A single waste stream.
///
/// The declaration order is the order streams appear in composite labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stream {
    Garbage,
    Recycling,
    Organics,
    YardWaste,
    ChristmasTree,
}

impl Stream {
    pub const ALL: [Stream; 5] = [
        Stream::Garbage,
        Stream::Recycling,
        Stream::Organics,
        Stream::YardWaste,
        Stream::ChristmasTree,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stream::Garbage => "Garbage",
            Stream::Recycling => "Recycling",
            Stream::Organics => "Organics",
            Stream::YardWaste => "Yard Waste",
            Stream::ChristmasTree => "Christmas Tree",
        }
    }

    pub fn emoji(self) -> Option<&'static str> {
        match self {
            Stream::Garbage => Some("🗑"),
            Stream::Recycling => Some("♻️"),
            Stream::Organics => None,
            Stream::YardWaste => Some("🍂"),
            Stream::ChristmasTree => Some("🎄"),
        }
    }

    /// Look up a stream by a name as it appears in published data.
    ///
    /// Matching ignores case and whitespace.
    pub fn from_name(name: &str) -> Option<Stream> {
        let key: String = name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "garbage" => Some(Stream::Garbage),
            "recycling" | "bluebin" => Some(Stream::Recycling),
            "organics" | "greenbin" => Some(Stream::Organics),
            "yardwaste" => Some(Stream::YardWaste),
            "christmastree" | "tree" => Some(Stream::ChristmasTree),
            _ => None,
        }
    }
}

/// The set of streams collected on one pickup.
#[bitmask(u8)]
pub enum StreamSet {
    Garbage,
    Recycling,
    Organics,
    YardWaste,
    ChristmasTree,
}

impl From<Stream> for StreamSet {
    fn from(value: Stream) -> Self {
        match value {
            Stream::Garbage => StreamSet::Garbage,
            Stream::Recycling => StreamSet::Recycling,
            Stream::Organics => StreamSet::Organics,
            Stream::YardWaste => StreamSet::YardWaste,
            Stream::ChristmasTree => StreamSet::ChristmasTree,
        }
    }
}

impl StreamSet {
    /// Parse a possibly composite label such as `Garbage, Recycling` or `Garbage/Green Bin`.
    pub fn from_label(label: &str) -> Result<StreamSet, RowError> {
        let mut streams = StreamSet::none();
        for part in label.split([',', '/']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let stream = Stream::from_name(part).ok_or_else(|| RowError::UnknownStream {
                line: 0,
                value: part.to_string(),
            })?;
            streams |= StreamSet::from(stream);
        }
        Ok(streams)
    }

    pub fn has(self, stream: Stream) -> bool {
        self.contains(StreamSet::from(stream))
    }

    pub fn is_empty(self) -> bool {
        self == StreamSet::none()
    }

    pub fn streams(self) -> impl Iterator<Item = Stream> {
        Stream::ALL
            .into_iter()
            .filter(move |stream| self.has(*stream))
    }

    /// The composite label, e.g. `Garbage, Recycling`.
    pub fn label(self) -> String {
        self.streams()
            .map(Stream::name)
            .collect::<Vec<&str>>()
            .join(", ")
    }

    /// The label with the stream emojis in front, e.g. `🗑♻️ Garbage, Recycling`.
    pub fn emoji_label(self) -> String {
        let emoji: String = self.streams().filter_map(Stream::emoji).collect();
        if emoji.is_empty() {
            self.label()
        } else {
            format!("{emoji} {}", self.label())
        }
    }

    /// Where residents can read up on what goes into the bins collected that day.
    pub fn info_url(self) -> &'static str {
        if self.has(Stream::Recycling) {
            URL_RECYCLING
        } else {
            URL_GARBAGE
        }
    }
}

/// A collection zone in canonical form, e.g. `Tuesday1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Zone(String);

impl Zone {
    /// Normalize a raw zone identifier.
    ///
    /// Words are capitalized and joined, so `tuesday 1`, `Tuesday1` and ` TUESDAY 1 `
    /// all become `Tuesday1`. The result is used as a file stem, so only ASCII
    /// alphanumerics, `-` and `_` are accepted.
    pub fn parse(raw: &str) -> Result<Zone, RowError> {
        let canonical: String = raw.split_whitespace().map(capitalize).collect();
        if canonical.is_empty() {
            return Err(RowError::MissingZone { line: 0 });
        }
        if !canonical
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(RowError::InvalidZone {
                line: 0,
                value: raw.trim().to_string(),
            });
        }
        Ok(Zone(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

impl FromStr for Zone {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::parse(s)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One collection in one zone on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct PickupEvent {
    pub zone: Zone,
    pub date: NaiveDate,
    pub streams: StreamSet,
}

impl PickupEvent {
    /// The summary shown in calendars and tables.
    pub fn subject(&self, emoji: bool) -> String {
        if emoji {
            self.streams.emoji_label()
        } else {
            self.streams.label()
        }
    }

    pub fn description(&self) -> String {
        format!("{} - See {}", self.streams.label(), self.streams.info_url())
    }
}

/// All pickups of one zone, ascending by date without repeated dates.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSchedule {
    pub zone: Zone,
    pub events: Vec<PickupEvent>,
}

use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;

/// A tag as reported to users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RfidTag {
    /// ASCII representation of the EPC.
    pub epc: String,

    /// RF channel index the tag was seen on.
    pub channel: u16,

    /// When the tag was last seen.
    /// Microseconds since the unix epoch, UTC.
    pub last_seen: u64,

    /// How many times the tag was seen.
    pub seen_count: u32,
}

impl Display for RfidTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (channel {}, seen {}x)",
            self.epc, self.channel, self.seen_count
        )
    }
}

/// A tag as reported by the reader.
///
/// Readers may omit fields depending on how they were configured,
/// hence the options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawTagReport {
    /// The EPC, as ASCII bytes.
    pub epc: Vec<u8>,

    /// The RF channel index.
    pub channel_index: Option<u16>,

    /// Microseconds since the unix epoch, UTC.
    pub last_seen_timestamp_utc: Option<u64>,

    /// Times seen since the previous report.
    pub tag_seen_count: Option<u32>,
}

impl RawTagReport {
    /// A report with every field present.
    pub fn new(epc: &str, channel_index: u16, last_seen: u64, seen_count: u32) -> Self {
        Self {
            epc: epc.as_bytes().to_vec(),
            channel_index: Some(channel_index),
            last_seen_timestamp_utc: Some(last_seen),
            tag_seen_count: Some(seen_count),
        }
    }
}

fn epc_to_string(epc: &[u8]) -> String {
    if epc.is_ascii() {
        String::from_utf8_lossy(epc).into_owned()
    } else {
        epc.iter().map(|byte| format!("{byte:02x}")).join("")
    }
}

impl TryFrom<RawTagReport> for RfidTag {
    type Error = Error;

    fn try_from(report: RawTagReport) -> Result<Self, Self::Error> {
        let epc = epc_to_string(&report.epc);

        let missing = |field: &str| Error::MalformedReport(format!("tag `{epc}` has no {field}"));

        Ok(Self {
            channel: report.channel_index.ok_or_else(|| missing("channel index"))?,
            last_seen: report
                .last_seen_timestamp_utc
                .ok_or_else(|| missing("last seen timestamp"))?,
            seen_count: report
                .tag_seen_count
                .ok_or_else(|| missing("seen count"))?,
            epc,
        })
    }
}

/// Translate a batch of reader reports.
/// Reports which can't be translated are skipped.
pub fn translate_batch(reports: Vec<RawTagReport>) -> Vec<RfidTag> {
    reports
        .into_iter()
        .filter_map(|report| match RfidTag::try_from(report) {
            Ok(tag) => Some(tag),
            Err(e) => {
                warn!(%e, "Skipping tag report");
                None
            }
        })
        .collect()
}

/// The envelope tags are sent to users in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TagsMessage {
    /// The tags.
    pub tags: Vec<RfidTag>,
}

impl TagsMessage {
    /// Wrap some tags.
    pub fn new(tags: Vec<RfidTag>) -> Self {
        Self { tags }
    }

    /// An example message.
    pub fn example() -> Self {
        Self::new(vec![
            RfidTag {
                epc: "300833b2ddd9014000000001".into(),
                channel: 1,
                last_seen: 1_700_000_000_000_000,
                seen_count: 3,
            },
            RfidTag {
                epc: "300833b2ddd9014000000002".into(),
                channel: 4,
                last_seen: 1_700_000_000_250_000,
                seen_count: 1,
            },
        ])
    }
}

impl Display for TagsMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} tag(s)", self.tags.len())
    }
}

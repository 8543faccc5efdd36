// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Blob path partitioning.
//!
//! Objects land under hourly prefixes so lifecycle rules and time-ranged
//! scans can address them:
//!
//! ```text
//! logs/YYYY/MM/DD/HH/log_YYYYMMDD_HHMMSS_ffffff[_<discriminator>].json
//! ```
//!
//! A timestamp with an offset is filed by its own wall-clock fields:
//! `2026-01-07T12:30:00+05:00` lands in hour `12`, not `07`.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

pub const KEY_PREFIX: &str = "logs";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp, keeping its offset
///
/// Accepts a `Z` suffix or a numeric offset. Timestamps without an offset,
/// and bare dates, are taken to be UTC.
pub fn parse_timestamp(input: &str) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(input, format) {
            return Some(dt);
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// The instant a record is filed under: its own timestamp, or `now`
pub fn partition_time(timestamp: Option<&str>, now: DateTime<Utc>) -> DateTime<FixedOffset> {
    timestamp
        .and_then(parse_timestamp)
        .unwrap_or_else(|| now.fixed_offset())
}

/// Storage key for a record filed at `at`
pub fn blob_key(at: impl Into<DateTime<FixedOffset>>, discriminator: Option<&str>) -> String {
    let at = at.into();
    let suffix = discriminator
        .map(sanitize)
        .filter(|d| !d.is_empty())
        .map(|d| format!("_{}", d))
        .unwrap_or_default();

    format!(
        "{}/{}/log_{}{}.json",
        KEY_PREFIX,
        at.format("%Y/%m/%d/%H"),
        at.format("%Y%m%d_%H%M%S_%6f"),
        suffix
    )
}

/// Hourly prefix that holds every key filed at `at`
pub fn hour_prefix(at: impl Into<DateTime<FixedOffset>>) -> String {
    format!("{}/{}/", KEY_PREFIX, at.into().format("%Y/%m/%d/%H"))
}

fn sanitize(discriminator: &str) -> String {
    discriminator
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

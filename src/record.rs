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

//! The log record that travels from the receiver through the queue into
//! blob storage.
//!
//! A record is an open JSON object. The handful of fields the pipeline reads
//! or writes are lifted into typed slots; everything else rides along in
//! [`LogRecord::fields`] untouched. A known key whose value has an unexpected
//! shape (say, a numeric `level`) is left in `fields` as the client sent it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const DEFAULT_LEVEL: &str = "INFO";
pub const DEFAULT_SOURCE: &str = "unknown";

/// Metadata captured by the ingestion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestMetadata {
    pub method: String,
    pub user_agent: String,
    pub remote_addr: Option<String>,
    pub received_at: String,
}

/// Metadata added by the delivery processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingInfo {
    pub processed_at: String,
    pub processor: String,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogRecord {
    pub level: Option<String>,
    pub source: Option<String>,
    /// Client-supplied or injected at ingestion; never rewritten afterwards
    pub timestamp: Option<String>,
    pub request_metadata: Option<RequestMetadata>,
    pub processing: Option<ProcessingInfo>,
    /// Every other field, in client form
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        Self {
            level: take_string(&mut map, "level"),
            source: take_string(&mut map, "source"),
            timestamp: take_string(&mut map, "timestamp"),
            request_metadata: take_typed(&mut map, "request_metadata"),
            processing: take_typed(&mut map, "processing"),
            fields: map,
        }
    }

    /// Returns `None` for anything but a JSON object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LEVEL)
    }

    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or(DEFAULT_SOURCE)
    }

    /// True when the client sent a `timestamp` key, whatever its value
    pub fn has_timestamp(&self) -> bool {
        self.timestamp.is_some() || self.fields.contains_key("timestamp")
    }

    /// Injects `now` as the timestamp if the key is absent
    pub fn ensure_timestamp(&mut self, now: DateTime<Utc>) {
        if !self.has_timestamp() {
            self.timestamp = Some(iso_timestamp(now));
        }
    }

    /// The `timestamp` field as it will be serialized
    pub fn timestamp_value(&self) -> Value {
        match &self.timestamp {
            Some(ts) => Value::String(ts.clone()),
            None => self.fields.get("timestamp").cloned().unwrap_or(Value::Null),
        }
    }

    pub fn to_value(&self) -> Value {
        // Serializing plain strings and JSON values into a Value cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn shadows(&self, key: &str) -> bool {
        match key {
            "level" => self.level.is_some(),
            "source" => self.source.is_some(),
            "timestamp" => self.timestamp.is_some(),
            "request_metadata" => self.request_metadata.is_some(),
            "processing" => self.processing.is_some(),
            _ => false,
        }
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(level) = &self.level {
            map.serialize_entry("level", level)?;
        }
        if let Some(source) = &self.source {
            map.serialize_entry("source", source)?;
        }
        if let Some(timestamp) = &self.timestamp {
            map.serialize_entry("timestamp", timestamp)?;
        }
        for (key, value) in &self.fields {
            if !self.shadows(key) {
                map.serialize_entry(key, value)?;
            }
        }
        if let Some(request_metadata) = &self.request_metadata {
            map.serialize_entry("request_metadata", request_metadata)?;
        }
        if let Some(processing) = &self.processing {
            map.serialize_entry("processing", processing)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LogRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(LogRecord::from_map)
    }
}

/// UTC ISO-8601 with microseconds and a `Z` suffix
pub fn iso_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// JSON truthiness: null, false, zero, and empty strings/arrays/objects are falsy
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(_)) => match map.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

fn take_typed<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let parsed = serde_json::from_value(map.get(key)?.clone()).ok()?;
    map.remove(key);
    Some(parsed)
}

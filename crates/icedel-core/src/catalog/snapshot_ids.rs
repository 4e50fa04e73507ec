//! Snapshot identifiers across the JSON boundary.
//!
//! Snapshot ids are 64-bit signed integers on the wire. Inside icedel they are
//! opaque decimal strings ([`SnapshotId`]) and only become JSON numbers while a
//! request body is being sent.
//!
//! [`stringify_snapshot_ids`] and [`numberify_snapshot_ids`] rewrite the three
//! snapshot-id shaped fields in parsed JSON, so a matching key inside a
//! free-form map (table properties, snapshot summaries, catalog config) is left
//! alone.

use crate::{CatalogError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Field names carrying snapshot ids.
pub const SNAPSHOT_ID_FIELDS: [&str; 3] =
    ["snapshot-id", "current-snapshot-id", "parent-snapshot-id"];

/// String-to-string maps whose keys are user data.
const FREE_FORM_FIELDS: [&str; 5] = ["properties", "summary", "config", "defaults", "overrides"];

/// Ref target used when asserting that a branch has no snapshot yet.
const NO_SNAPSHOT: &str = "-1";

/// Opaque snapshot identifier, a decimal string in the `i64` range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Parse a decimal snapshot id.
    pub fn parse(text: &str) -> Result<Self> {
        text.parse::<i64>()
            .map(Self::from)
            .map_err(|e| {
                CatalogError::InvalidResponse(format!("invalid snapshot id {:?}: {}", text, e))
                    .into()
            })
    }

    /// The `-1` sentinel meaning "branch has no snapshot".
    pub fn none() -> Self {
        Self(NO_SNAPSHOT.to_string())
    }

    /// Whether this is the `-1` sentinel.
    pub fn is_no_snapshot(&self) -> bool {
        self.0 == NO_SNAPSHOT
    }

    /// Decimal representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, for binary encodings.
    pub fn as_i64(&self) -> i64 {
        let value = self.0.parse::<i64>();
        debug_assert!(value.is_ok(), "snapshot id {:?} is not an i64", self.0);
        value.unwrap_or_default()
    }
}

impl From<i64> for SnapshotId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SnapshotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SnapshotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(SnapshotId::from(n)),
            Repr::Text(s) => s
                .parse::<i64>()
                .map(SnapshotId::from)
                .map_err(|_| serde::de::Error::custom(format!("invalid snapshot id {:?}", s))),
        }
    }
}

/// Rewrite integer snapshot-id fields to decimal strings.
pub fn stringify_snapshot_ids(json_text: &str) -> Result<String> {
    let mut value: Value = serde_json::from_str(json_text)?;
    stringify_value(&mut value);
    Ok(serde_json::to_string(&value)?)
}

/// Rewrite decimal-string snapshot-id fields back to bare JSON integers.
pub fn numberify_snapshot_ids(json_text: &str) -> Result<String> {
    let mut value: Value = serde_json::from_str(json_text)?;
    numberify_value(&mut value);
    Ok(serde_json::to_string(&value)?)
}

/// In-place form of [`stringify_snapshot_ids`].
pub fn stringify_value(value: &mut Value) {
    rewrite(value, &|field| {
        if let Value::Number(n) = field {
            if let Some(i) = n.as_i64() {
                *field = Value::String(i.to_string());
            }
        }
    });
}

/// In-place form of [`numberify_snapshot_ids`].
pub fn numberify_value(value: &mut Value) {
    rewrite(value, &|field| {
        if let Value::String(s) = field {
            if let Ok(i) = s.parse::<i64>() {
                *field = Value::Number(Number::from(i));
            }
        }
    });
}

fn rewrite(value: &mut Value, convert: &dyn Fn(&mut Value)) {
    match value {
        Value::Object(map) => rewrite_object(map, convert),
        Value::Array(items) => {
            for item in items {
                rewrite(item, convert);
            }
        }
        _ => {}
    }
}

fn rewrite_object(map: &mut Map<String, Value>, convert: &dyn Fn(&mut Value)) {
    for (key, field) in map.iter_mut() {
        if SNAPSHOT_ID_FIELDS.contains(&key.as_str()) {
            convert(field);
        } else if !FREE_FORM_FIELDS.contains(&key.as_str()) {
            rewrite(field, convert);
        }
    }
}

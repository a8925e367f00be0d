//! # Sample values
//!
//! Decoded scalars and the ordered tag maps that carry them from the
//! interpreter to the log buffer.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Key of the UTC timestamp field present in every [`Sample`].
pub const TIMESTAMP_UTC: &str = "timestamp_utc";

/// Key of the local-time timestamp field present in every [`Sample`].
pub const TIMESTAMP_LOCAL: &str = "timestamp_local";

/// Timestamp rendering shared by both timestamp fields.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

/// One decoded tag value.
///
/// | Variant | Produced by |
/// |---------|-------------|
/// | Bool | coils, discrete inputs, packed bool bits |
/// | U16 | `uint16`, `ruint16`, packed bool raw word |
/// | I16 | `sint16`, `rsint16` |
/// | F32 | `float32` and its swapped variants |
/// | F64 | `float64`, every scaled value |
/// | Text | timestamps |
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Bool(bool),
    U16(u16),
    I16(i16),
    F32(f32),
    F64(f64),
    Text(String),
}

impl TagValue {
    /// Numeric view used for scaling. `None` for text.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            TagValue::U16(v) => Some(f64::from(*v)),
            TagValue::I16(v) => Some(f64::from(*v)),
            TagValue::F32(v) => Some(f64::from(*v)),
            TagValue::F64(v) => Some(*v),
            TagValue::Text(_) => None,
        }
    }
}

/// Booleans print as `0`/`1`, matching the CSV and JSON outputs.
impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(b) => write!(f, "{}", u8::from(*b)),
            TagValue::U16(v) => write!(f, "{}", v),
            TagValue::I16(v) => write!(f, "{}", v),
            TagValue::F32(v) => write!(f, "{}", v),
            TagValue::F64(v) => write!(f, "{}", v),
            TagValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for TagValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TagValue::Bool(b) => serializer.serialize_u8(u8::from(*b)),
            TagValue::U16(v) => serializer.serialize_u16(*v),
            TagValue::I16(v) => serializer.serialize_i16(*v),
            TagValue::F32(v) => serializer.serialize_f32(*v),
            TagValue::F64(v) => serializer.serialize_f64(*v),
            TagValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl From<u16> for TagValue {
    fn from(v: u16) -> Self {
        TagValue::U16(v)
    }
}

impl From<i16> for TagValue {
    fn from(v: i16) -> Self {
        TagValue::I16(v)
    }
}

impl From<f32> for TagValue {
    fn from(v: f32) -> Self {
        TagValue::F32(v)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::F64(v)
    }
}

/// Tag name to value, iterated in first-insertion order.
///
/// Inserting an existing tag replaces its value without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagMap {
    entries: Vec<(String, TagValue)>,
    index: HashMap<String, usize>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; returns the previous value if the tag existed.
    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<TagValue>) -> Option<TagValue> {
        let tag = tag.into();
        let value = value.into();
        match self.index.get(&tag) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(tag.clone(), self.entries.len());
                self.entries.push((tag, value));
                None
            }
        }
    }

    pub fn get(&self, tag: &str) -> Option<&TagValue> {
        self.index.get(tag).map(|&pos| &self.entries[pos].1)
    }

    /// Merge `other` into `self`, later values winning.
    pub fn merge(&mut self, other: TagMap) {
        for (tag, value) in other.entries {
            self.insert(tag, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for TagMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (tag, value) in &self.entries {
            map.serialize_entry(tag, value)?;
        }
        map.end()
    }
}

/// One timestamped observation: both timestamps first, then every tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Sample {
    values: TagMap,
}

impl Sample {
    /// Start a sample stamped with `utc`, rendered in UTC and local time.
    pub fn new(utc: DateTime<Utc>) -> Self {
        let local = utc.with_timezone(&Local);
        let mut values = TagMap::new();
        values.insert(
            TIMESTAMP_UTC,
            TagValue::Text(utc.format(TIMESTAMP_FORMAT).to_string()),
        );
        values.insert(
            TIMESTAMP_LOCAL,
            TagValue::Text(local.format(TIMESTAMP_FORMAT).to_string()),
        );
        Self { values }
    }

    /// Stamp a sample with the current time.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn timestamp_utc(&self) -> &str {
        match self.values.get(TIMESTAMP_UTC) {
            Some(TagValue::Text(s)) => s,
            _ => "",
        }
    }

    pub fn timestamp_local(&self) -> &str {
        match self.values.get(TIMESTAMP_LOCAL) {
            Some(TagValue::Text(s)) => s,
            _ => "",
        }
    }

    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<TagValue>) {
        self.values.insert(tag, value);
    }

    /// Merge one interpreted tag map; later maps overwrite earlier tags.
    pub fn merge(&mut self, tags: TagMap) {
        self.values.merge(tags);
    }

    pub fn get(&self, tag: &str) -> Option<&TagValue> {
        self.values.get(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys()
    }

    /// Number of fields, timestamps included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

use std::collections::BTreeMap;
use std::time::Duration;

use humantime::{format_duration, parse_duration};
use serde::Deserialize;
use serde_with::{DeserializeAs, SerializeAs};

pub(crate) struct HumantimeDuration;

impl<'de> DeserializeAs<'de, Duration> for HumantimeDuration {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

impl SerializeAs<Duration> for HumantimeDuration {
    fn serialize_as<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format_duration(*value).to_string())
    }
}

/// A string map that may also arrive JSON-encoded inside a single string,
/// as admin consoles tend to store it.
pub(super) struct LenientStringMap;

#[derive(Deserialize)]
#[serde(untagged)]
enum MapOrEncoded {
    Map(BTreeMap<String, String>),
    Encoded(String),
}

impl<'de> DeserializeAs<'de, BTreeMap<String, String>> for LenientStringMap {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match MapOrEncoded::deserialize(deserializer)? {
            MapOrEncoded::Map(map) => Ok(map),
            MapOrEncoded::Encoded(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            MapOrEncoded::Encoded(raw) => {
                serde_json::from_str(&raw).map_err(serde::de::Error::custom)
            }
        }
    }
}

//! Serde helpers that store a `Duration` as whole milliseconds.
//!
//! Use with `#[serde(with = "semantic::serde_millis")]`. Durations beyond `u64::MAX` ms
//! saturate.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(millis)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timeouts {
        #[serde(with = "super")]
        call: Duration,
    }

    #[test]
    fn reads_plain_integers() {
        let t: Timeouts = serde_json::from_str(r#"{"call": 2500}"#).unwrap();
        assert_eq!(t.call, Duration::from_millis(2500));
    }

    #[test]
    fn sub_millisecond_part_is_dropped() {
        let t = Timeouts {
            call: Duration::from_micros(1_999),
        };
        assert_eq!(serde_json::to_string(&t).unwrap(), r#"{"call":1}"#);
    }
}

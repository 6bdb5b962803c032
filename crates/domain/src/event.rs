//! Event — an immutable record of something that happened on a channel.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ChannelId, EventId};

/// Wall-clock instant carried by events and by the active task record.
pub type Timestamp = DateTime<Utc>;

/// Current UTC instant.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ChannelOn,
    ChannelOff,
    ChannelReset,
    ZoneChanged,
    TaskStarted,
    TaskSettled,
    TaskRejected,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ChannelOn => "channel_on",
            Self::ChannelOff => "channel_off",
            Self::ChannelReset => "channel_reset",
            Self::ZoneChanged => "zone_changed",
            Self::TaskStarted => "task_started",
            Self::TaskSettled => "task_settled",
            Self::TaskRejected => "task_rejected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub channel: Option<ChannelId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create an event stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(event_type: EventType, channel: Option<ChannelId>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            channel,
            data,
            timestamp: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_stamp_fresh_id_and_time() {
        let before = now();
        let a = Event::new(EventType::ChannelOn, None, serde_json::json!({}));
        let b = Event::new(EventType::ChannelOn, None, serde_json::json!({}));
        assert_ne!(a.id, b.id);
        assert!(before <= a.timestamp);
        assert!(a.timestamp <= b.timestamp);
        assert!(b.timestamp <= now());
    }

    #[test]
    fn should_serialize_event_type_as_snake_case() {
        let event = Event::new(
            EventType::ZoneChanged,
            Some(ChannelId::new("heater", 0)),
            serde_json::json!({"from": "green", "to": "red_high"}),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "zone_changed");
        assert_eq!(json["channel"]["device"], "heater");
        assert_eq!(EventType::TaskRejected.to_string(), "task_rejected");
    }
}

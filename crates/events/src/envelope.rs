use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Event;

/// Envelope for a published event.
///
/// This is the unit handed to the push channel: subscribers receive
/// `{ event_id, type, version, timestamp, data }` without needing to know the
/// payload type up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    #[serde(rename = "type")]
    event_type: String,
    version: u32,
    #[serde(rename = "timestamp")]
    occurred_at: DateTime<Utc>,
    #[serde(rename = "data")]
    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, copying its metadata into the envelope.
    pub fn wrap(payload: E) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: payload.event_type().to_string(),
            version: payload.version(),
            occurred_at: payload.occurred_at(),
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

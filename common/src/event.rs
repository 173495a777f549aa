use serde::Serialize;

use crate::{topics::TOPIC_ERROR, types::SampleReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Message,
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Text(String),
    Reading(SampleReading),
}

impl EventPayload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Reading(_) => None,
        }
    }

    pub fn as_reading(&self) -> Option<SampleReading> {
        match self {
            Self::Reading(reading) => Some(*reading),
            Self::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermostatEvent {
    pub kind: EventKind,
    pub topic: &'static str,
    pub payload: EventPayload,
}

impl ThermostatEvent {
    pub fn message(topic: &'static str, text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Message,
            topic,
            payload: EventPayload::Text(text.into()),
        }
    }

    pub fn reading(topic: &'static str, reading: SampleReading) -> Self {
        Self {
            kind: EventKind::Message,
            topic,
            payload: EventPayload::Reading(reading),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            topic: TOPIC_ERROR,
            payload: EventPayload::Text(text.into()),
        }
    }

    pub fn is_message(&self, topic: &str, text: &str) -> bool {
        self.topic == topic && self.payload.as_text() == Some(text)
    }
}

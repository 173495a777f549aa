use std::time::Duration;

use climate_common::{
    BrokerConfig, EventPayload, ThermostatEvent, TOPIC_AC, TOPIC_CMD_FAN, TOPIC_CMD_MODE,
    TOPIC_CMD_TARGET, TOPIC_ERROR, TOPIC_FAN, TOPIC_FURNACE, TOPIC_MODE, TOPIC_STATUS,
    TOPIC_TARGET, TOPIC_TEMPERATURE,
};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    command::{Command, CommandError},
    thermostat::Thermostat,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const COMMAND_TOPICS: [&str; 3] = [TOPIC_CMD_TARGET, TOPIC_CMD_MODE, TOPIC_CMD_FAN];

/// Connects to the broker and bridges the thermostat's events and command topics.
pub fn spawn_bridge(broker: &BrokerConfig, thermostat: Thermostat) {
    let mut options = MqttOptions::new(broker.client_id.clone(), broker.host.clone(), broker.port);
    options.set_keep_alive(Duration::from_secs(30));
    if !broker.username.is_empty() {
        options.set_credentials(broker.username.clone(), broker.password.clone());
    }

    let (client, eventloop) = AsyncClient::new(options, 64);
    info!("mqtt bridge connecting to {}:{}", broker.host, broker.port);

    spawn_publish_loop(client.clone(), thermostat.clone());
    spawn_mqtt_loop(client, eventloop, thermostat);
}

fn spawn_publish_loop(client: AsyncClient, thermostat: Thermostat) {
    let mut events = thermostat.subscribe();
    tokio::spawn(async move {
        loop {
            let Some(event) = events.recv().await else {
                events = thermostat.subscribe();
                continue;
            };
            let Some(payload) = outbound_payload(&event) else {
                continue;
            };

            if let Err(err) = client
                .publish(event.topic, QoS::AtLeastOnce, false, payload.to_string())
                .await
            {
                warn!("mqtt publish to {} failed: {err}", event.topic);
            }
        }
    });
}

fn spawn_mqtt_loop(client: AsyncClient, mut eventloop: EventLoop, thermostat: Thermostat) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    handle_mqtt_message(&thermostat, &message.topic, &message.payload).await;
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    for topic in COMMAND_TOPICS {
                        if let Err(err) = client.try_subscribe(topic, QoS::AtMostOnce) {
                            warn!("mqtt subscribe to {topic} failed: {err}");
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

async fn handle_mqtt_message(thermostat: &Thermostat, topic: &str, payload: &[u8]) {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {topic} ({} bytes)",
            payload.len()
        );
        return;
    }

    let Some(command) = inbound_command(topic, payload) else {
        debug!("ignoring mqtt message on {topic}");
        return;
    };

    match command {
        Ok(command) => command.apply(thermostat).await,
        Err(err) => thermostat.report_error(err.to_string()),
    }
}

/// Wire shape for an event, or `None` for topics the bridge does not forward.
pub fn outbound_payload(event: &ThermostatEvent) -> Option<Value> {
    let text = match &event.payload {
        EventPayload::Reading(reading) => {
            return (event.topic == TOPIC_TEMPERATURE).then(|| json!(reading));
        }
        EventPayload::Text(text) => text.as_str(),
    };

    let value = match event.topic {
        TOPIC_TARGET => match text.parse::<f32>() {
            Ok(target) => json!({ "target": target }),
            Err(_) => json!({ "target": text }),
        },
        TOPIC_MODE => json!({ "mode": text }),
        TOPIC_STATUS => json!({ "status": text }),
        TOPIC_FURNACE | TOPIC_AC => json!({ "action": text }),
        TOPIC_FAN => json!({ "fan": text }),
        TOPIC_ERROR => json!({ "error": text }),
        _ => return None,
    };
    Some(value)
}

/// Parses a command topic. Payloads may be a JSON object carrying the field (`{"target": 70}`)
/// or the bare value.
pub fn inbound_command(topic: &str, payload: &[u8]) -> Option<Result<Command, CommandError>> {
    let raw = String::from_utf8_lossy(payload);

    let command = match topic {
        TOPIC_CMD_TARGET => Command::target(field(&raw, "target").as_deref()),
        TOPIC_CMD_MODE => Command::mode(field(&raw, "mode").as_deref()),
        TOPIC_CMD_FAN => Command::fan(field(&raw, "fan").as_deref()),
        _ => return None,
    };
    Some(command)
}

fn field(raw: &str, key: &str) -> Option<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map.get(key).and_then(scalar),
        Ok(value) => scalar(&value),
        Err(_) => Some(raw.trim().to_string()).filter(|text| !text.is_empty()),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use climate_common::{Mode, SampleReading};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn wraps_text_payloads_by_topic() {
        let cases = [
            (TOPIC_TARGET, "70", json!({ "target": 70.0 })),
            (TOPIC_MODE, "Cooling", json!({ "mode": "Cooling" })),
            (TOPIC_STATUS, "Started", json!({ "status": "Started" })),
            (TOPIC_FURNACE, "on", json!({ "action": "on" })),
            (TOPIC_AC, "off", json!({ "action": "off" })),
            (TOPIC_FAN, "start", json!({ "fan": "start" })),
        ];

        for (topic, text, expected) in cases {
            let event = ThermostatEvent::message(topic, text);
            assert_eq!(outbound_payload(&event), Some(expected), "{topic}");
        }

        let error = ThermostatEvent::error("Invalid set mode call");
        assert_eq!(
            outbound_payload(&error),
            Some(json!({ "error": "Invalid set mode call" }))
        );
    }

    #[test]
    fn temperature_is_forwarded_as_the_raw_reading() {
        let event =
            ThermostatEvent::reading(TOPIC_TEMPERATURE, SampleReading::new(68.5, Some(41.0)));
        assert_eq!(
            outbound_payload(&event),
            Some(json!({ "temperature": 68.5, "humidity": 41.0 }))
        );
    }

    #[test]
    fn parses_command_payloads() {
        assert_eq!(
            inbound_command(TOPIC_CMD_TARGET, br#"{"target": 72}"#),
            Some(Ok(Command::SetTarget(72.0)))
        );
        assert_eq!(
            inbound_command(TOPIC_CMD_TARGET, b"68.5"),
            Some(Ok(Command::SetTarget(68.5)))
        );
        assert_eq!(
            inbound_command(TOPIC_CMD_MODE, br#"{"mode": "Cooling"}"#),
            Some(Ok(Command::SetMode(Mode::Cooling)))
        );
        assert_eq!(
            inbound_command(TOPIC_CMD_MODE, b"off"),
            Some(Ok(Command::SetMode(Mode::Off)))
        );
        assert_eq!(
            inbound_command(TOPIC_CMD_FAN, br#"{"fan": "start"}"#),
            Some(Ok(Command::StartFan))
        );
    }

    #[test]
    fn invalid_commands_become_errors() {
        assert_eq!(
            inbound_command(TOPIC_CMD_TARGET, br#"{"mode": "Heating"}"#),
            Some(Err(CommandError::InvalidTarget))
        );
        assert_eq!(
            inbound_command(TOPIC_CMD_MODE, b""),
            Some(Err(CommandError::InvalidMode))
        );
        assert_eq!(inbound_command("thermostat/target", b"70"), None);
    }
}

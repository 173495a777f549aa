use std::net::SocketAddr;

use climate_common::{SampleReading, ThermostatEvent, TOPIC_TARGET, TOPIC_TEMPERATURE};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};
use tracing::{debug, info, warn};

use crate::thermostat::Thermostat;

pub async fn serve(listener: TcpListener, thermostat: Thermostat) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                tokio::spawn(handle_client(socket, peer, thermostat.clone()));
            }
            Err(err) => warn!("feed accept failed: {err}"),
        }
    }
}

async fn handle_client(mut socket: TcpStream, peer: SocketAddr, thermostat: Thermostat) {
    let mut events = thermostat.subscribe();
    info!(
        "feed client {peer} connected ({} listeners)",
        thermostat.listener_count()
    );

    for event in welcome(&thermostat).await {
        if write_event(&mut socket, &event).await.is_err() {
            debug!("feed client {peer} left during welcome");
            return;
        }
    }

    loop {
        let Some(event) = events.recv().await else {
            // The run ended; follow the next one.
            events = thermostat.subscribe();
            continue;
        };

        if let Err(err) = write_event(&mut socket, &event).await {
            info!("feed client {peer} disconnected: {err}");
            return;
        }
    }
}

async fn welcome(thermostat: &Thermostat) -> Vec<ThermostatEvent> {
    let snapshot = thermostat.snapshot().await;
    let mut events = vec![ThermostatEvent::message(
        TOPIC_TARGET,
        snapshot.target.to_string(),
    )];
    if let Some(temperature) = snapshot.temperature {
        events.push(ThermostatEvent::reading(
            TOPIC_TEMPERATURE,
            SampleReading::new(temperature, snapshot.humidity),
        ));
    }
    events
}

async fn write_event(socket: &mut TcpStream, event: &ThermostatEvent) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    socket.write_all(&line).await
}

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use climate_common::Mode;
use tokio::{
    net::TcpListener,
    sync::{watch, Mutex},
};
use tracing::{info, warn};

use crate::{
    builder, feed,
    http::{self, ApiState},
    mqtt,
    scheduler::Scheduler,
    store::{apply_env_overrides, ConfigStore},
    thermostat::Thermostat,
};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::from_env();
    let mut runtime = store.load().await?;
    apply_env_overrides(&mut runtime, |key| std::env::var(key).ok());
    runtime
        .validate()
        .context("runtime configuration is invalid")?;

    let controller = builder::build(&runtime)?;
    let thermostat = controller.thermostat;

    let scheduler = Scheduler::new(runtime.schedule.clone())
        .context("failed to set up the setpoint schedule")?;
    let scheduler = Arc::new(Mutex::new(scheduler));

    let mut modes = thermostat.watch_mode();
    let mode = *modes.borrow_and_update();
    arm_schedule(&scheduler, &thermostat, mode).await;
    tokio::spawn(follow_mode(
        Arc::clone(&scheduler),
        thermostat.clone(),
        modes,
    ));

    if let Some(broker) = runtime.broker.as_ref() {
        mqtt::spawn_bridge(broker, thermostat.clone());
    }

    let feed_addr = SocketAddr::from(([0, 0, 0, 0], runtime.server.feed_port));
    let feed_listener = TcpListener::bind(feed_addr)
        .await
        .with_context(|| format!("failed to bind event feed at {feed_addr}"))?;
    info!("event feed listening on {feed_addr}");
    tokio::spawn(feed::serve(feed_listener, thermostat.clone()));

    thermostat
        .start()
        .await
        .context("failed to start thermostat")?;

    let app = http::router(ApiState {
        thermostat: thermostat.clone(),
        scheduler: Arc::clone(&scheduler),
        drift: controller.drift,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.server.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    thermostat.stop().await;
    scheduler.lock().await.cancel();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}

async fn arm_schedule(scheduler: &Mutex<Scheduler>, thermostat: &Thermostat, mode: Mode) {
    let thermostat = thermostat.clone();
    scheduler.lock().await.init_schedule(mode, move |temperature| {
        let thermostat = thermostat.clone();
        async move {
            info!("schedule sets target to {temperature}");
            thermostat.set_target(temperature).await;
        }
    });
}

async fn follow_mode(
    scheduler: Arc<Mutex<Scheduler>>,
    thermostat: Thermostat,
    mut modes: watch::Receiver<Mode>,
) {
    while modes.changed().await.is_ok() {
        let mode = *modes.borrow_and_update();
        if scheduler.lock().await.mode() == Some(mode) {
            continue;
        }
        arm_schedule(&scheduler, &thermostat, mode).await;
    }
}

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use climate_common::ThermostatSnapshot;
use climate_sensor::DriftRate;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    command::{parse_finite, Command, CommandError},
    scheduler::Scheduler,
    thermostat::Thermostat,
};

#[derive(Clone)]
pub struct ApiState {
    pub thermostat: Thermostat,
    pub scheduler: Arc<Mutex<Scheduler>>,
    pub drift: Option<DriftRate>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct NextScheduleView {
    #[serde(rename = "atEpoch")]
    at_epoch: i64,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct StatusView {
    #[serde(flatten)]
    snapshot: ThermostatSnapshot,
    started: bool,
    timezone: String,
    #[serde(rename = "nextSchedule")]
    next_schedule: Option<NextScheduleView>,
    #[serde(rename = "simRate", skip_serializing_if = "Option::is_none")]
    sim_rate: Option<f32>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/target", post(handle_set_target))
        .route("/api/mode", post(handle_set_mode))
        .route("/api/fan", post(handle_set_fan))
        .route("/api/start", post(handle_start))
        .route("/api/reset", post(handle_reset))
        .route("/api/sim/rate", post(handle_set_sim_rate))
        .with_state(state)
}

async fn handle_get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.thermostat.snapshot().await;
    let started = state.thermostat.is_started().await;

    let (timezone, next_schedule) = {
        let scheduler = state.scheduler.lock().await;
        let next = scheduler
            .next_fire()
            .map(|(at, temperature)| NextScheduleView {
                at_epoch: at.timestamp(),
                temperature,
            });
        (scheduler.timezone().name().to_string(), next)
    };

    Json(StatusView {
        snapshot,
        started,
        timezone,
        next_schedule,
        sim_rate: state.drift.as_ref().map(DriftRate::get),
    })
}

async fn handle_set_target(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let command = Command::target(params.get("value").map(String::as_str));
    run_command(state, command).await
}

async fn handle_set_mode(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let command = Command::mode(params.get("value").map(String::as_str));
    run_command(state, command).await
}

async fn handle_set_fan(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let command = Command::fan(params.get("value").map(String::as_str));
    run_command(state, command).await
}

async fn handle_start(State(state): State<ApiState>) -> axum::response::Response {
    if let Err(err) = state.thermostat.start().await {
        warn!("start request failed: {err}");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to start thermostat");
    }
    handle_get_status(State(state)).await.into_response()
}

async fn handle_reset(State(state): State<ApiState>) -> axum::response::Response {
    info!("reset requested");
    state.thermostat.stop().await;
    handle_start(State(state)).await
}

async fn handle_set_sim_rate(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(drift) = state.drift.as_ref() else {
        return error_response(StatusCode::NOT_FOUND, "Simulation is not active");
    };
    let Some(rate) = parse_finite(params.get("value").map(String::as_str)) else {
        return reject(&state, CommandError::InvalidDriftRate);
    };

    drift.set(rate);
    info!("simulated drift set to {rate}");
    handle_get_status(State(state)).await.into_response()
}

async fn run_command(
    state: ApiState,
    command: Result<Command, CommandError>,
) -> axum::response::Response {
    match command {
        Ok(command) => {
            command.apply(&state.thermostat).await;
            handle_get_status(State(state)).await.into_response()
        }
        Err(err) => reject(&state, err),
    }
}

fn reject(state: &ApiState, err: CommandError) -> axum::response::Response {
    state.thermostat.report_error(err.to_string());
    error_response(StatusCode::BAD_REQUEST, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use climate_common::{EventKind, Mode, RuntimeConfig, ScheduleConfig, TOPIC_ERROR};

    use super::*;
    use crate::builder;

    fn state() -> ApiState {
        let controller = builder::build(&RuntimeConfig::default()).unwrap();
        let scheduler = Scheduler::new(ScheduleConfig::default()).unwrap();
        ApiState {
            thermostat: controller.thermostat,
            scheduler: Arc::new(Mutex::new(scheduler)),
            drift: controller.drift,
        }
    }

    fn query(value: Option<&str>) -> Query<HashMap<String, String>> {
        Query(
            value
                .map(|value| HashMap::from([("value".to_string(), value.to_string())]))
                .unwrap_or_default(),
        )
    }

    #[tokio::test]
    async fn target_is_applied_and_clamped() {
        let state = state();
        let response = handle_set_target(State(state.clone()), query(Some("99"))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.thermostat.snapshot().await.target, 80.0);
    }

    #[tokio::test]
    async fn missing_target_is_rejected_and_published() {
        let state = state();
        let mut events = state.thermostat.subscribe();

        let response = handle_set_target(State(state.clone()), query(None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Error);
        assert!(event.is_message(TOPIC_ERROR, "Invalid set target call"));
    }

    #[tokio::test]
    async fn mode_and_fan_commands() {
        let state = state();

        for mode in [Mode::Cooling, Mode::Off, Mode::Heating] {
            let response =
                handle_set_mode(State(state.clone()), query(Some(mode.as_str()))).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(state.thermostat.snapshot().await.mode, mode);
        }

        let response = handle_set_mode(State(state.clone()), query(Some("auto"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = handle_set_fan(State(state.clone()), query(Some("start"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.thermostat.snapshot().await.fan_on);
    }

    #[tokio::test]
    async fn sim_rate_updates_drift() {
        let state = state();
        let response = handle_set_sim_rate(State(state.clone()), query(Some("0.5"))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.drift.as_ref().map(DriftRate::get), Some(0.5));

        let response = handle_set_sim_rate(State(state.clone()), query(Some("fast"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reset_restarts_the_thermostat() {
        let state = state();
        let response = handle_start(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut events = state.thermostat.subscribe();
        let response = handle_reset(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.thermostat.is_started().await);

        let first = events.recv().await.unwrap();
        assert_eq!(first.payload.as_text(), Some("Stopped"));
        assert!(events.recv().await.is_none());
        state.thermostat.stop().await;
    }
}

use std::sync::{Arc, Weak};

use climate_common::{
    ActuatorKind, EngineAction, Mode, SampleReading, ThermostatConfig, ThermostatEngine,
    ThermostatEvent, ThermostatSnapshot, STATUS_STARTED, STATUS_STOPPED, TOPIC_MODE, TOPIC_STATUS,
    TOPIC_TARGET, TOPIC_TEMPERATURE,
};
use climate_sensor::{ReadingStream, SensorError, TemperatureReader};
use tokio::{
    sync::{watch, Mutex, MutexGuard},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    actuator::Actuator,
    events::{EventBus, EventStream},
};

pub struct ThermostatParts {
    pub reader: Box<dyn TemperatureReader>,
    pub furnace: Box<dyn Actuator>,
    pub ac: Box<dyn Actuator>,
    pub fan: Box<dyn Actuator>,
}

#[derive(Clone)]
pub struct Thermostat {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<CoreState>,
    events: EventBus,
    // Unlike the bus, never completed by `stop()`.
    mode: watch::Sender<Mode>,
    epoch: Instant,
}

struct CoreState {
    engine: ThermostatEngine,
    reader: Box<dyn TemperatureReader>,
    furnace: Box<dyn Actuator>,
    ac: Box<dyn Actuator>,
    fan: Box<dyn Actuator>,
    control: Option<JoinHandle<()>>,
    last_temp_emit_ms: Option<u64>,
}

impl Thermostat {
    pub fn new(config: ThermostatConfig, parts: ThermostatParts) -> Self {
        let engine = ThermostatEngine::new(config);
        let (mode, _) = watch::channel(engine.mode());
        let state = CoreState {
            engine,
            reader: parts.reader,
            furnace: parts.furnace,
            ac: parts.ac,
            fan: parts.fan,
            control: None,
            last_temp_emit_ms: None,
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                events: EventBus::new(),
                mode,
                epoch: Instant::now(),
            }),
        }
    }

    pub async fn start(&self) -> Result<EventStream, SensorError> {
        let mut state = self.shared.state.lock().await;
        state.detach_reader();

        let readings = state.reader.start()?;
        state.last_temp_emit_ms = None;

        let stream = self.shared.events.subscribe();
        self.shared
            .events
            .emit(ThermostatEvent::message(TOPIC_STATUS, STATUS_STARTED));

        let weak = Arc::downgrade(&self.shared);
        state.control = Some(tokio::spawn(control_loop(weak, readings)));

        info!(
            "thermostat started in {} mode, target {}",
            state.engine.mode(),
            state.engine.target()
        );
        Ok(stream)
    }

    pub async fn stop(&self) {
        let mut state = self.shared.state.lock().await;
        if state.control.is_none() {
            return;
        }
        state.detach_reader();

        let now_ms = self.shared.now_ms();
        let actions = state.engine.shutdown(now_ms);
        state.apply(actions, &self.shared);

        self.shared
            .events
            .emit(ThermostatEvent::message(TOPIC_STATUS, STATUS_STOPPED));
        self.shared.events.complete();
        info!("thermostat stopped");
    }

    pub async fn set_target(&self, value: f32) {
        let mut state = self.lock().await;
        let actions = state.engine.set_target(value);
        state.apply(actions, &self.shared);
    }

    pub async fn set_mode(&self, mode: Mode) {
        let mut state = self.lock().await;
        let now_ms = self.shared.now_ms();
        let actions = state.engine.set_mode(mode, now_ms);
        state.apply(actions, &self.shared);
    }

    pub async fn start_fan(&self) {
        let mut state = self.lock().await;
        let actions = state.engine.set_fan(true);
        state.apply(actions, &self.shared);
    }

    pub async fn stop_fan(&self) {
        let mut state = self.lock().await;
        let actions = state.engine.set_fan(false);
        state.apply(actions, &self.shared);
    }

    pub async fn is_running(&self) -> bool {
        self.lock().await.engine.is_running()
    }

    pub async fn is_started(&self) -> bool {
        self.lock().await.control.is_some()
    }

    pub async fn snapshot(&self) -> ThermostatSnapshot {
        self.lock().await.engine.snapshot()
    }

    pub fn subscribe(&self) -> EventStream {
        self.shared.events.subscribe()
    }

    pub fn watch_mode(&self) -> watch::Receiver<Mode> {
        self.shared.mode.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.events.listener_count()
    }

    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.shared.events.emit(ThermostatEvent::error(message));
    }

    async fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.shared.state.lock().await
    }
}

impl Shared {
    fn now_ms(&self) -> u64 {
        self.epoch
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    async fn on_reading(&self, reading: SampleReading) {
        let mut state = self.state.lock().await;
        let now_ms = self.now_ms();

        let emit_delay = state.engine.config().temp_emit_delay_ms;
        let due = state
            .last_temp_emit_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= emit_delay);
        if due {
            state.last_temp_emit_ms = Some(now_ms);
            self.events
                .emit(ThermostatEvent::reading(TOPIC_TEMPERATURE, reading));
        }

        state.engine.record_humidity(reading.humidity);
        let actions = state.engine.on_temperature(reading.temperature, now_ms);
        state.apply(actions, self);
    }
}

impl CoreState {
    fn detach_reader(&mut self) {
        self.reader.stop();
        if let Some(control) = self.control.take() {
            control.abort();
        }
    }

    fn actuator(&mut self, kind: ActuatorKind) -> &mut dyn Actuator {
        match kind {
            ActuatorKind::Furnace => self.furnace.as_mut(),
            ActuatorKind::Ac => self.ac.as_mut(),
            ActuatorKind::Fan => self.fan.as_mut(),
        }
    }

    fn apply(&mut self, actions: Vec<EngineAction>, shared: &Shared) {
        let events = &shared.events;
        for action in actions {
            match action {
                EngineAction::ActuatorOn(kind) => {
                    self.actuator(kind).start();
                    info!("{kind:?} on");
                    events.emit(ThermostatEvent::message(
                        kind.topic(),
                        kind.transition_label(true),
                    ));
                }
                EngineAction::ActuatorOff(kind) => {
                    self.actuator(kind).stop();
                    info!("{kind:?} off");
                    events.emit(ThermostatEvent::message(
                        kind.topic(),
                        kind.transition_label(false),
                    ));
                }
                EngineAction::TargetChanged(target) => {
                    info!("target set to {target}");
                    events.emit(ThermostatEvent::message(TOPIC_TARGET, target.to_string()));
                }
                EngineAction::ModeChanged(mode) => {
                    info!("mode set to {mode}");
                    shared.mode.send_replace(mode);
                    events.emit(ThermostatEvent::message(TOPIC_MODE, mode.as_str()));
                }
            }
        }
    }
}

async fn control_loop(shared: Weak<Shared>, mut readings: ReadingStream) {
    while let Some(result) = readings.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };

        match result {
            Ok(reading) => shared.on_reading(reading).await,
            Err(err) => warn!("temperature read failed: {err}"),
        }
    }
    debug!("control loop finished");
}

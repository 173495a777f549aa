use crate::{
    config::ThermostatConfig,
    topics::{TOPIC_AC, TOPIC_FAN, TOPIC_FURNACE},
    types::{Mode, ThermostatSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    Furnace,
    Ac,
    Fan,
}

impl ActuatorKind {
    pub fn for_mode(mode: Mode) -> Option<Self> {
        match mode {
            Mode::Heating => Some(Self::Furnace),
            Mode::Cooling => Some(Self::Ac),
            Mode::Off => None,
        }
    }

    pub fn topic(self) -> &'static str {
        match self {
            Self::Furnace => TOPIC_FURNACE,
            Self::Ac => TOPIC_AC,
            Self::Fan => TOPIC_FAN,
        }
    }

    pub fn transition_label(self, on: bool) -> &'static str {
        match (self, on) {
            (Self::Fan, true) => "start",
            (Self::Fan, false) => "stop",
            (_, true) => "on",
            (_, false) => "off",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    ActuatorOn(ActuatorKind),
    ActuatorOff(ActuatorKind),
    TargetChanged(f32),
    ModeChanged(Mode),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunWindow {
    pub started_at_ms: Option<u64>,
    pub stopped_at_ms: Option<u64>,
    pub overshoot_by: f32,
}

impl RunWindow {
    pub fn is_open(&self) -> bool {
        self.started_at_ms.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ThermostatEngine {
    config: ThermostatConfig,
    mode: Mode,
    target: f32,
    run: RunWindow,
    fan_on: bool,
    last_temperature: Option<f32>,
    last_humidity: Option<f32>,
}

impl ThermostatEngine {
    pub fn new(config: ThermostatConfig) -> Self {
        let mode = config.default_mode;
        let target = config.default_target(mode);
        Self {
            config,
            mode,
            target,
            run: RunWindow::default(),
            fan_on: false,
            last_temperature: None,
            last_humidity: None,
        }
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn run_window(&self) -> &RunWindow {
        &self.run
    }

    pub fn is_running(&self) -> bool {
        self.run.is_open()
    }

    pub fn is_fan_on(&self) -> bool {
        self.fan_on
    }

    pub fn current_actuator(&self) -> Option<ActuatorKind> {
        ActuatorKind::for_mode(self.mode)
    }

    pub fn snapshot(&self) -> ThermostatSnapshot {
        ThermostatSnapshot {
            mode: self.mode,
            target: self.target,
            running: self.is_running(),
            fan_on: self.fan_on,
            temperature: self.last_temperature,
            humidity: self.last_humidity,
        }
    }

    pub fn set_target(&mut self, value: f32) -> Vec<EngineAction> {
        if (value - self.target).abs() <= f32::EPSILON {
            return Vec::new();
        }

        self.target = self.config.target_range(self.mode).clamp(value);
        vec![EngineAction::TargetChanged(self.target)]
    }

    pub fn set_mode(&mut self, mode: Mode, now_ms: u64) -> Vec<EngineAction> {
        let mut actions = Vec::new();

        // Always release the running actuator before the current one is swapped out.
        self.try_stop(now_ms, &mut actions);

        self.mode = mode;
        let default_target = self.config.default_target(mode);
        actions.extend(self.set_target(default_target));
        actions.push(EngineAction::ModeChanged(mode));
        actions
    }

    pub fn set_fan(&mut self, on: bool) -> Vec<EngineAction> {
        self.fan_on = on;
        if on {
            vec![EngineAction::ActuatorOn(ActuatorKind::Fan)]
        } else {
            vec![EngineAction::ActuatorOff(ActuatorKind::Fan)]
        }
    }

    pub fn record_humidity(&mut self, humidity: Option<f32>) {
        self.last_humidity = humidity;
    }

    pub fn on_temperature(&mut self, temp: f32, now_ms: u64) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        self.last_temperature = Some(temp);

        match self.mode {
            Mode::Heating => {
                if temp <= self.target - self.config.dead_zone {
                    self.try_start(temp, now_ms, &mut actions);
                } else if temp >= self.target + self.run.overshoot_by {
                    self.try_stop(now_ms, &mut actions);
                }
            }
            Mode::Cooling => {
                if temp >= self.target + self.config.dead_zone {
                    self.try_start(temp, now_ms, &mut actions);
                } else if temp <= self.target - self.run.overshoot_by {
                    self.try_stop(now_ms, &mut actions);
                }
            }
            Mode::Off => {}
        }

        actions
    }

    pub fn shutdown(&mut self, now_ms: u64) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        self.try_stop(now_ms, &mut actions);
        actions
    }

    fn try_start(&mut self, temp: f32, now_ms: u64, actions: &mut Vec<EngineAction>) {
        let Some(actuator) = self.current_actuator() else {
            return;
        };

        if let Some(started) = self.run.started_at_ms {
            if now_ms.saturating_sub(started) > self.config.max_run_time_ms {
                self.try_stop(now_ms, actions);
            }
        }

        if self.is_running() {
            return;
        }

        // The very first run has nothing to rest from.
        let rested = self
            .run
            .stopped_at_ms
            .map(|stopped| now_ms.saturating_sub(stopped) >= self.config.min_delay_between_runs_ms)
            .unwrap_or(true);

        if rested {
            self.run.overshoot_by = (self.target - temp).abs().min(self.config.max_overshoot);
            self.run.started_at_ms = Some(now_ms);
            actions.push(EngineAction::ActuatorOn(actuator));
        }
    }

    fn try_stop(&mut self, now_ms: u64, actions: &mut Vec<EngineAction>) {
        if !self.is_running() {
            return;
        }
        let Some(actuator) = self.current_actuator() else {
            return;
        };

        self.run.started_at_ms = None;
        self.run.stopped_at_ms = Some(now_ms);
        actions.push(EngineAction::ActuatorOff(actuator));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::TargetRange;

    fn config() -> ThermostatConfig {
        ThermostatConfig {
            heating_range: TargetRange::new(60.0, 80.0),
            cooling_range: TargetRange::new(65.0, 85.0),
            default_mode: Mode::Heating,
            dead_zone: 2.0,
            max_overshoot: 3.0,
            max_run_time_ms: 10_000,
            min_delay_between_runs_ms: 5_000,
            sensor_poll_delay_ms: 1_000,
            temp_emit_delay_ms: 1_000,
        }
    }

    fn heating_at(target: f32) -> ThermostatEngine {
        let mut engine = ThermostatEngine::new(config());
        engine.set_target(target);
        engine
    }

    fn cooling_at(target: f32) -> ThermostatEngine {
        let mut engine = ThermostatEngine::new(config());
        engine.set_mode(Mode::Cooling, 0);
        engine.set_target(target);
        engine
    }

    #[test]
    fn starts_in_default_mode_with_default_target() {
        let engine = ThermostatEngine::new(config());
        assert_eq!(engine.mode(), Mode::Heating);
        assert_eq!(engine.target(), 60.0);
        assert!(!engine.is_running());
    }

    #[test]
    fn set_target_clamps_into_active_range() {
        let mut engine = ThermostatEngine::new(config());

        assert_eq!(engine.set_target(95.0), vec![EngineAction::TargetChanged(80.0)]);
        assert_eq!(engine.target(), 80.0);

        assert_eq!(engine.set_target(10.0), vec![EngineAction::TargetChanged(60.0)]);
        assert_eq!(engine.target(), 60.0);

        engine.set_mode(Mode::Cooling, 0);
        engine.set_target(50.0);
        assert_eq!(engine.target(), 65.0);
    }

    #[test]
    fn set_target_to_current_value_is_silent() {
        let mut engine = heating_at(70.0);
        assert!(engine.set_target(70.0).is_empty());
        assert_eq!(engine.target(), 70.0);
    }

    #[test]
    fn out_of_range_request_reports_once_even_when_clamp_is_unchanged() {
        let mut engine = heating_at(80.0);
        assert_eq!(engine.set_target(90.0), vec![EngineAction::TargetChanged(80.0)]);
        assert_eq!(engine.target(), 80.0);
    }

    #[test]
    fn heating_waits_for_dead_zone() {
        let mut engine = heating_at(70.0);

        for (i, temp) in [71.0, 70.0, 69.0, 68.5, 68.1].into_iter().enumerate() {
            assert!(engine.on_temperature(temp, i as u64 * 100).is_empty());
        }
        assert!(!engine.is_running());

        let actions = engine.on_temperature(68.0, 1_000);
        assert_eq!(actions, vec![EngineAction::ActuatorOn(ActuatorKind::Furnace)]);
        assert!(engine.is_running());
    }

    #[test]
    fn overshoot_is_proportional_and_capped() {
        let mut engine = heating_at(70.0);
        engine.on_temperature(67.5, 0);
        assert_eq!(engine.run_window().overshoot_by, 2.5);

        let mut engine = heating_at(70.0);
        engine.on_temperature(60.0, 0);
        assert_eq!(engine.run_window().overshoot_by, 3.0);
    }

    #[test]
    fn heating_stops_at_target_plus_overshoot() {
        let mut engine = heating_at(70.0);
        engine.on_temperature(68.0, 0);

        assert!(engine.on_temperature(70.0, 100).is_empty());
        assert!(engine.on_temperature(71.9, 200).is_empty());
        assert!(engine.is_running());

        let actions = engine.on_temperature(72.0, 300);
        assert_eq!(actions, vec![EngineAction::ActuatorOff(ActuatorKind::Furnace)]);
        assert!(!engine.is_running());
        assert_eq!(engine.run_window().stopped_at_ms, Some(300));
    }

    #[test]
    fn cooling_mirrors_heating() {
        let mut engine = cooling_at(70.0);

        assert!(engine.on_temperature(71.0, 0).is_empty());
        assert_eq!(
            engine.on_temperature(72.0, 100),
            vec![EngineAction::ActuatorOn(ActuatorKind::Ac)]
        );
        assert!(engine.on_temperature(69.0, 200).is_empty());
        assert_eq!(
            engine.on_temperature(68.0, 300),
            vec![EngineAction::ActuatorOff(ActuatorKind::Ac)]
        );
    }

    #[test]
    fn max_run_time_forces_stop_while_demand_persists() {
        let mut engine = heating_at(70.0);
        engine.on_temperature(65.0, 0);
        assert!(engine.is_running());

        assert!(engine.on_temperature(65.0, 9_999).is_empty());
        assert!(engine.on_temperature(65.0, 10_000).is_empty());
        assert!(engine.is_running());

        let actions = engine.on_temperature(65.0, 10_001);
        assert_eq!(actions, vec![EngineAction::ActuatorOff(ActuatorKind::Furnace)]);
        assert!(!engine.is_running());
    }

    #[test]
    fn min_delay_between_runs_blocks_restart() {
        let mut engine = heating_at(70.0);
        engine.on_temperature(65.0, 0);
        engine.on_temperature(65.0, 10_001);
        assert!(!engine.is_running());

        assert!(engine.on_temperature(65.0, 12_000).is_empty());
        assert!(engine.on_temperature(65.0, 15_000).is_empty());
        assert!(!engine.is_running());

        assert_eq!(
            engine.on_temperature(65.0, 15_001),
            vec![EngineAction::ActuatorOn(ActuatorKind::Furnace)]
        );
    }

    #[test]
    fn first_run_ignores_min_delay() {
        let mut engine = heating_at(70.0);
        assert_eq!(
            engine.on_temperature(65.0, 0),
            vec![EngineAction::ActuatorOn(ActuatorKind::Furnace)]
        );
    }

    #[test]
    fn overshoot_margin_is_kept_when_target_changes_mid_run() {
        let mut engine = heating_at(70.0);
        engine.on_temperature(68.0, 0);
        engine.set_target(72.0);

        assert_eq!(engine.run_window().overshoot_by, 2.0);
        assert!(engine.on_temperature(73.9, 100).is_empty());
        assert_eq!(
            engine.on_temperature(74.0, 200),
            vec![EngineAction::ActuatorOff(ActuatorKind::Furnace)]
        );
    }

    #[test]
    fn switching_to_cooling_stops_the_furnace_first() {
        let mut engine = heating_at(70.0);
        engine.on_temperature(65.0, 0);

        let actions = engine.set_mode(Mode::Cooling, 500);

        assert_eq!(
            actions,
            vec![
                EngineAction::ActuatorOff(ActuatorKind::Furnace),
                EngineAction::TargetChanged(85.0),
                EngineAction::ModeChanged(Mode::Cooling),
            ]
        );
        assert_eq!(engine.current_actuator(), Some(ActuatorKind::Ac));
        assert!(!engine.is_running());
    }

    #[test]
    fn off_mode_suppresses_starts() {
        let mut engine = heating_at(70.0);
        engine.on_temperature(65.0, 0);

        let actions = engine.set_mode(Mode::Off, 100);
        assert_eq!(actions.first(), Some(&EngineAction::ActuatorOff(ActuatorKind::Furnace)));
        assert_eq!(actions.last(), Some(&EngineAction::ModeChanged(Mode::Off)));

        for temp in [40.0, 100.0, 65.0] {
            assert!(engine.on_temperature(temp, 100_000).is_empty());
        }
        assert!(!engine.is_running());
        assert_eq!(engine.current_actuator(), None);
    }

    #[test]
    fn fan_is_independent_of_mode() {
        let mut engine = heating_at(70.0);
        engine.set_mode(Mode::Off, 0);

        assert_eq!(engine.set_fan(true), vec![EngineAction::ActuatorOn(ActuatorKind::Fan)]);
        assert!(engine.is_fan_on());
        assert_eq!(engine.set_fan(false), vec![EngineAction::ActuatorOff(ActuatorKind::Fan)]);
        assert!(!engine.snapshot().fan_on);
    }

    #[test]
    fn shutdown_releases_running_actuator_only() {
        let mut engine = heating_at(70.0);
        assert!(engine.shutdown(0).is_empty());

        engine.on_temperature(65.0, 0);
        assert_eq!(
            engine.shutdown(50),
            vec![EngineAction::ActuatorOff(ActuatorKind::Furnace)]
        );
        assert_eq!(engine.mode(), Mode::Heating);
        assert_eq!(engine.target(), 70.0);
    }

    #[test]
    fn transition_labels() {
        assert_eq!(ActuatorKind::Furnace.transition_label(true), "on");
        assert_eq!(ActuatorKind::Ac.transition_label(false), "off");
        assert_eq!(ActuatorKind::Fan.transition_label(true), "start");
        assert_eq!(ActuatorKind::Fan.topic(), TOPIC_FAN);
    }
}

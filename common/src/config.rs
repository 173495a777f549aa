use serde::{Deserialize, Serialize};

use crate::{
    schedule::{ScheduleConfig, ScheduleError},
    types::Mode,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} range is inverted: [{lo}, {hi}]")]
    InvertedRange { name: &'static str, lo: f32, hi: f32 },
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct TargetRange {
    pub lo: f32,
    pub hi: f32,
}

impl TargetRange {
    pub fn new(lo: f32, hi: f32) -> Self {
        Self { lo, hi }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.max(self.lo).min(self.hi)
    }

    pub fn contains(&self, value: f32) -> bool {
        (self.lo..=self.hi).contains(&value)
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if !self.lo.is_finite() || !self.hi.is_finite() {
            return Err(ConfigError::NotFinite(name));
        }
        if self.lo > self.hi {
            return Err(ConfigError::InvertedRange {
                name,
                lo: self.lo,
                hi: self.hi,
            });
        }
        Ok(())
    }
}

impl From<[f32; 2]> for TargetRange {
    fn from([lo, hi]: [f32; 2]) -> Self {
        Self { lo, hi }
    }
}

impl From<TargetRange> for [f32; 2] {
    fn from(range: TargetRange) -> Self {
        [range.lo, range.hi]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    #[serde(rename = "heatingTargetRange")]
    pub heating_range: TargetRange,
    #[serde(rename = "coolingTargetRange")]
    pub cooling_range: TargetRange,
    #[serde(rename = "defaultMode")]
    pub default_mode: Mode,
    #[serde(rename = "deadZone")]
    pub dead_zone: f32,
    #[serde(rename = "maxOvershootTemp")]
    pub max_overshoot: f32,
    #[serde(rename = "maxRunTime")]
    pub max_run_time_ms: u64,
    #[serde(rename = "minDelayBetweenRuns")]
    pub min_delay_between_runs_ms: u64,
    #[serde(rename = "tempSensorPollDelay")]
    pub sensor_poll_delay_ms: u64,
    #[serde(rename = "tempEmitDelay")]
    pub temp_emit_delay_ms: u64,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            heating_range: TargetRange::new(55.0, 80.0),
            cooling_range: TargetRange::new(65.0, 85.0),
            default_mode: Mode::Heating,
            dead_zone: 1.0,
            max_overshoot: 2.0,
            max_run_time_ms: 3_600_000,
            min_delay_between_runs_ms: 300_000,
            sensor_poll_delay_ms: 1_000,
            temp_emit_delay_ms: 5_000,
        }
    }
}

impl ThermostatConfig {
    pub fn target_range(&self, mode: Mode) -> TargetRange {
        match mode {
            Mode::Heating => self.heating_range,
            Mode::Cooling | Mode::Off => self.cooling_range,
        }
    }

    pub fn default_target(&self, mode: Mode) -> f32 {
        match mode {
            Mode::Heating => self.heating_range.lo,
            Mode::Cooling | Mode::Off => self.cooling_range.hi,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.heating_range.validate("heatingTargetRange")?;
        self.cooling_range.validate("coolingTargetRange")?;

        for (name, value) in [
            ("deadZone", self.dead_zone),
            ("maxOvershootTemp", self.max_overshoot),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite(name));
            }
            if value < 0.0 {
                return Err(ConfigError::Negative(name));
            }
        }

        if self.sensor_poll_delay_ms == 0 {
            return Err(ConfigError::Zero("tempSensorPollDelay"));
        }
        if self.max_run_time_ms == 0 {
            return Err(ConfigError::Zero("maxRunTime"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sim,
    Gpio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub backend: Backend,
    #[serde(rename = "sensorDevice")]
    pub sensor_device: String,
    #[serde(rename = "furnacePin")]
    pub furnace_pin: u32,
    #[serde(rename = "acPin")]
    pub ac_pin: u32,
    #[serde(rename = "fanPin")]
    pub fan_pin: u32,
    #[serde(rename = "invertRelay")]
    pub invert_relay: bool,
    #[serde(rename = "filterWindow")]
    pub filter_window: Option<usize>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sim,
            sensor_device: "/sys/bus/iio/devices/iio:device0".to_string(),
            furnace_pin: 17,
            ac_pin: 27,
            fan_pin: 22,
            invert_relay: true,
            filter_window: None,
        }
    }
}

impl HardwareConfig {
    pub fn window_size(&self) -> usize {
        let fallback = match self.backend {
            Backend::Sim => 3,
            Backend::Gpio => 5,
        };
        self.filter_window.unwrap_or(fallback).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(rename = "httpPort")]
    pub http_port: u16,
    #[serde(rename = "feedPort")]
    pub feed_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 3000,
            feed_port: 3001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: "climate-controller".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub schedule: ScheduleConfig,
    pub hardware: HardwareConfig,
    pub server: ServerConfig,
    pub broker: Option<BrokerConfig>,
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thermostat.validate()?;
        self.schedule.validate()?;
        Ok(())
    }
}

pub mod config;
pub mod event;
pub mod schedule;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use config::{
    Backend, BrokerConfig, ConfigError, HardwareConfig, RuntimeConfig, ServerConfig, TargetRange,
    ThermostatConfig,
};
pub use event::{EventKind, EventPayload, ThermostatEvent};
pub use schedule::{DayGroup, ScheduleConfig, ScheduleError, ScheduleItem, WeeklySchedule};
pub use thermostat::{ActuatorKind, EngineAction, RunWindow, ThermostatEngine};
pub use topics::*;
pub use types::{Mode, ParseModeError, SampleReading, ThermostatSnapshot};

use std::time::Duration;

use anyhow::Context;
use climate_common::{Backend, HardwareConfig, RuntimeConfig, ThermostatConfig};
use climate_sensor::{
    DriftRate, HardwareSource, MovingAverageFilter, PollingSensor, SampleSource, SimulatedSource,
    TemperatureReader,
};
use tracing::info;

use crate::{
    actuator::{GpioActuator, NoopActuator, SimActuator},
    thermostat::{Thermostat, ThermostatParts},
};

const SIM_START_TEMP: f32 = 70.0;
const SIM_DRIFT_PER_POLL: f32 = -0.2;

pub struct Controller {
    pub thermostat: Thermostat,
    pub drift: Option<DriftRate>,
}

pub fn build(runtime: &RuntimeConfig) -> anyhow::Result<Controller> {
    match runtime.hardware.backend {
        Backend::Sim => Ok(build_simulated(&runtime.thermostat, &runtime.hardware)),
        Backend::Gpio => build_hardware(&runtime.thermostat, &runtime.hardware),
    }
}

pub fn build_simulated(config: &ThermostatConfig, hardware: &HardwareConfig) -> Controller {
    let source = SimulatedSource::new(SIM_START_TEMP, SIM_DRIFT_PER_POLL);
    let drift = source.drift();

    let parts = ThermostatParts {
        reader: smoothed(source, config, hardware),
        furnace: Box::new(SimActuator::new("furnace", drift.clone())),
        ac: Box::new(SimActuator::new("ac", drift.clone())),
        fan: Box::new(NoopActuator),
    };

    info!(
        "simulated thermostat: start {SIM_START_TEMP}, drift {SIM_DRIFT_PER_POLL} per poll, window {}",
        hardware.window_size()
    );
    Controller {
        thermostat: Thermostat::new(config.clone(), parts),
        drift: Some(drift),
    }
}

pub fn build_hardware(
    config: &ThermostatConfig,
    hardware: &HardwareConfig,
) -> anyhow::Result<Controller> {
    let source = HardwareSource::open(&hardware.sensor_device)
        .context("failed to open temperature sensor")?;
    let furnace = GpioActuator::open(hardware.furnace_pin, hardware.invert_relay)
        .context("failed to open furnace relay")?;
    let ac = GpioActuator::open(hardware.ac_pin, hardware.invert_relay)
        .context("failed to open ac relay")?;
    let fan = GpioActuator::open(hardware.fan_pin, hardware.invert_relay)
        .context("failed to open fan relay")?;

    let parts = ThermostatParts {
        reader: smoothed(source, config, hardware),
        furnace: Box::new(furnace),
        ac: Box::new(ac),
        fan: Box::new(fan),
    };

    info!(
        "hardware thermostat: sensor {}, relays {}/{}/{}",
        hardware.sensor_device, hardware.furnace_pin, hardware.ac_pin, hardware.fan_pin
    );
    Ok(Controller {
        thermostat: Thermostat::new(config.clone(), parts),
        drift: None,
    })
}

fn smoothed<S: SampleSource>(
    source: S,
    config: &ThermostatConfig,
    hardware: &HardwareConfig,
) -> Box<dyn TemperatureReader> {
    let sensor = PollingSensor::new(source, Duration::from_millis(config.sensor_poll_delay_ms));
    Box::new(MovingAverageFilter::new(sensor, hardware.window_size()))
}

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use climate_sensor::DriftRate;
use tracing::{debug, error, info};

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("failed to export gpio {pin}: {source}")]
    Export {
        pin: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to configure gpio {pin} as output: {source}")]
    Configure {
        pin: u32,
        #[source]
        source: io::Error,
    },
}

/// A binary output: furnace relay, A/C relay, fan relay or nothing at all.
///
/// Calls are not idempotent; the controller only starts a stopped device and stops a started
/// one.
pub trait Actuator: Send {
    fn start(&mut self);
    fn stop(&mut self);
}

#[derive(Debug, Default)]
pub struct NoopActuator;

impl Actuator for NoopActuator {
    fn start(&mut self) {}
    fn stop(&mut self) {}
}

#[derive(Debug, Clone)]
pub struct SimActuator {
    name: &'static str,
    drift: DriftRate,
}

impl SimActuator {
    pub fn new(name: &'static str, drift: DriftRate) -> Self {
        Self { name, drift }
    }

    fn flip(&self) {
        self.drift.reverse();
        debug!("{} flipped drift to {:+.2}", self.name, self.drift.get());
    }
}

impl Actuator for SimActuator {
    fn start(&mut self) {
        self.flip();
    }

    fn stop(&mut self) {
        self.flip();
    }
}

#[derive(Debug)]
pub struct GpioActuator {
    pin: u32,
    invert: bool,
    value_path: PathBuf,
}

impl GpioActuator {
    pub fn open(pin: u32, invert: bool) -> Result<Self, ActuatorError> {
        Self::open_at(SYSFS_GPIO_ROOT, pin, invert)
    }

    pub fn open_at(root: impl AsRef<Path>, pin: u32, invert: bool) -> Result<Self, ActuatorError> {
        let root = root.as_ref();
        let line_dir = root.join(format!("gpio{pin}"));

        if !line_dir.exists() {
            fs::write(root.join("export"), pin.to_string())
                .map_err(|source| ActuatorError::Export { pin, source })?;
        }

        fs::write(line_dir.join("direction"), "out")
            .map_err(|source| ActuatorError::Configure { pin, source })?;

        let actuator = Self {
            pin,
            invert,
            value_path: line_dir.join("value"),
        };
        fs::write(&actuator.value_path, actuator.level(false))
            .map_err(|source| ActuatorError::Configure { pin, source })?;

        info!("gpio {pin} ready (inverted: {invert})");
        Ok(actuator)
    }

    fn level(&self, on: bool) -> &'static str {
        if on != self.invert {
            "1"
        } else {
            "0"
        }
    }

    fn drive(&mut self, on: bool) {
        let level = self.level(on);
        if let Err(err) = fs::write(&self.value_path, level) {
            error!("failed to drive gpio {} to {level}: {err}", self.pin);
        } else {
            debug!("gpio {} -> {level}", self.pin);
        }
    }
}

impl Actuator for GpioActuator {
    fn start(&mut self) {
        self.drive(true);
    }

    fn stop(&mut self) {
        self.drive(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpio_root(pin: u32) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join(format!("gpio{pin}"))).unwrap();
        root
    }

    fn value(root: &Path, pin: u32) -> String {
        fs::read_to_string(root.join(format!("gpio{pin}/value"))).unwrap()
    }

    #[test]
    fn open_configures_output_and_releases_relay() {
        let root = gpio_root(17);
        GpioActuator::open_at(root.path(), 17, false).unwrap();

        let direction = fs::read_to_string(root.path().join("gpio17/direction")).unwrap();
        assert_eq!(direction, "out");
        assert_eq!(value(root.path(), 17), "0");
    }

    #[test]
    fn active_high_relay() {
        let root = gpio_root(27);
        let mut relay = GpioActuator::open_at(root.path(), 27, false).unwrap();

        relay.start();
        assert_eq!(value(root.path(), 27), "1");
        relay.stop();
        assert_eq!(value(root.path(), 27), "0");
    }

    #[test]
    fn inverted_relay_starts_low() {
        let root = gpio_root(22);
        let mut relay = GpioActuator::open_at(root.path(), 22, true).unwrap();
        assert_eq!(value(root.path(), 22), "1");

        relay.start();
        assert_eq!(value(root.path(), 22), "0");
        relay.stop();
        assert_eq!(value(root.path(), 22), "1");
    }

    #[test]
    fn missing_gpio_line_is_fatal_at_open() {
        let root = tempfile::tempdir().unwrap();
        let err = GpioActuator::open_at(root.path().join("absent"), 5, false).unwrap_err();
        assert!(matches!(err, ActuatorError::Export { pin: 5, .. }));
    }

    #[test]
    fn sim_actuator_flips_drift() {
        let drift = DriftRate::new(-0.1);
        let mut furnace = SimActuator::new("furnace", drift.clone());

        furnace.start();
        assert_eq!(drift.get(), 0.1);
        furnace.stop();
        assert_eq!(drift.get(), -0.1);
    }
}

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use climate_common::SampleReading;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info};

use crate::SensorError;

/// A device that can produce one reading on demand.
pub trait SampleSource: Send + 'static {
    fn poll_once(&mut self) -> Result<SampleReading, SensorError>;
}

/// Always reports the same reading.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub SampleReading);

impl FixedSource {
    pub fn new(temperature: f32) -> Self {
        Self(SampleReading::temperature_only(temperature))
    }
}

impl SampleSource for FixedSource {
    fn poll_once(&mut self) -> Result<SampleReading, SensorError> {
        Ok(self.0)
    }
}

/// Signed per-poll temperature drift shared between a simulated sensor and the simulated
/// actuators that flip it.
#[derive(Debug, Clone)]
pub struct DriftRate(Arc<AtomicU32>);

impl DriftRate {
    pub fn new(rate: f32) -> Self {
        Self(Arc::new(AtomicU32::new(rate.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, rate: f32) {
        self.0.store(rate.to_bits(), Ordering::Release);
    }

    pub fn reverse(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((-f32::from_bits(bits)).to_bits())
            });
    }
}

pub struct SimulatedSource {
    current_temp: f32,
    humidity: f32,
    rate: DriftRate,
    rng: StdRng,
}

impl SimulatedSource {
    pub fn new(start_temp: f32, rate: f32) -> Self {
        Self::with_rng(start_temp, rate, StdRng::from_entropy())
    }

    pub fn with_seed(start_temp: f32, rate: f32, seed: u64) -> Self {
        Self::with_rng(start_temp, rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(start_temp: f32, rate: f32, rng: StdRng) -> Self {
        Self {
            current_temp: start_temp,
            humidity: 45.0,
            rate: DriftRate::new(rate),
            rng,
        }
    }

    pub fn drift(&self) -> DriftRate {
        self.rate.clone()
    }
}

impl SampleSource for SimulatedSource {
    fn poll_once(&mut self) -> Result<SampleReading, SensorError> {
        self.current_temp = round_tenth(self.current_temp + self.rate.get());
        self.humidity = round_tenth((self.humidity + self.rng.gen_range(-0.5..=0.5)).clamp(0.0, 100.0));

        Ok(SampleReading::new(self.current_temp, Some(self.humidity)))
    }
}

/// Linux IIO humidity/temperature sensor (e.g. a DHT11/DHT22 bound to the `dht11` kernel
/// driver) exposing milli-degree Celsius and milli-percent attributes.
#[derive(Debug)]
pub struct HardwareSource {
    temp_path: PathBuf,
    humidity_path: Option<PathBuf>,
}

impl HardwareSource {
    pub fn open(device_dir: impl AsRef<Path>) -> Result<Self, SensorError> {
        let device_dir = device_dir.as_ref();
        let temp_path = device_dir.join("in_temp_input");

        fs::metadata(&temp_path).map_err(|source| SensorError::Unavailable {
            path: temp_path.clone(),
            source,
        })?;

        let humidity_path = device_dir.join("in_humidityrelative_input");
        let humidity_path = humidity_path.exists().then_some(humidity_path);

        info!(
            "hardware sensor ready at {} (humidity {})",
            device_dir.display(),
            if humidity_path.is_some() { "available" } else { "not reported" }
        );

        Ok(Self {
            temp_path,
            humidity_path,
        })
    }
}

impl SampleSource for HardwareSource {
    fn poll_once(&mut self) -> Result<SampleReading, SensorError> {
        let temp_c = read_milli_units(&self.temp_path)?;
        let humidity = match &self.humidity_path {
            Some(path) => match read_milli_units(path) {
                Ok(value) => Some(value),
                Err(err) => {
                    debug!("humidity read skipped: {err}");
                    None
                }
            },
            None => None,
        };

        Ok(SampleReading::new(celsius_to_fahrenheit(temp_c), humidity))
    }
}

fn read_milli_units(path: &Path) -> Result<f32, SensorError> {
    let raw = fs::read_to_string(path).map_err(|source| SensorError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value = raw.trim().parse::<i64>().map_err(|_| SensorError::Parse {
        path: path.to_path_buf(),
        value: raw.trim().to_string(),
    })?;

    Ok(value as f32 / 1000.0)
}

pub fn celsius_to_fahrenheit(temp_c: f32) -> f32 {
    temp_c * 1.8 + 32.0
}

fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

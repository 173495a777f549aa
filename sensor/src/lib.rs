//! Temperature acquisition: raw sample sources, the self-rescheduling poll loop and the
//! moving-average smoothing stage that feeds the controller.

pub mod filter;
pub mod reader;
pub mod source;

pub use filter::{MovingAverage, MovingAverageFilter};
pub use reader::{PollingSensor, ReadingStream, SensorResult, TemperatureReader};
pub use source::{DriftRate, FixedSource, HardwareSource, SampleSource, SimulatedSource};

use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("sensor device {} unavailable: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unparseable value `{value}` from {}", path.display())]
    Parse { path: PathBuf, value: String },
    #[error("sensor is already running")]
    AlreadyRunning,
}

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[serde(alias = "heating", alias = "HEATING")]
    Heating,
    #[serde(alias = "cooling", alias = "COOLING")]
    Cooling,
    #[serde(alias = "off", alias = "OFF")]
    Off,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heating => "Heating",
            Self::Cooling => "Cooling",
            Self::Off => "Off",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode `{0}` (expected Heating, Cooling or Off)")]
pub struct ParseModeError(pub String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "heating" | "heat" => Ok(Self::Heating),
            "cooling" | "cool" => Ok(Self::Cooling),
            "off" => Ok(Self::Off),
            _ => Err(ParseModeError(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleReading {
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f32>,
}

impl SampleReading {
    pub fn new(temperature: f32, humidity: Option<f32>) -> Self {
        Self {
            temperature,
            humidity,
        }
    }

    pub fn temperature_only(temperature: f32) -> Self {
        Self::new(temperature, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThermostatSnapshot {
    pub mode: Mode,
    pub target: f32,
    pub running: bool,
    #[serde(rename = "fanOn")]
    pub fan_on: bool,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
}

use climate_common::Mode;

use crate::thermostat::Thermostat;

/// Remote request accepted by every adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetTarget(f32),
    SetMode(Mode),
    StartFan,
    StopFan,
}

/// Rejected input. The message is what listeners see on `thermostat/error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid set target call")]
    InvalidTarget,
    #[error("Invalid set mode call")]
    InvalidMode,
    #[error("Invalid set fan call")]
    InvalidFan,
    #[error("Invalid temp change per second call")]
    InvalidDriftRate,
}

impl Command {
    pub fn target(raw: Option<&str>) -> Result<Self, CommandError> {
        parse_finite(raw)
            .map(Self::SetTarget)
            .ok_or(CommandError::InvalidTarget)
    }

    pub fn mode(raw: Option<&str>) -> Result<Self, CommandError> {
        raw.and_then(|value| value.parse::<Mode>().ok())
            .map(Self::SetMode)
            .ok_or(CommandError::InvalidMode)
    }

    pub fn fan(raw: Option<&str>) -> Result<Self, CommandError> {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("start" | "on") => Ok(Self::StartFan),
            Some("stop" | "off") => Ok(Self::StopFan),
            _ => Err(CommandError::InvalidFan),
        }
    }

    pub async fn apply(self, thermostat: &Thermostat) {
        match self {
            Self::SetTarget(target) => thermostat.set_target(target).await,
            Self::SetMode(mode) => thermostat.set_mode(mode).await,
            Self::StartFan => thermostat.start_fan().await,
            Self::StopFan => thermostat.stop_fan().await,
        }
    }
}

/// Parses a finite number, rejecting `NaN` and infinities.
pub fn parse_finite(raw: Option<&str>) -> Option<f32> {
    raw?.trim()
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
}

//! Vehicle flight modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FlightError;

/// The fixed set of vehicle modes this platform drives.
///
/// An unrecognized mode name fails at parse time, before any message
/// reaches the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightMode {
    Stabilize,
    AltHold,
    Auto,
    /// Position-target navigation; the mode the patrol flies in.
    Guided,
    /// Station keeping; used while paused.
    Loiter,
    /// Return to launch.
    Rtl,
    Land,
}

impl FlightMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightMode::Stabilize => "STABILIZE",
            FlightMode::AltHold => "ALT_HOLD",
            FlightMode::Auto => "AUTO",
            FlightMode::Guided => "GUIDED",
            FlightMode::Loiter => "LOITER",
            FlightMode::Rtl => "RTL",
            FlightMode::Land => "LAND",
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlightMode {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STABILIZE" => Ok(FlightMode::Stabilize),
            "ALT_HOLD" => Ok(FlightMode::AltHold),
            "AUTO" => Ok(FlightMode::Auto),
            "GUIDED" => Ok(FlightMode::Guided),
            "LOITER" => Ok(FlightMode::Loiter),
            "RTL" => Ok(FlightMode::Rtl),
            "LAND" => Ok(FlightMode::Land),
            other => Err(FlightError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for mode in [
            FlightMode::Stabilize,
            FlightMode::AltHold,
            FlightMode::Auto,
            FlightMode::Guided,
            FlightMode::Loiter,
            FlightMode::Rtl,
            FlightMode::Land,
        ] {
            assert_eq!(mode.as_str().parse::<FlightMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("guided".parse::<FlightMode>().unwrap(), FlightMode::Guided);
    }

    #[test]
    fn test_unknown_mode_fails() {
        let err = "WARP".parse::<FlightMode>().unwrap_err();
        assert!(matches!(err, FlightError::UnknownMode(name) if name == "WARP"));
    }
}

// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::consts;

/// Inner and outer track rates of a turn.
///
/// The inner track runs at `inner` times the drive speed, the outer track
/// is derived from the inner track speed so the ratio between both tracks
/// stays `inner:outer`. A negative rate spins that track backwards.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "(f64, f64)")]
pub struct TurnRadius {
    inner: f64,
    outer: f64,
}

impl TurnRadius {
    /// Gentle curve used for manual turns.
    pub const DEFAULT: TurnRadius = TurnRadius {
        inner: 0.4,
        outer: 1.0,
    };

    /// Spin on the spot, used to turn away from an obstacle.
    pub const SHARP: TurnRadius = TurnRadius {
        inner: -0.6,
        outer: 0.6,
    };

    /// Construct a new turn radius.
    ///
    /// Returns `None` if the inner rate is zero or either rate is not finite.
    pub fn new(inner: f64, outer: f64) -> Option<Self> {
        if inner == 0.0 || !inner.is_finite() || !outer.is_finite() {
            None
        } else {
            Some(Self { inner, outer })
        }
    }

    #[inline]
    pub fn inner(&self) -> f64 {
        self.inner
    }

    #[inline]
    pub fn outer(&self) -> f64 {
        self.outer
    }
}

impl Default for TurnRadius {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<(f64, f64)> for TurnRadius {
    type Error = String;

    fn try_from((inner, outer): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(inner, outer).ok_or_else(|| format!("invalid turn radius ({}, {})", inner, outer))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MotorConfig {
    /// Serial device of the motor controller.
    pub device: PathBuf,
    /// Serial baud rate.
    pub baud_rate: usize,
    /// Swap forward and reverse on track M0.
    pub invert_m0: bool,
    /// Swap forward and reverse on track M1.
    pub invert_m1: bool,
    /// Query response timeout in milliseconds.
    pub timeout: u64,
}

impl MotorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/ttyAMA0"),
            baud_rate: 38_400,
            invert_m0: true,
            invert_m1: false,
            timeout: 100,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SensorConfig {
    /// BCM pin number of the front obstruction sensor.
    pub front_pin: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { front_pin: 4 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriveConfig {
    /// Base drive speed at startup.
    pub initial_speed: i16,
    /// Lowest inner track speed during a turn.
    pub min_turn_speed: i16,
    /// Radius of manual turns.
    pub turn_radius: TurnRadius,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            initial_speed: consts::DEFAULT_DRIVE_SPEED,
            min_turn_speed: consts::MIN_TURN_SPEED,
            turn_radius: TurnRadius::DEFAULT,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvasionConfig {
    /// Seconds to back off from an obstacle.
    pub reverse_duration: f64,
    /// Seconds to turn away from an obstacle.
    pub turn_duration: f64,
    /// Radius of the evasive turn.
    pub turn_radius: TurnRadius,
}

impl EvasionConfig {
    pub fn reverse_duration(&self) -> Duration {
        seconds(self.reverse_duration)
    }

    pub fn turn_duration(&self) -> Duration {
        seconds(self.turn_duration)
    }
}

impl Default for EvasionConfig {
    fn default() -> Self {
        Self {
            reverse_duration: 1.0,
            turn_duration: 1.0,
            turn_radius: TurnRadius::SHARP,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoverConfig {
    /// Poll interval in milliseconds.
    pub interval: u64,
    /// Evasive maneuver.
    pub evasion: EvasionConfig,
}

impl RoverConfig {
    /// Poll interval, bounded to keep the loop responsive without
    /// pegging a core.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.interval.clamp(10, 1000))
    }
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            interval: consts::ROVER_POLL_INTERVAL.as_millis() as u64,
            evasion: EvasionConfig::default(),
        }
    }
}

/// Convert seconds to a duration. Anything not strictly positive is zero,
/// values beyond the range of a duration saturate.
pub fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default)]
        drive: DriveConfig,
        #[serde(default)]
        rover: RoverConfig,
    }

    #[test]
    fn defaults() {
        let sample: Sample = toml::from_str("").unwrap();

        assert_eq!(sample.drive.initial_speed, 30);
        assert_eq!(sample.drive.min_turn_speed, 15);
        assert_eq!(sample.drive.turn_radius, TurnRadius::DEFAULT);
        assert_eq!(sample.rover.poll_interval(), Duration::from_millis(50));
        assert_eq!(sample.rover.evasion.turn_radius, TurnRadius::SHARP);
        assert_eq!(sample.rover.evasion.reverse_duration(), Duration::from_secs(1));
    }

    #[test]
    fn turn_radius_from_table() {
        let sample: Sample = toml::from_str(
            r#"
            [drive]
            turn_radius = [0.5, 1.5]

            [rover]
            interval = 5

            [rover.evasion]
            turn_radius = [-1.0, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(sample.drive.turn_radius.inner(), 0.5);
        assert_eq!(sample.drive.turn_radius.outer(), 1.5);
        assert_eq!(sample.rover.evasion.turn_radius.inner(), -1.0);
        assert_eq!(sample.rover.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn reject_zero_inner_rate() {
        let result: Result<Sample, _> = toml::from_str(
            r#"
            [drive]
            turn_radius = [0.0, 1.0]
            "#,
        );

        assert!(result.is_err());
        assert!(TurnRadius::new(0.0, 1.0).is_none());
    }

    #[test]
    fn seconds_not_positive() {
        assert_eq!(seconds(0.0), Duration::ZERO);
        assert_eq!(seconds(-2.0), Duration::ZERO);
        assert_eq!(seconds(f64::NAN), Duration::ZERO);
        assert_eq!(seconds(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn seconds_saturate() {
        assert_eq!(seconds(1e30), Duration::MAX);

        let config: EvasionConfig = toml::from_str(
            r#"
            reverse_duration = 1e30
            turn_duration = 2.0
            turn_radius = [-0.6, 0.6]
            "#,
        )
        .unwrap();
        assert_eq!(config.reverse_duration(), Duration::MAX);
    }
}

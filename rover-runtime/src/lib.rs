// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

//! The `rover` library provides the runtime for a dual-track hobby robot.
//!
//! The robot is driven by a serial dual motor controller and carries a single
//! obstruction sensor at the front. Motion is commanded through the
//! `DriveController`, either manually from a control surface or by the
//! autonomous `RovingLoop`, which drives forward until the sensor trips and
//! then runs the `EvasionStateMachine` to back off and turn away.
//!
//! All drive state lives behind a single lock. Timed turns are scheduled as
//! background tasks that re-acquire the lock on expiry, so a timer can never
//! act after a newer command has changed the robot state.

pub mod command;
pub mod config;
pub mod device;
pub mod robot;

mod error;

#[macro_use]
extern crate log;

pub use self::command::Command;
pub use self::config::*;
pub use self::error::{Error, Result};
pub use self::robot::Robot;

/// Rover runtime module containing various constants.
pub mod consts {
    use std::time::Duration;

    /// Rover runtime version.
    ///
    /// # Example
    ///
    /// ```
    /// use rover::consts::VERSION;
    ///
    /// println!("Rover runtime version: {}", VERSION);
    /// ```
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Default base drive speed.
    pub const DEFAULT_DRIVE_SPEED: i16 = 30;

    /// Lowest speed the inner track is driven at during a turn.
    ///
    /// Below this the tracks stall on carpet.
    pub const MIN_TURN_SPEED: i16 = 15;

    /// Largest speed magnitude the motor drivers accept.
    pub const MAX_SPEED: i16 = 255;

    /// Roving and evasion poll interval.
    pub const ROVER_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Maximum number of concurrent web control connections.
    pub const NETWORK_MAX_CLIENTS: usize = 8;
}

/// Read and deserialize a TOML configuration file.
///
/// Any parse error is reported as `InvalidData`.
pub fn from_file<P, T>(path: P) -> std::io::Result<T>
where
    P: AsRef<std::path::Path>,
    T: serde::de::DeserializeOwned,
{
    let contents = std::fs::read_to_string(path)?;

    toml::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

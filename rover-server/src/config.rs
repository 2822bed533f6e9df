// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use rover::{DriveConfig, MotorConfig, RoverConfig, SensorConfig};

#[derive(Clone, Debug, serde_derive::Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Network address to listen on.
    pub listen: String,
    /// Maximum number of connections.
    pub max_connections: usize,
    /// Camera stream shown on the main page.
    pub stream_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_owned(),
            max_connections: rover::consts::NETWORK_MAX_CLIENTS,
            stream_url: "http://127.0.0.1:8081/?action=stream".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, serde_derive::Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Enable simulation mode.
    pub enabled: bool,
    /// Chance per second that the simulated obstruction flips.
    pub obstacle_probability: f64,
}

#[derive(Clone, Debug, Default, serde_derive::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Motor controller configuration.
    pub motor: MotorConfig,
    /// Obstruction sensor configuration.
    pub sensor: SensorConfig,
    /// Drive configuration.
    pub drive: DriveConfig,
    /// Roving configuration.
    pub rover: RoverConfig,
    /// Server configuration.
    pub server: ServerConfig,
    /// Simulation configuration.
    pub simulation: SimulationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.motor.baud_rate, 38_400);
        assert!(config.motor.invert_m0);
        assert_eq!(config.sensor.front_pin, 4);
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.max_connections, 8);
        assert!(!config.simulation.enabled);
    }

    #[test]
    fn full_config() {
        let config: Config = toml::from_str(include_str!("../../rover.conf")).unwrap();

        assert_eq!(config.motor.device, std::path::Path::new("/dev/ttyAMA0"));
        assert_eq!(config.motor.timeout(), std::time::Duration::from_millis(100));
        assert_eq!(config.drive.initial_speed, 30);
        assert_eq!(config.drive.turn_radius, rover::TurnRadius::DEFAULT);
        assert_eq!(config.rover.interval, 50);
        assert_eq!(config.rover.evasion.turn_radius, rover::TurnRadius::SHARP);
        assert_eq!(config.server.max_connections, 4);
        assert_eq!(config.simulation.obstacle_probability, 0.1);
    }

    #[test]
    fn reject_invalid_turn_radius() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [drive]
            turn_radius = [0.0, 1.0]
            "#,
        );

        assert!(result.is_err());
    }
}

// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::sync::Arc;

use crate::{
    command::Command,
    config::{DriveConfig, RoverConfig},
    device::{MotorDriver, ObstructionSensor},
    Result,
};

mod drive;
mod evade;
mod rover;
mod timer;

pub use drive::{track_speeds, DriveController, RobotState, SharedDrive};
pub use evade::{EvasionStateMachine, Phase, Step};
pub use rover::RovingLoop;
pub use timer::{ActionToken, TimedAction};

/// The robot.
///
/// Ties the drive controller, the roving loop and the sensor together and
/// executes manual commands. Each command runs under a single acquisition
/// of the drive lock.
pub struct Robot<M, S> {
    drive: SharedDrive<M>,
    sensor: Arc<S>,
    rover: RovingLoop<M, S>,
}

impl<M, S> Robot<M, S>
where
    M: MotorDriver + 'static,
    S: ObstructionSensor,
{
    pub fn new(driver: M, sensor: S, drive: &DriveConfig, rover: &RoverConfig) -> Self {
        let sensor = Arc::new(sensor);
        let drive = DriveController::new(driver, drive);

        Self {
            rover: RovingLoop::new(drive.clone(), sensor.clone(), rover.clone()),
            drive,
            sensor,
        }
    }

    /// Seed the random turn direction of the evasive maneuver.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rover = self.rover.with_seed(seed);
        self
    }

    #[inline]
    pub fn drive(&self) -> &SharedDrive<M> {
        &self.drive
    }

    #[inline]
    pub fn sensor(&self) -> &Arc<S> {
        &self.sensor
    }

    #[inline]
    pub fn rover(&self) -> &RovingLoop<M, S> {
        &self.rover
    }

    /// Snapshot of the current robot state.
    pub async fn state(&self) -> RobotState {
        self.drive.lock().await.state().clone()
    }

    /// Execute a manual command and return the resulting state.
    ///
    /// Driving and turning end roving first. Turns run until stopped.
    pub async fn execute(&self, command: Command) -> Result<RobotState> {
        let mut drive = self.drive.lock().await;

        debug!("Execute command: {}", command);

        if command.is_manual_drive() {
            self.rover.stop_locked(&mut drive).await?;
        }

        match command {
            Command::Forward => drive.drive_forward().await?,
            Command::Backward => drive.drive_backward().await?,
            Command::Left => {
                let radius = drive.turn_radius();
                drive.turn_left(std::time::Duration::ZERO, radius).await?
            }
            Command::Right => {
                let radius = drive.turn_radius();
                drive.turn_right(std::time::Duration::ZERO, radius).await?
            }
            Command::Stop => {
                drive.stop().await?;
                self.rover.stop_locked(&mut drive).await?;
            }
            Command::SetSpeed(speed) => drive.set_speed(speed).await?,
            Command::ToggleRoving => {
                if drive.state().is_roving {
                    self.rover.stop_locked(&mut drive).await?;
                } else {
                    self.rover.start_locked(&mut drive).await?;
                }
            }
        }

        Ok(drive.state().clone())
    }

    /// Force both tracks to stop, regardless of the commanded state.
    pub async fn halt(&self) -> Result {
        self.drive.lock().await.halt().await
    }

    /// End roving, stop the robot and release the sensor.
    ///
    /// The sensor is released even if stopping fails. The first error is
    /// returned.
    pub async fn shutdown(&self) -> Result {
        let halted = {
            let mut drive = self.drive.lock().await;
            drive.end_roving();
            drive.halt().await
        };

        let released = self.sensor.clean_up();

        info!("Robot shut down");

        halted?;
        released?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        device::sim::{MotorCommand, SimMotorDriver, SimSensor},
        Error,
    };

    use super::*;

    fn robot() -> (Robot<SimMotorDriver, SimSensor>, SimMotorDriver, SimSensor) {
        let driver = SimMotorDriver::new();
        let sensor = SimSensor::new();
        let robot = Robot::new(
            driver.clone(),
            sensor.clone(),
            &DriveConfig::default(),
            &RoverConfig::default(),
        )
        .with_seed(1);
        (robot, driver, sensor)
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_roving_twice() {
        let (robot, _driver, _sensor) = robot();

        let state = robot.execute(Command::ToggleRoving).await.unwrap();
        assert!(state.is_roving);

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(robot.state().await.driving_forward);

        let state = robot.execute(Command::ToggleRoving).await.unwrap();
        assert!(!state.is_roving);
        assert!(state.stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_drive_ends_roving() {
        let (robot, driver, _sensor) = robot();

        robot.execute(Command::ToggleRoving).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        driver.take_commands();

        let state = robot.execute(Command::Left).await.unwrap();
        assert!(!state.is_roving);
        assert!(!state.stopped);
        assert_eq!(
            driver.take_commands(),
            vec![
                MotorCommand::SetSpeed(0),
                MotorCommand::Coast,
                MotorCommand::SetM0Speed(37),
                MotorCommand::SetM1Speed(15),
            ]
        );

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert!(driver.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_speed_keeps_roving() {
        let (robot, _driver, _sensor) = robot();

        robot.execute(Command::ToggleRoving).await.unwrap();
        let state = robot.execute(Command::SetSpeed(60)).await.unwrap();

        assert!(state.is_roving);
        assert_eq!(state.drive_speed, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_roving() {
        let (robot, _driver, _sensor) = robot();

        robot.execute(Command::ToggleRoving).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let state = robot.execute(Command::Stop).await.unwrap();
        assert!(!state.is_roving);
        assert!(state.stopped);
    }

    #[tokio::test]
    async fn shutdown_releases_sensor_on_failure() {
        let (robot, driver, sensor) = robot();

        robot.execute(Command::Forward).await.unwrap();
        driver.set_failure(true);

        assert!(matches!(robot.shutdown().await, Err(Error::Device(_))));
        assert!(sensor.is_released());
    }

    #[tokio::test]
    async fn shutdown_halts() {
        let (robot, driver, sensor) = robot();

        robot.shutdown().await.unwrap();

        assert_eq!(
            driver.commands(),
            vec![MotorCommand::SetSpeed(0), MotorCommand::Coast]
        );
        assert!(sensor.is_released());
    }
}

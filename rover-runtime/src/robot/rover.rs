// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    config::RoverConfig,
    device::{MotorDriver, ObstructionSensor},
    Result,
};

use super::{
    drive::{DriveController, SharedDrive},
    evade::EvasionStateMachine,
};

/// Autonomous obstacle avoiding drive.
///
/// While roving a background task drives forward whenever the robot is at
/// rest and the path is clear, and runs the evasive maneuver as soon as an
/// obstacle is detected. The roving state itself lives in the drive
/// controller so that starting and stopping is serialized with every other
/// drive command.
pub struct RovingLoop<M, S> {
    drive: SharedDrive<M>,
    sensor: Arc<S>,
    config: RoverConfig,
    seed: Option<u64>,
}

impl<M, S> RovingLoop<M, S>
where
    M: MotorDriver + 'static,
    S: ObstructionSensor,
{
    pub fn new(drive: SharedDrive<M>, sensor: Arc<S>, config: RoverConfig) -> Self {
        Self {
            drive,
            sensor,
            config,
            seed: None,
        }
    }

    /// Seed the random turn direction of the evasive maneuver.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Start roving. Does nothing if already roving.
    pub async fn start(&self) -> Result<bool> {
        let mut drive = self.drive.lock().await;
        self.start_locked(&mut drive).await
    }

    /// Stop roving and stop the robot. Does nothing if not roving.
    pub async fn stop(&self) -> Result {
        let mut drive = self.drive.lock().await;
        self.stop_locked(&mut drive).await
    }

    /// Start roving with the drive lock already held.
    ///
    /// The robot is stopped before the roving session takes over. Returns
    /// `true` if a new roving session was started.
    pub async fn start_locked(&self, drive: &mut DriveController<M>) -> Result<bool> {
        if drive.state().is_roving {
            return Ok(false);
        }

        info!("Start roving");

        drive.stop().await?;

        let session = drive.begin_roving();

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(session)),
            None => StdRng::from_entropy(),
        };

        let rover = Rover {
            drive: self.drive.clone(),
            sensor: self.sensor.clone(),
            evasion: EvasionStateMachine::new(self.config.evasion.clone(), rng),
            session,
            interval: self.config.poll_interval(),
        };

        tokio::spawn(rover.run());

        Ok(true)
    }

    /// Stop roving with the drive lock already held.
    pub async fn stop_locked(&self, drive: &mut DriveController<M>) -> Result {
        if !drive.state().is_roving {
            return Ok(());
        }

        info!("End roving");

        drive.end_roving();
        drive.stop().await
    }
}

/// Single roving session.
struct Rover<M, S> {
    drive: SharedDrive<M>,
    sensor: Arc<S>,
    evasion: EvasionStateMachine,
    session: u64,
    interval: Duration,
}

impl<M, S> Rover<M, S>
where
    M: MotorDriver + 'static,
    S: ObstructionSensor,
{
    async fn run(mut self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match self.tick().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!("Roving aborted: {}", e);

                    let mut drive = self.drive.lock().await;
                    if drive.is_roving_session(self.session) {
                        drive.end_roving();
                        if let Err(e) = drive.stop().await {
                            error!("Failed to stop after roving error: {}", e);
                        }
                    }
                    break;
                }
            }
        }

        debug!("Roving session {} ended", self.session);
    }

    /// Run one iteration. Returns `false` once the session has ended.
    async fn tick(&mut self) -> Result<bool> {
        let mut drive = self.drive.lock().await;
        if !drive.is_roving_session(self.session) {
            return Ok(false);
        }

        let obstructed = self.sensor.obstructed()?;

        if obstructed && !drive.state().is_evading {
            info!("Obstacle detected");

            drive.set_evading(true);
            drop(drive);

            return self
                .evasion
                .run(&self.drive, self.sensor.as_ref(), self.session, self.interval)
                .await;
        }

        if drive.state().stopped && !obstructed && !drive.state().is_evading {
            drive.drive_forward().await?;
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::DriveConfig,
        device::sim::{MotorCommand, SimMotorDriver, SimSensor},
    };

    use super::*;

    fn rover() -> (RovingLoop<SimMotorDriver, SimSensor>, SimMotorDriver, SimSensor) {
        let driver = SimMotorDriver::new();
        let sensor = SimSensor::new();
        let drive = DriveController::new(driver.clone(), &DriveConfig::default());
        let rover = RovingLoop::new(drive, Arc::new(sensor.clone()), RoverConfig::default())
            .with_seed(42);
        (rover, driver, sensor)
    }

    #[tokio::test(start_paused = true)]
    async fn drives_forward_when_clear() {
        let (rover, driver, _sensor) = rover();

        assert!(rover.start().await.unwrap());
        tokio::time::sleep(Duration::from_millis(200)).await;

        let drive = rover.drive.lock().await;
        assert!(drive.state().is_roving);
        assert!(drive.state().driving_forward);
        assert_eq!(driver.commands(), vec![MotorCommand::SetSpeed(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let (rover, driver, _sensor) = rover();

        assert!(rover.start().await.unwrap());
        assert!(!rover.start().await.unwrap());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(driver.commands(), vec![MotorCommand::SetSpeed(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_robot() {
        let (rover, driver, _sensor) = rover();

        rover.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        rover.stop().await.unwrap();

        {
            let drive = rover.drive.lock().await;
            assert!(!drive.state().is_roving);
            assert!(drive.state().stopped);
        }

        driver.take_commands();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(driver.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_stops_manual_motion() {
        let (rover, driver, _sensor) = rover();

        rover.drive.lock().await.drive_backward().await.unwrap();
        driver.take_commands();

        assert!(rover.start().await.unwrap());
        assert_eq!(
            driver.take_commands(),
            vec![MotorCommand::SetSpeed(0), MotorCommand::Coast]
        );

        tokio::time::sleep(Duration::from_millis(200)).await;

        let drive = rover.drive.lock().await;
        assert!(drive.state().driving_forward);
        assert!(!drive.state().driving_backward);
        assert_eq!(driver.speed(), (30, 30));
    }

    #[tokio::test]
    async fn stop_idle_is_noop() {
        let (rover, driver, _sensor) = rover();

        rover.stop().await.unwrap();
        assert!(driver.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn obstacle_triggers_reverse() {
        let (rover, driver, sensor) = rover();

        rover.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        sensor.set_obstructed(true);
        tokio::time::sleep(Duration::from_millis(200)).await;

        {
            let drive = rover.drive.lock().await;
            assert!(drive.state().is_evading);
            assert!(drive.state().driving_backward);
        }

        assert_eq!(
            driver.commands(),
            vec![MotorCommand::SetSpeed(30), MotorCommand::SetSpeed(-30)]
        );

        sensor.set_obstructed(false);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let drive = rover.drive.lock().await;
        assert!(drive.state().is_roving);
        assert!(!drive.state().is_evading);
        assert!(drive.state().driving_forward);
    }

    #[tokio::test(start_paused = true)]
    async fn sensor_failure_ends_roving() {
        let (rover, _driver, sensor) = rover();

        rover.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        sensor.clean_up().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let drive = rover.drive.lock().await;
        assert!(!drive.state().is_roving);
        assert!(drive.state().stopped);
    }
}

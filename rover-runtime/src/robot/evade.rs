// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::time::Duration;

use rand::{rngs::StdRng, Rng};

use crate::{
    config::EvasionConfig,
    device::{MotorDriver, ObstructionSensor},
    Result,
};

use super::drive::{DriveController, SharedDrive};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Back off from the obstacle.
    Reverse,
    /// Wait for the timed reverse to stop.
    Reversing,
    /// Check whether the obstacle is gone.
    ClearedObstacle,
    /// Turn away in a random direction.
    Turn,
    /// Wait for the timed turn to stop.
    Turning,
}

/// Outcome of a single step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Transitioned, take the next step right away.
    Next,
    /// Waiting for the robot to stop, poll again later.
    Wait,
    /// The maneuver is complete.
    Done,
}

/// Reverse then turn maneuver to escape an obstacle.
///
/// The reverse is retried for as long as the obstacle is still detected
/// after backing off.
pub struct EvasionStateMachine {
    phase: Phase,
    config: EvasionConfig,
    rng: StdRng,
    attempts: usize,
}

impl EvasionStateMachine {
    pub fn new(config: EvasionConfig, rng: StdRng) -> Self {
        Self {
            phase: Phase::Reverse,
            config,
            rng,
            attempts: 0,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of reverse maneuvers in the current evasion.
    #[inline]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    fn reset(&mut self) {
        self.phase = Phase::Reverse;
        self.attempts = 0;
    }

    fn transition(&mut self, phase: Phase) -> Step {
        trace!("Evasion {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        Step::Next
    }

    /// Advance the state machine by one step.
    pub async fn step<M, S>(&mut self, drive: &mut DriveController<M>, sensor: &S) -> Result<Step>
    where
        M: MotorDriver + 'static,
        S: ObstructionSensor + ?Sized,
    {
        match self.phase {
            Phase::Reverse => {
                self.attempts += 1;
                debug!("Evasion reverse, attempt {}", self.attempts);

                drive.drive_backward().await?;
                drive.schedule_stop(self.config.reverse_duration());

                Ok(self.transition(Phase::Reversing))
            }
            Phase::Reversing | Phase::Turning if !drive.state().stopped => Ok(Step::Wait),
            Phase::Reversing => Ok(self.transition(Phase::ClearedObstacle)),
            Phase::ClearedObstacle => {
                if sensor.obstructed()? {
                    debug!("Obstacle not cleared, reverse again");
                    Ok(self.transition(Phase::Reverse))
                } else {
                    Ok(self.transition(Phase::Turn))
                }
            }
            Phase::Turn => {
                let duration = self.config.turn_duration();
                let radius = self.config.turn_radius;

                if self.rng.gen_bool(0.5) {
                    debug!("Evasion turn left");
                    drive.turn_left(duration, radius).await?;
                } else {
                    debug!("Evasion turn right");
                    drive.turn_right(duration, radius).await?;
                }

                Ok(self.transition(Phase::Turning))
            }
            Phase::Turning => {
                info!("Obstacle evaded after {} reverse(s)", self.attempts);

                drive.set_evading(false);
                self.reset();

                Ok(Step::Done)
            }
        }
    }

    /// Run the maneuver to completion.
    ///
    /// The drive lock is taken for each step and released while waiting.
    /// Returns `false` if roving `session` ended before the maneuver
    /// completed.
    pub async fn run<M, S>(
        &mut self,
        drive: &SharedDrive<M>,
        sensor: &S,
        session: u64,
        poll_interval: Duration,
    ) -> Result<bool>
    where
        M: MotorDriver + 'static,
        S: ObstructionSensor + ?Sized,
    {
        self.reset();

        loop {
            let step = {
                let mut drive = drive.lock().await;
                if !drive.is_roving_session(session) {
                    debug!("Evasion interrupted in {:?}", self.phase);
                    self.reset();
                    return Ok(false);
                }

                self.step(&mut *drive, sensor).await?
            };

            match step {
                Step::Next => {}
                Step::Wait => tokio::time::sleep(poll_interval).await,
                Step::Done => return Ok(true),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use rand::SeedableRng;

    use crate::{
        config::DriveConfig,
        device::{
            sim::{MotorCommand, SimMotorDriver, SimSensor},
            ErrorKind,
        },
        Error,
    };

    use super::*;

    const POLL: Duration = Duration::from_millis(50);

    /// Sensor replaying a fixed sequence of readings, then reporting clear.
    struct ScriptedSensor(Mutex<VecDeque<bool>>);

    impl ScriptedSensor {
        fn new(readings: &[bool]) -> Self {
            Self(Mutex::new(readings.iter().copied().collect()))
        }
    }

    impl ObstructionSensor for ScriptedSensor {
        fn name(&self) -> String {
            "scripted".to_owned()
        }

        fn obstructed(&self) -> crate::device::Result<bool> {
            Ok(self.0.lock().unwrap().pop_front().unwrap_or(false))
        }

        fn clean_up(&self) -> crate::device::Result<()> {
            Ok(())
        }
    }

    fn setup() -> (SharedDrive<SimMotorDriver>, SimMotorDriver, u64) {
        let driver = SimMotorDriver::new();
        let drive = DriveController::new(driver.clone(), &DriveConfig::default());
        let session = drive.try_lock().unwrap().begin_roving();
        (drive, driver, session)
    }

    fn machine() -> EvasionStateMachine {
        EvasionStateMachine::new(EvasionConfig::default(), StdRng::seed_from_u64(7))
    }

    #[tokio::test(start_paused = true)]
    async fn reverse_first() {
        let (drive, driver, _) = setup();
        let sensor = SimSensor::new();
        sensor.set_obstructed(true);

        let mut evasion = machine();
        let mut drive = drive.lock().await;
        drive.set_evading(true);

        assert_eq!(evasion.step(&mut *drive, &sensor).await.unwrap(), Step::Next);
        assert_eq!(evasion.phase(), Phase::Reversing);
        assert_eq!(driver.commands(), vec![MotorCommand::SetSpeed(-30)]);
        assert_eq!(drive.state().drive_speed, 30);
        assert!(drive.state().driving_backward);
        assert!(drive.has_pending_timer());

        assert_eq!(evasion.step(&mut *drive, &sensor).await.unwrap(), Step::Wait);
        assert_eq!(evasion.phase(), Phase::Reversing);
    }

    #[tokio::test(start_paused = true)]
    async fn converges_once_cleared() {
        let (drive, driver, session) = setup();
        let sensor = ScriptedSensor::new(&[true, true]);

        drive.lock().await.set_evading(true);

        let mut evasion = machine();
        let completed = evasion.run(&drive, &sensor, session, POLL).await.unwrap();
        assert!(completed);

        let reverses = driver
            .commands()
            .into_iter()
            .filter(|c| *c == MotorCommand::SetSpeed(-30))
            .count();
        assert_eq!(reverses, 3);

        let drive = drive.lock().await;
        assert!(drive.state().stopped);
        assert!(!drive.state().is_evading);
        assert!(drive.state().is_roving);
        assert_eq!(evasion.phase(), Phase::Reverse);
    }

    #[tokio::test(start_paused = true)]
    async fn turns_with_sharp_radius() {
        let (drive, driver, session) = setup();
        let sensor = SimSensor::new();

        let mut evasion = machine();
        evasion.run(&drive, &sensor, session, POLL).await.unwrap();

        let turn: Vec<_> = driver
            .commands()
            .into_iter()
            .filter(|c| matches!(c, MotorCommand::SetM0Speed(_) | MotorCommand::SetM1Speed(_)))
            .collect();

        assert!(
            turn == vec![MotorCommand::SetM0Speed(15), MotorCommand::SetM1Speed(-15)]
                || turn == vec![MotorCommand::SetM0Speed(-15), MotorCommand::SetM1Speed(15)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_when_roving_ends() {
        let (drive, _driver, session) = setup();
        let sensor = Arc::new(SimSensor::new());
        sensor.set_obstructed(true);

        let task = {
            let drive = drive.clone();
            let sensor = sensor.clone();
            tokio::spawn(async move {
                let mut evasion = machine();
                evasion.run(&drive, &*sensor, session, POLL).await
            })
        };

        tokio::time::sleep(Duration::from_millis(2_500)).await;

        {
            let mut drive = drive.lock().await;
            drive.end_roving();
            drive.stop().await.unwrap();
        }

        let completed = task.await.unwrap().unwrap();
        assert!(!completed);
    }

    #[tokio::test(start_paused = true)]
    async fn sensor_failure_propagates() {
        let (drive, _driver, session) = setup();
        let sensor = SimSensor::new();
        sensor.clean_up().unwrap();

        let mut evasion = machine();
        let result = evasion.run(&drive, &sensor, session, POLL).await;

        match result {
            Err(Error::Device(e)) => assert_eq!(e.kind, ErrorKind::Unavailable),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

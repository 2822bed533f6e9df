// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

//! Simulated devices.
//!
//! Used when no hardware is attached and as test doubles.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use super::{Device, DeviceError, ErrorKind, MotorDriver, ObstructionSensor, Result};

/// Command as received by the simulated motor driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotorCommand {
    SetM0Speed(i16),
    SetM1Speed(i16),
    SetSpeed(i16),
    Coast,
}

#[derive(Default)]
struct MotorState {
    commands: Vec<MotorCommand>,
    speed: (i16, i16),
    fail: bool,
}

/// Simulated motor driver.
///
/// Every clone shares the same command log.
#[derive(Clone, Default)]
pub struct SimMotorDriver {
    state: Arc<Mutex<MotorState>>,
}

impl SimMotorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MotorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, command: MotorCommand) -> Result<()> {
        let mut state = self.state();

        if state.fail {
            return Err(DeviceError::new(
                "sim_motor",
                ErrorKind::Io(std::io::ErrorKind::BrokenPipe),
            ));
        }

        trace!("Simulated motor command {:?}", command);

        match command {
            MotorCommand::SetM0Speed(speed) => state.speed.0 = speed,
            MotorCommand::SetM1Speed(speed) => state.speed.1 = speed,
            MotorCommand::SetSpeed(speed) => state.speed = (speed, speed),
            MotorCommand::Coast => state.speed = (0, 0),
        }

        state.commands.push(command);

        Ok(())
    }

    /// All commands received so far.
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.state().commands.clone()
    }

    /// Return and forget all commands received so far.
    pub fn take_commands(&self) -> Vec<MotorCommand> {
        std::mem::take(&mut self.state().commands)
    }

    /// Current speed of tracks M0 and M1.
    pub fn speed(&self) -> (i16, i16) {
        self.state().speed
    }

    /// Fail every command from now on, or recover.
    pub fn set_failure(&self, fail: bool) {
        self.state().fail = fail;
    }
}

#[async_trait::async_trait]
impl Device for SimMotorDriver {
    fn name(&self) -> String {
        "sim_motor".to_owned()
    }
}

#[async_trait::async_trait]
impl MotorDriver for SimMotorDriver {
    async fn set_m0_speed(&mut self, speed: i16) -> Result<()> {
        self.apply(MotorCommand::SetM0Speed(speed))
    }

    async fn set_m1_speed(&mut self, speed: i16) -> Result<()> {
        self.apply(MotorCommand::SetM1Speed(speed))
    }

    async fn set_speed(&mut self, speed: i16) -> Result<()> {
        self.apply(MotorCommand::SetSpeed(speed))
    }

    async fn coast(&mut self) -> Result<()> {
        self.apply(MotorCommand::Coast)
    }
}

/// Simulated obstruction sensor.
///
/// Every clone shares the same flag.
#[derive(Clone, Default)]
pub struct SimSensor {
    obstructed: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl SimSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_obstructed(&self, obstructed: bool) {
        self.obstructed.store(obstructed, Ordering::SeqCst);
    }

    /// Flip the flag and return the new value.
    pub fn toggle(&self) -> bool {
        !self.obstructed.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl ObstructionSensor for SimSensor {
    fn name(&self) -> String {
        "sim_sensor".to_owned()
    }

    fn obstructed(&self) -> Result<bool> {
        if self.is_released() {
            return Err(DeviceError::unavailable(self.name()));
        }

        Ok(self.obstructed.load(Ordering::SeqCst))
    }

    fn clean_up(&self) -> Result<()> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn motor_records_commands() {
        let mut driver = SimMotorDriver::new();
        let observer = driver.clone();

        driver.set_m0_speed(15).await.unwrap();
        driver.set_m1_speed(37).await.unwrap();
        assert_eq!(observer.speed(), (15, 37));

        driver.coast().await.unwrap();
        assert_eq!(observer.speed(), (0, 0));

        assert_eq!(
            observer.take_commands(),
            vec![
                MotorCommand::SetM0Speed(15),
                MotorCommand::SetM1Speed(37),
                MotorCommand::Coast
            ]
        );
        assert!(observer.commands().is_empty());
    }

    #[tokio::test]
    async fn motor_failure() {
        let mut driver = SimMotorDriver::new();

        driver.set_failure(true);
        assert!(driver.set_speed(10).await.is_err());
        assert!(driver.commands().is_empty());

        driver.set_failure(false);
        assert!(driver.set_speed(10).await.is_ok());
    }

    #[test]
    fn sensor_release() {
        let sensor = SimSensor::new();

        assert!(!sensor.obstructed().unwrap());
        assert!(sensor.toggle());
        assert!(sensor.obstructed().unwrap());

        sensor.clean_up().unwrap();
        sensor.clean_up().unwrap();
        assert_eq!(sensor.obstructed().unwrap_err().kind, ErrorKind::Unavailable);
    }
}

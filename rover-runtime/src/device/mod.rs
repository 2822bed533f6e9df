// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

mod error;
mod gpio;
mod qik;
pub mod sim;

pub use error::{DeviceError, ErrorKind, Result};
pub use gpio::GpioSensor;
pub use qik::{ErrorFlags, Parameter, Qik, SetParameterResponse, Track};

/// Device trait.
#[async_trait::async_trait]
pub trait Device: Send {
    /// Return the device name.
    fn name(&self) -> String;

    /// Probe the device.
    ///
    /// Can be used to signal that the device is ready.
    /// Implementation is optional.
    async fn probe(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Dual track motor driver.
///
/// Speeds are signed, the sign is the direction of travel. The driver clamps
/// the magnitude to whatever range the hardware supports.
#[async_trait::async_trait]
pub trait MotorDriver: Device {
    /// Set the speed of track M0.
    async fn set_m0_speed(&mut self, speed: i16) -> Result<()>;

    /// Set the speed of track M1.
    async fn set_m1_speed(&mut self, speed: i16) -> Result<()>;

    /// Set both tracks to the same speed.
    async fn set_speed(&mut self, speed: i16) -> Result<()> {
        self.set_m0_speed(speed).await?;
        self.set_m1_speed(speed).await
    }

    /// Release both tracks.
    async fn coast(&mut self) -> Result<()>;
}

/// Obstruction sensor.
///
/// The obstruction flag is maintained by an independent producer, reading
/// it never blocks.
pub trait ObstructionSensor: Send + Sync + 'static {
    /// Return the sensor name.
    fn name(&self) -> String;

    /// Whether the path in front of the sensor is blocked.
    fn obstructed(&self) -> Result<bool>;

    /// Release the underlying resource.
    ///
    /// Calling this more than once is not an error.
    fn clean_up(&self) -> Result<()>;
}

// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use rppal::gpio::{Gpio, InputPin, Level, Trigger};

use super::{DeviceError, ErrorKind, ObstructionSensor, Result};

/// Infrared obstruction sensor on a GPIO pin.
///
/// The sensor output is open collector and pulled low when an object is in
/// range. Both edges are watched by an interrupt so the flag is always
/// current without polling the pin.
pub struct GpioSensor {
    pin_number: u8,
    pin: Mutex<Option<InputPin>>,
    obstructed: Arc<AtomicBool>,
}

impl GpioSensor {
    /// Claim the pin with BCM number `pin_number`.
    pub fn new(pin_number: u8) -> Result<Self> {
        let name = format!("gpio{}", pin_number);

        let gpio = Gpio::new().map_err(|e| from_gpio(&name, e))?;
        let mut pin = gpio
            .get(pin_number)
            .map_err(|e| from_gpio(&name, e))?
            .into_input_pullup();

        let obstructed = Arc::new(AtomicBool::new(pin.is_low()));

        let flag = obstructed.clone();
        pin.set_async_interrupt(Trigger::Both, move |level| {
            flag.store(level == Level::Low, Ordering::SeqCst);
        })
        .map_err(|e| from_gpio(&name, e))?;

        debug!(
            "Sensor on {} ready, initially {}",
            name,
            if obstructed.load(Ordering::SeqCst) {
                "obstructed"
            } else {
                "clear"
            }
        );

        Ok(Self {
            pin_number,
            pin: Mutex::new(Some(pin)),
            obstructed,
        })
    }
}

impl ObstructionSensor for GpioSensor {
    fn name(&self) -> String {
        format!("gpio{}", self.pin_number)
    }

    fn obstructed(&self) -> Result<bool> {
        let pin = self.pin.lock().unwrap_or_else(|e| e.into_inner());
        if pin.is_none() {
            return Err(DeviceError::unavailable(self.name()));
        }

        Ok(self.obstructed.load(Ordering::SeqCst))
    }

    fn clean_up(&self) -> Result<()> {
        let mut pin = self.pin.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(mut pin) = pin.take() {
            debug!("Release sensor on {}", self.name());

            pin.clear_async_interrupt()
                .map_err(|e| from_gpio(&self.name(), e))?;
        }

        Ok(())
    }
}

fn from_gpio(device: &str, error: rppal::gpio::Error) -> DeviceError {
    let kind = match error {
        rppal::gpio::Error::PinUsed(pin) => ErrorKind::NoSuchDevice(format!("gpio{}", pin)),
        rppal::gpio::Error::PermissionDenied(_) => {
            ErrorKind::Io(std::io::ErrorKind::PermissionDenied)
        }
        rppal::gpio::Error::Io(e) => ErrorKind::Io(e.kind()),
        e => ErrorKind::Other(e.to_string()),
    };

    DeviceError::new(device, kind)
}

// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

//! Serial TTY driver.
//!
//! The motor controller is attached over a plain UART. This crate opens the
//! TTY in raw 8N1 mode, claims it exclusively and hands out an asynchronous
//! port which implements the tokio I/O traits.

mod builder;
mod error;
mod port;

pub use builder::Builder;
pub use error::{Error, ErrorKind, Result};
pub use port::Uart;

/// Serial port baud rates.
///
/// Only the standard rates are supported. Most small motor controllers
/// auto-detect one of these on the first byte they receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaudRate {
    /// 1200 baud.
    Baud1200,
    /// 2400 baud.
    Baud2400,
    /// 4800 baud.
    Baud4800,
    /// 9600 baud.
    Baud9600,
    /// 19,200 baud.
    Baud19200,
    /// 38,400 baud.
    Baud38400,
    /// 57,600 baud.
    Baud57600,
    /// 115,200 baud.
    Baud115200,
}

impl BaudRate {
    /// Creates a `BaudRate` for a particular speed.
    ///
    /// ## Example
    ///
    /// ```
    /// # use rover_serial::BaudRate;
    /// assert_eq!(BaudRate::Baud9600, BaudRate::from_speed(9600).unwrap());
    /// assert_eq!(BaudRate::Baud38400, BaudRate::from_speed(38400).unwrap());
    /// assert!(BaudRate::from_speed(4_000_000).is_err());
    /// ```
    pub fn from_speed(speed: usize) -> Result<BaudRate> {
        match speed {
            1200 => Ok(BaudRate::Baud1200),
            2400 => Ok(BaudRate::Baud2400),
            4800 => Ok(BaudRate::Baud4800),
            9600 => Ok(BaudRate::Baud9600),
            19200 => Ok(BaudRate::Baud19200),
            38400 => Ok(BaudRate::Baud38400),
            57600 => Ok(BaudRate::Baud57600),
            115200 => Ok(BaudRate::Baud115200),
            n => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("unsupported baud rate: {}", n),
            )),
        }
    }

    /// Returns the baud rate as an integer.
    ///
    /// ## Example
    ///
    /// ```
    /// # use rover_serial::BaudRate;
    /// assert_eq!(38400, BaudRate::Baud38400.speed());
    /// ```
    pub fn speed(&self) -> usize {
        match *self {
            BaudRate::Baud1200 => 1200,
            BaudRate::Baud2400 => 2400,
            BaudRate::Baud4800 => 4800,
            BaudRate::Baud9600 => 9600,
            BaudRate::Baud19200 => 19200,
            BaudRate::Baud38400 => 38400,
            BaudRate::Baud57600 => 57600,
            BaudRate::Baud115200 => 115200,
        }
    }
}

impl std::fmt::Display for BaudRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} baud", self.speed())
    }
}

/// Start building a serial port for the device at `path`.
pub fn builder(path: &std::path::Path) -> Result<Builder> {
    Builder::new(path)
}

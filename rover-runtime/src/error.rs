// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{error, fmt};

use crate::device::DeviceError;

pub type Result<T = ()> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Hardware I/O failed. The commanded robot state is unknown.
    Device(DeviceError),
    /// The control surface issued a verb the robot does not know.
    UnknownCommand(String),
    /// The speed argument could not be interpreted.
    InvalidSpeed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Device(e) => write!(f, "{}", e),
            Error::UnknownCommand(verb) => write!(f, "unknown command: {}", verb),
            Error::InvalidSpeed(value) => write!(f, "invalid speed: {}", value),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for Error {
    fn from(value: DeviceError) -> Self {
        Error::Device(value)
    }
}

// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{error, fmt, io};

pub type Result<T = ()> = std::result::Result<T, DeviceError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The device is not available.
    ///
    /// This could indicate that the device is in use by another process or is
    /// not connected to the host.
    NoSuchDevice(String),

    /// The device did not communicate within the given time limit.
    ///
    /// This does not indicate any error on the device side per se. The timeout
    /// duration may have been lower than nominal communication.
    Timeout,

    /// One or multiple parameters were incorrect.
    InvalidInput,

    /// The device was released and can no longer be used.
    Unavailable,

    /// An I/O error occured.
    ///
    /// The type of I/O error is determined by the inner `io::ErrorKind`.
    Io(io::ErrorKind),

    /// Device specific failure.
    Other(String),
}

#[derive(Debug, Clone)]
pub struct DeviceError {
    /// Device name.
    pub device: String,
    /// Error kind.
    pub kind: ErrorKind,
}

impl DeviceError {
    pub fn new(device: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            device: device.into(),
            kind,
        }
    }

    pub(crate) fn timeout(device: impl Into<String>) -> Self {
        Self::new(device, ErrorKind::Timeout)
    }

    pub(crate) fn unavailable(device: impl Into<String>) -> Self {
        Self::new(device, ErrorKind::Unavailable)
    }

    pub(crate) fn from_io(device: impl Into<String>, error: io::Error) -> Self {
        Self::new(device, ErrorKind::Io(error.kind()))
    }

    /// Map error from `rover_serial::Error` onto device error.
    pub(crate) fn from_serial(
        device: impl Into<String>,
        path: &std::path::Path,
        error: rover_serial::Error,
    ) -> Self {
        Self::new(
            device,
            match error.kind() {
                rover_serial::ErrorKind::NoDevice => {
                    ErrorKind::NoSuchDevice(path.display().to_string())
                }
                rover_serial::ErrorKind::InvalidInput => ErrorKind::InvalidInput,
                rover_serial::ErrorKind::Io(kind) => ErrorKind::Io(kind),
            },
        )
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::NoSuchDevice(resource) => {
                write!(f, "{}: no such device: {}", self.device, resource)
            }
            ErrorKind::Timeout => write!(f, "{}: communication timeout", self.device),
            ErrorKind::InvalidInput => write!(f, "{}: invalid device parameters", self.device),
            ErrorKind::Unavailable => write!(f, "{}: device was released", self.device),
            ErrorKind::Io(e) => write!(f, "{}: io error: {:?}", self.device, e),
            ErrorKind::Other(e) => write!(f, "{}: {}", self.device, e),
        }
    }
}

impl error::Error for DeviceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_error_mapping() {
        let path = std::path::Path::new("/dev/ttyAMA0");

        let error = DeviceError::from_serial(
            "qik",
            path,
            rover_serial::Error::new(rover_serial::ErrorKind::NoDevice, "busy"),
        );
        assert_eq!(error.kind, ErrorKind::NoSuchDevice("/dev/ttyAMA0".to_owned()));
        assert_eq!(error.to_string(), "qik: no such device: /dev/ttyAMA0");

        let error = DeviceError::from_serial(
            "qik",
            path,
            rover_serial::Error::new(
                rover_serial::ErrorKind::Io(io::ErrorKind::BrokenPipe),
                "gone",
            ),
        );
        assert_eq!(error.kind, ErrorKind::Io(io::ErrorKind::BrokenPipe));
    }
}

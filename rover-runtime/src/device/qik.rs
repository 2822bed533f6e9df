// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{fmt, time::Duration};

use rover_serial::{BaudRate, Uart};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::MotorConfig;

use super::{Device, DeviceError, ErrorKind, MotorDriver, Result};

const DEVICE_NAME: &str = "qik";

/// Baud rate auto detect byte.
const CMD_AUTODETECT: u8 = 0xaa;
const CMD_FIRMWARE_VERSION: u8 = 0x81;
const CMD_ERROR_BYTE: u8 = 0x82;
const CMD_GET_PARAMETER: u8 = 0x83;
const CMD_SET_PARAMETER: u8 = 0x84;
const CMD_M0_COAST: u8 = 0x86;
const CMD_M1_COAST: u8 = 0x87;

/// Set parameter confirmation trailer.
const SET_PARAMETER_TRAILER: [u8; 2] = [0x55, 0x2a];

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Track {
    M0,
    M1,
}

impl Track {
    /// The 7-bit speed command. The 8-bit variant is the next opcode.
    fn command(&self, reverse: bool) -> u8 {
        match (self, reverse) {
            (Track::M0, false) => 0x88,
            (Track::M0, true) => 0x8a,
            (Track::M1, false) => 0x8c,
            (Track::M1, true) => 0x8e,
        }
    }
}

/// Encode a signed speed into a motor command.
///
/// The magnitude is clamped to 255. Magnitudes above 127 do not fit the
/// 7-bit payload and are sent with the 8-bit command instead.
pub(crate) fn encode_speed(track: Track, speed: i16, invert: bool) -> [u8; 2] {
    let magnitude = speed.unsigned_abs().min(255) as u8;
    let command = track.command((speed < 0) != invert);

    if magnitude > 127 {
        [command + 1, magnitude - 128]
    } else {
        [command, magnitude]
    }
}

/// Motor controller error state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorFlags(u8);

impl ErrorFlags {
    pub fn from_bits(value: u8) -> Self {
        Self(value)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn data_overrun(&self) -> bool {
        self.0 & (1 << 3) != 0
    }

    pub fn frame(&self) -> bool {
        self.0 & (1 << 4) != 0
    }

    pub fn crc(&self) -> bool {
        self.0 & (1 << 5) != 0
    }

    pub fn format(&self) -> bool {
        self.0 & (1 << 6) != 0
    }

    pub fn timeout(&self) -> bool {
        self.0 & (1 << 7) != 0
    }

    pub fn is_empty(&self) -> bool {
        !(self.data_overrun() || self.frame() || self.crc() || self.format() || self.timeout())
    }
}

impl fmt::Display for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }

        let flags = [
            (self.data_overrun(), "data overrun"),
            (self.frame(), "frame"),
            (self.crc(), "crc"),
            (self.format(), "format"),
            (self.timeout(), "timeout"),
        ];

        let names: Vec<&str> = flags
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect();

        write!(f, "{}", names.join(", "))
    }
}

/// Controller configuration parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Parameter {
    DeviceId = 0,
    Pwm = 1,
    ShutdownOnError = 2,
    SerialTimeout = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SetParameterResponse {
    Ok,
    BadParameter,
    BadValue,
}

impl TryFrom<u8> for SetParameterResponse {
    type Error = DeviceError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(SetParameterResponse::Ok),
            1 => Ok(SetParameterResponse::BadParameter),
            2 => Ok(SetParameterResponse::BadValue),
            _ => Err(DeviceError::new(
                DEVICE_NAME,
                ErrorKind::Other(format!("unexpected response 0x{:02x}", value)),
            )),
        }
    }
}

/// Pololu Qik dual serial motor controller.
///
/// Any byte stream will do as the transport, in production this is the
/// serial port the controller is wired to.
pub struct Qik<T> {
    port: T,
    invert: [bool; 2],
    timeout: Duration,
}

impl Qik<Uart> {
    /// Open the motor controller on a serial port.
    pub fn open(config: &MotorConfig) -> Result<Self> {
        let baud_rate = BaudRate::from_speed(config.baud_rate)
            .map_err(|e| DeviceError::from_serial(DEVICE_NAME, &config.device, e))?;

        let port = Uart::open(&config.device, baud_rate)
            .map_err(|e| DeviceError::from_serial(DEVICE_NAME, &config.device, e))?;

        Ok(Self::new(port)
            .invert(config.invert_m0, config.invert_m1)
            .timeout(config.timeout()))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Qik<T> {
    pub fn new(port: T) -> Self {
        Self {
            port,
            invert: [false, false],
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Swap forward and reverse per track.
    pub fn invert(mut self, m0: bool, m1: bool) -> Self {
        self.invert = [m0, m1];
        self
    }

    /// Time to wait for a query response.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.port
            .write_all(buf)
            .await
            .map_err(|e| DeviceError::from_io(DEVICE_NAME, e))?;

        self.port
            .flush()
            .await
            .map_err(|e| DeviceError::from_io(DEVICE_NAME, e))
    }

    async fn query(&mut self, buf: &[u8]) -> Result<u8> {
        self.write(buf).await?;

        match tokio::time::timeout(self.timeout, self.port.read_u8()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DeviceError::from_io(DEVICE_NAME, e)),
            Err(_) => Err(DeviceError::timeout(DEVICE_NAME)),
        }
    }

    async fn set_track_speed(&mut self, track: Track, speed: i16) -> Result<()> {
        let invert = match track {
            Track::M0 => self.invert[0],
            Track::M1 => self.invert[1],
        };

        trace!("{:?} speed {}", track, speed);

        self.write(&encode_speed(track, speed, invert)).await
    }

    /// Controller firmware version.
    pub async fn firmware_version(&mut self) -> Result<u8> {
        self.query(&[CMD_FIRMWARE_VERSION]).await
    }

    /// Read and clear the controller error flags.
    pub async fn error_flags(&mut self) -> Result<ErrorFlags> {
        self.query(&[CMD_ERROR_BYTE])
            .await
            .map(ErrorFlags::from_bits)
    }

    pub async fn parameter(&mut self, parameter: Parameter) -> Result<u8> {
        self.query(&[CMD_GET_PARAMETER, parameter as u8]).await
    }

    /// Write a configuration parameter.
    ///
    /// The new value takes effect after the controller is power cycled.
    pub async fn set_parameter(
        &mut self,
        parameter: Parameter,
        value: u8,
    ) -> Result<SetParameterResponse> {
        if value > 127 {
            return Err(DeviceError::new(DEVICE_NAME, ErrorKind::InvalidInput));
        }

        let response = self
            .query(&[
                CMD_SET_PARAMETER,
                parameter as u8,
                value,
                SET_PARAMETER_TRAILER[0],
                SET_PARAMETER_TRAILER[1],
            ])
            .await?;

        SetParameterResponse::try_from(response)
    }
}

#[async_trait::async_trait]
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Device for Qik<T> {
    fn name(&self) -> String {
        DEVICE_NAME.to_owned()
    }

    /// Send the baud rate detect byte.
    ///
    /// The controller locks onto the baud rate of the first byte it receives.
    async fn probe(&mut self) -> Result<()> {
        self.write(&[CMD_AUTODETECT]).await
    }
}

#[async_trait::async_trait]
impl<T: AsyncRead + AsyncWrite + Unpin + Send> MotorDriver for Qik<T> {
    async fn set_m0_speed(&mut self, speed: i16) -> Result<()> {
        self.set_track_speed(Track::M0, speed).await
    }

    async fn set_m1_speed(&mut self, speed: i16) -> Result<()> {
        self.set_track_speed(Track::M1, speed).await
    }

    async fn coast(&mut self) -> Result<()> {
        self.write(&[CMD_M0_COAST]).await?;
        self.write(&[CMD_M1_COAST]).await
    }
}

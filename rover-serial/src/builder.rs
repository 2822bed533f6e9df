// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{
    ffi::CString,
    os::unix::prelude::{OsStrExt, RawFd},
    path::Path,
};

use libc::EINVAL;
use termios::{tcflush, tcsetattr, Termios};

use crate::{error, BaudRate};

/// Serial port builder.
///
/// The device is opened when the builder is created and configured in raw
/// 8N1 mode without flow control. The settings are only written to the
/// device on `build`, which also claims the device exclusively.
pub struct Builder {
    fd: RawFd,
    termios: Termios,
}

impl Builder {
    pub(crate) fn new(path: &Path) -> super::Result<Self> {
        use libc::{O_NOCTTY, O_NONBLOCK, O_RDWR};

        let cstr = match CString::new(path.as_os_str().as_bytes()) {
            Ok(s) => s,
            Err(_) => return Err(error::from_raw_os_error(EINVAL)),
        };

        let fd = unsafe { libc::open(cstr.as_ptr(), O_RDWR | O_NOCTTY | O_NONBLOCK, 0) };
        if fd < 0 {
            return Err(error::last_os_error());
        }

        match Self::from_fd(fd) {
            Ok(builder) => Ok(builder),
            Err(e) => {
                unsafe { libc::close(fd) };
                Err(e)
            }
        }
    }

    fn from_fd(fd: RawFd) -> super::Result<Self> {
        use libc::{
            CLOCAL, CREAD, CRTSCTS, CS8, CSIZE, CSTOPB, ECHO, ECHOE, ECHOK, ECHONL, ICANON, ICRNL,
            IEXTEN, IGNBRK, IGNCR, IGNPAR, INLCR, INPCK, ISIG, IXOFF, IXON, OPOST, PARENB, PARODD,
            VMIN, VTIME,
        };

        let mut termios = Termios::from_fd(fd)?;

        // Raw binary access, no line discipline.
        termios.c_iflag &= !(INLCR | IGNCR | ICRNL | IGNBRK);
        termios.c_oflag &= !OPOST;
        termios.c_cflag |= CREAD | CLOCAL;
        termios.c_lflag &= !(ICANON | ECHO | ECHOE | ECHOK | ECHONL | ISIG | IEXTEN);

        // 8 data bits, no parity, one stop bit.
        termios.c_cflag &= !CSIZE;
        termios.c_cflag |= CS8;
        termios.c_cflag &= !(PARENB | PARODD | CSTOPB);
        termios.c_iflag &= !INPCK;
        termios.c_iflag |= IGNPAR;

        // No flow control.
        termios.c_iflag &= !(IXON | IXOFF);
        termios.c_cflag &= !CRTSCTS;

        termios.c_cc[VMIN] = 1;
        termios.c_cc[VTIME] = 0;

        Ok(Self { fd, termios })
    }

    pub fn set_baud_rate(mut self, baud_rate: BaudRate) -> super::Result<Self> {
        use termios::os::target::{B115200, B57600};
        use termios::{cfsetspeed, B1200, B19200, B2400, B38400, B4800, B9600};

        let baud = match baud_rate {
            BaudRate::Baud1200 => B1200,
            BaudRate::Baud2400 => B2400,
            BaudRate::Baud4800 => B4800,
            BaudRate::Baud9600 => B9600,
            BaudRate::Baud19200 => B19200,
            BaudRate::Baud38400 => B38400,
            BaudRate::Baud57600 => B57600,
            BaudRate::Baud115200 => B115200,
        };

        cfsetspeed(&mut self.termios, baud)?;

        Ok(self)
    }

    pub fn build(mut self) -> super::Result<crate::Uart> {
        use libc::{ioctl, TCIOFLUSH, TCSANOW, TIOCEXCL};

        // Owned by the port from here on.
        let inner = crate::port::Descriptor(std::mem::replace(&mut self.fd, -1));

        let ret = unsafe { ioctl(inner.0, TIOCEXCL) };
        if ret < 0 {
            return Err(error::last_os_error());
        }

        tcsetattr(inner.0, TCSANOW, &self.termios)?;

        // Drop whatever the controller sent before we were listening.
        tcflush(inner.0, TCIOFLUSH)?;

        crate::Uart::from_raw(inner)
    }
}

impl Drop for Builder {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe { libc::close(self.fd) };
        }
    }
}

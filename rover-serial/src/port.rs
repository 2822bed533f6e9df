// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::os::unix::prelude::{AsRawFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{self, unix::AsyncFd, AsyncRead, AsyncWrite, ReadBuf};

use crate::BaudRate;

/// Owned non-blocking TTY descriptor.
///
/// Dropping it releases the exclusive claim and closes the descriptor.
pub(crate) struct Descriptor(pub(crate) RawFd);

impl Descriptor {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let ptr = buf.as_mut_ptr().cast::<libc::c_void>();
        check(unsafe { libc::read(self.0, ptr, buf.len()) })
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let ptr = buf.as_ptr().cast::<libc::c_void>();
        check(unsafe { libc::write(self.0, ptr, buf.len()) })
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        unsafe {
            libc::ioctl(self.0, libc::TIOCNXCL);
            libc::close(self.0);
        }
    }
}

impl AsRawFd for Descriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// Map a libc transfer result onto an I/O result.
fn check(len: libc::ssize_t) -> io::Result<usize> {
    usize::try_from(len).map_err(|_| io::Error::last_os_error())
}

/// Asynchronous UART port.
///
/// The port will be closed, and the exclusive claim released, when the
/// value is dropped.
pub struct Uart {
    inner: AsyncFd<Descriptor>,
}

impl Uart {
    /// Open an UART device in raw 8N1 mode at the given baud rate.
    ///
    /// For more fine grained control use the serial builder.
    ///
    /// ## Errors
    ///
    /// * `NoDevice` if the device could not be opened. This could indicate that the device is
    ///   already in use.
    /// * `InvalidInput` if `path` is not a valid device name.
    /// * `Io` for any other error while opening or initializing the device.
    pub fn open(path: &std::path::Path, baud_rate: BaudRate) -> super::Result<Self> {
        log::debug!("Opening serial port {} at {}", path.display(), baud_rate);

        crate::builder(path)?.set_baud_rate(baud_rate)?.build()
    }

    pub(crate) fn from_raw(value: Descriptor) -> super::Result<Self> {
        Ok(Self {
            inner: AsyncFd::new(value)?,
        })
    }
}

impl AsyncRead for Uart {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = match self.inner.poll_read_ready(cx)? {
                Poll::Ready(guard) => guard,
                Poll::Pending => return Poll::Pending,
            };

            match guard.try_io(|inner| inner.get_ref().read(buf.initialize_unfilled())) {
                Ok(Ok(size)) => {
                    buf.advance(size);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for Uart {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = match self.inner.poll_write_ready(cx)? {
                Poll::Ready(guard) => guard,
                Poll::Pending => return Poll::Pending,
            };

            match guard.try_io(|inner| inner.get_ref().write(buf)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(termios::tcdrain(self.inner.as_raw_fd()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

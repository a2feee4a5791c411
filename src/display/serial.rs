//! Raw serial link to a flip-dot controller.
//!
//! The device is opened lazily on the first write and dropped after any
//! failure so the next frame reopens it.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::transport::TransportError;

#[derive(Debug)]
pub struct SerialPort {
    path: PathBuf,
    baud_rate: u32,
    file: Option<File>,
}

impl SerialPort {
    pub fn new(path: impl Into<PathBuf>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Write one payload. Opening and writing both run on the blocking pool.
    pub async fn write(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let file = self.file.take();
        let path = self.path.clone();
        let baud_rate = self.baud_rate;
        let bytes = payload.to_vec();

        let (file, result) = tokio::task::spawn_blocking(move || {
            let mut file = match file {
                Some(file) => file,
                None => match open_port(&path, baud_rate) {
                    Ok(file) => file,
                    Err(e) => return (None, Err(e)),
                },
            };
            let result = file
                .write_all(&bytes)
                .and_then(|_| file.flush())
                .map_err(TransportError::from);
            (Some(file), result)
        })
        .await
        .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;

        // Keep the handle only when the write succeeded
        result?;
        self.file = file;
        Ok(())
    }
}

/// Open and configure the device.
///
/// The open itself never blocks: a FIFO without a reader fails with `ENXIO`
/// instead of waiting. Blocking mode is restored before returning.
#[cfg(unix)]
fn open_port(path: &Path, baud_rate: u32) -> Result<File, TransportError> {
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    let speed = baud_constant(baud_rate).ok_or_else(|| {
        TransportError::Unsupported(format!("baud rate {} is not supported", baud_rate))
    })?;

    let file = std::fs::OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)?;

    let fd = file.as_raw_fd();
    // SAFETY: `fd` is a valid open descriptor owned by `file` for the whole
    // block, and `termios` is fully initialized by tcgetattr before use.
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut termios) != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOTTY) {
                return Err(err.into());
            }
            // Plain files and FIFOs take the bytes as-is
            debug!("{} is not a tty, skipping line setup", path.display());
        } else {
            libc::cfmakeraw(&mut termios);
            termios.c_cflag |= libc::CLOCAL | libc::CREAD;
            if libc::cfsetispeed(&mut termios, speed) != 0
                || libc::cfsetospeed(&mut termios, speed) != 0
                || libc::tcsetattr(fd, libc::TCSANOW, &termios) != 0
            {
                return Err(std::io::Error::last_os_error().into());
            }
            info!("Opened serial port {} at {} baud", path.display(), baud_rate);
        }

        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
    }

    Ok(file)
}

#[cfg(not(unix))]
fn open_port(path: &Path, _baud_rate: u32) -> Result<File, TransportError> {
    Err(TransportError::Unsupported(format!(
        "serial output to {} requires a unix host",
        path.display()
    )))
}

#[cfg(unix)]
fn baud_constant(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        _ => return None,
    };
    Some(speed)
}

//! Raw termios setup for the UART link.
//!
//! The debug unit speaks plain 8N1 with no flow control. Reads use
//! `VMIN = 0` / `VTIME = n` so an idle line returns a zero-byte read after
//! the configured timeout instead of blocking forever.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::SerialConfig;

/// Largest value `VTIME` can hold, in deciseconds.
const MAX_VTIME: u128 = u8::MAX as u128;

pub(crate) fn open_tty(path: &Path, config: &SerialConfig) -> Result<File> {
    let speed = baud_to_speed(config.baud).ok_or(TransportError::UnsupportedBaud(config.baud))?;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(path)
        .map_err(|e| TransportError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

    configure(&file, speed, config.read_timeout).map_err(|e| TransportError::Configure {
        path: path.to_path_buf(),
        source: e,
    })?;
    discard_buffers(&file)?;

    debug!(port = %path.display(), vtime = vtime_deciseconds(config.read_timeout), "tty configured");
    Ok(file)
}

pub(crate) fn set_read_timeout(file: &File, timeout: Duration) -> io::Result<()> {
    let mut tio = get_attrs(file)?;
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = vtime_deciseconds(timeout);
    set_attrs(file, &tio)
}

pub(crate) fn discard_buffers(file: &File) -> io::Result<()> {
    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::tcflush(file.as_raw_fd(), libc::TCIOFLUSH) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn configure(file: &File, speed: libc::speed_t, read_timeout: Duration) -> io::Result<()> {
    let mut tio = get_attrs(file)?;
    make_raw_8n1(&mut tio, read_timeout);

    // SAFETY: `tio` is a valid termios; speed comes from the libc constant table.
    let rc = unsafe {
        libc::cfsetispeed(&mut tio, speed) | libc::cfsetospeed(&mut tio, speed)
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    set_attrs(file, &tio)
}

/// Raw mode, 8N1, no hardware or software flow control, whatever an
/// earlier program left configured.
fn make_raw_8n1(tio: &mut libc::termios, read_timeout: Duration) {
    // SAFETY: `tio` is a valid, initialized termios.
    unsafe { libc::cfmakeraw(tio) };
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cflag &= !(libc::CSTOPB | libc::CRTSCTS);
    tio.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = vtime_deciseconds(read_timeout);
}

fn get_attrs(file: &File) -> io::Result<libc::termios> {
    // SAFETY: termios is plain old data; tcgetattr fully initializes it on success.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: the descriptor is open and `tio` is a valid writable pointer.
    let rc = unsafe { libc::tcgetattr(file.as_raw_fd(), &mut tio) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(tio)
}

fn set_attrs(file: &File, tio: &libc::termios) -> io::Result<()> {
    // SAFETY: the descriptor is open and `tio` points to a valid termios.
    let rc = unsafe { libc::tcsetattr(file.as_raw_fd(), libc::TCSANOW, tio) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Convert a read timeout to `VTIME` deciseconds, rounding up.
///
/// `VTIME = 0` would turn reads into a non-blocking poll, so the result is
/// never below one decisecond.
pub(crate) fn vtime_deciseconds(timeout: Duration) -> libc::cc_t {
    let ds = timeout.as_millis().div_ceil(100).clamp(1, MAX_VTIME);
    ds as libc::cc_t
}

/// Map a numeric baud rate to its termios speed constant.
pub(crate) fn baud_to_speed(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460_800 => libc::B460800,
        #[cfg(target_os = "linux")]
        921_600 => libc::B921600,
        #[cfg(target_os = "linux")]
        1_000_000 => libc::B1000000,
        #[cfg(target_os = "linux")]
        2_000_000 => libc::B2000000,
        _ => return None,
    };
    Some(speed)
}

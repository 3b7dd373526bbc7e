use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Default UART baud rate of the debug unit.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Default per-read timeout. A read that sees no data within this window
/// returns zero bytes instead of blocking.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Prefix selecting the Unix-socket simulator bridge in a port string.
const SOCKET_PREFIX: &str = "unix:";

/// Where the debug target lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    /// A serial device node, e.g. `/dev/ttyUSB1`.
    Serial(PathBuf),
    /// A Unix domain socket exposed by a simulator, written `unix:<path>`.
    Socket(PathBuf),
}

impl PortSpec {
    /// Filesystem path of the device or socket.
    pub fn path(&self) -> &Path {
        match self {
            PortSpec::Serial(path) | PortSpec::Socket(path) => path,
        }
    }
}

impl FromStr for PortSpec {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(SOCKET_PREFIX) {
            if path.is_empty() {
                return Err(TransportError::InvalidPort(s.to_string()));
            }
            return Ok(PortSpec::Socket(PathBuf::from(path)));
        }
        if s.is_empty() {
            return Err(TransportError::InvalidPort(s.to_string()));
        }
        Ok(PortSpec::Serial(PathBuf::from(s)))
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Serial(path) => write!(f, "{}", path.display()),
            PortSpec::Socket(path) => write!(f, "{SOCKET_PREFIX}{}", path.display()),
        }
    }
}

/// Line settings applied when a port is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// UART baud rate. Ignored for socket ports.
    pub baud: u32,
    /// Per-read timeout; an idle line yields a zero-byte read after this long.
    pub read_timeout: Duration,
    /// Write timeout (socket ports only; tty writes block on the driver).
    pub write_timeout: Option<Duration>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: None,
        }
    }
}

/// A connected debug link implementing `Read` + `Write`.
///
/// Reads follow serial-port timeout semantics: once the configured read
/// timeout elapses without data, a read returns `Ok(0)` (tty) or an error of
/// kind `WouldBlock`/`TimedOut` (socket). Callers treat both as "nothing yet".
pub struct DebugStream {
    inner: DebugStreamInner,
}

enum DebugStreamInner {
    #[cfg(unix)]
    Serial {
        file: std::fs::File,
        path: PathBuf,
    },
    #[cfg(unix)]
    Socket(std::os::unix::net::UnixStream),
}

impl DebugStream {
    /// Open the port described by `spec` and apply `config`.
    ///
    /// Serial ports are switched to raw 8N1 mode and have both driver
    /// buffers discarded, so bytes left over from a previous session cannot
    /// precede the first frame.
    pub fn open(spec: &PortSpec, config: &SerialConfig) -> Result<Self> {
        #[cfg(not(unix))]
        {
            let _ = (spec, config);
            return Err(TransportError::Unsupported(
                "rvdebug-transport requires a Unix tty layer",
            ));
        }

        #[cfg(unix)]
        {
            match spec {
                PortSpec::Serial(path) => {
                    let file = crate::serial::open_tty(path, config)?;
                    info!(port = %path.display(), baud = config.baud, "opened serial port");
                    Ok(Self {
                        inner: DebugStreamInner::Serial {
                            file,
                            path: path.clone(),
                        },
                    })
                }
                PortSpec::Socket(path) => {
                    let stream = std::os::unix::net::UnixStream::connect(path).map_err(|e| {
                        TransportError::Connect {
                            path: path.clone(),
                            source: e,
                        }
                    })?;
                    stream.set_read_timeout(Some(config.read_timeout))?;
                    stream.set_write_timeout(config.write_timeout)?;
                    info!(port = %path.display(), "connected to simulator socket");
                    Ok(Self::from_unix(stream))
                }
            }
        }
    }

    /// Wrap an already connected Unix stream (simulator bridge, tests).
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: DebugStreamInner::Socket(stream),
        }
    }

    /// Change the per-read timeout on the open link.
    pub fn set_read_timeout(&self, timeout: Duration) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            DebugStreamInner::Serial { file, path } => {
                crate::serial::set_read_timeout(file, timeout).map_err(|e| {
                    TransportError::Configure {
                        path: path.clone(),
                        source: e,
                    }
                })
            }
            #[cfg(unix)]
            DebugStreamInner::Socket(stream) => {
                stream.set_read_timeout(Some(timeout)).map_err(Into::into)
            }
        }
    }

    /// Drop any bytes pending in the driver's input and output queues.
    pub fn discard_buffers(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            DebugStreamInner::Serial { file, .. } => {
                crate::serial::discard_buffers(file).map_err(Into::into)
            }
            // A socket has no driver queue to flush.
            #[cfg(unix)]
            DebugStreamInner::Socket(_) => Ok(()),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Used to hand one handle to the frame reader and one to the command
    /// writer; both still refer to the same link.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            DebugStreamInner::Serial { file, path } => Ok(Self {
                inner: DebugStreamInner::Serial {
                    file: file.try_clone()?,
                    path: path.clone(),
                },
            }),
            #[cfg(unix)]
            DebugStreamInner::Socket(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }
}

impl Read for DebugStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            DebugStreamInner::Serial { file, .. } => file.read(buf),
            #[cfg(unix)]
            DebugStreamInner::Socket(stream) => stream.read(buf),
        }
    }
}

impl Write for DebugStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            DebugStreamInner::Serial { file, .. } => file.write(buf),
            #[cfg(unix)]
            DebugStreamInner::Socket(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            DebugStreamInner::Serial { file, .. } => file.flush(),
            #[cfg(unix)]
            DebugStreamInner::Socket(stream) => stream.flush(),
        }
    }
}

impl Drop for DebugStream {
    fn drop(&mut self) {
        match &self.inner {
            #[cfg(unix)]
            DebugStreamInner::Serial { path, .. } => {
                debug!(port = %path.display(), "closing serial handle");
            }
            #[cfg(unix)]
            DebugStreamInner::Socket(_) => debug!("closing simulator socket handle"),
        }
    }
}

impl fmt::Debug for DebugStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            DebugStreamInner::Serial { path, .. } => f
                .debug_struct("DebugStream")
                .field("type", &"serial")
                .field("path", path)
                .finish(),
            #[cfg(unix)]
            DebugStreamInner::Socket(_) => f
                .debug_struct("DebugStream")
                .field("type", &"socket")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serial_port() {
        let spec: PortSpec = "/dev/ttyUSB1".parse().unwrap();
        assert_eq!(spec, PortSpec::Serial(PathBuf::from("/dev/ttyUSB1")));
        assert_eq!(spec.to_string(), "/dev/ttyUSB1");
    }

    #[test]
    fn parses_socket_port() {
        let spec: PortSpec = "unix:/tmp/sim.sock".parse().unwrap();
        assert_eq!(spec, PortSpec::Socket(PathBuf::from("/tmp/sim.sock")));
        assert_eq!(spec.to_string(), "unix:/tmp/sim.sock");
        assert_eq!(spec.path(), Path::new("/tmp/sim.sock"));
    }

    #[test]
    fn rejects_empty_port() {
        assert!(matches!(
            "".parse::<PortSpec>(),
            Err(TransportError::InvalidPort(_))
        ));
        assert!(matches!(
            "unix:".parse::<PortSpec>(),
            Err(TransportError::InvalidPort(_))
        ));
    }

    #[test]
    fn default_serial_config() {
        let cfg = SerialConfig::default();
        assert_eq!(cfg.baud, 115_200);
        assert_eq!(cfg.read_timeout, Duration::from_millis(200));
        assert!(cfg.write_timeout.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn socket_stream_roundtrip() {
        let (left, mut right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut stream = DebugStream::from_unix(left);

        stream.write_all(b"D").unwrap();
        let mut cmd = [0u8; 1];
        right.read_exact(&mut cmd).unwrap();
        assert_eq!(&cmd, b"D");

        right.write_all(&[0xD0, 0x01]).unwrap();
        let mut reply = [0u8; 2];
        stream.read_exact(&mut reply).unwrap();
        assert_eq!(reply, [0xD0, 0x01]);

        assert!(stream.discard_buffers().is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn socket_read_timeout_expires() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut stream = DebugStream::from_unix(left);
        stream.set_read_timeout(Duration::from_millis(10)).unwrap();

        let mut buf = [0u8; 1];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }

    #[test]
    #[cfg(unix)]
    fn connect_to_missing_socket_fails() {
        let spec = PortSpec::Socket(std::env::temp_dir().join(format!(
            "rvdebug-missing-{}.sock",
            std::process::id()
        )));
        let err = DebugStream::open(&spec, &SerialConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn open_missing_serial_device_fails() {
        let spec = PortSpec::Serial(PathBuf::from("/dev/rvdebug-does-not-exist"));
        let err = DebugStream::open(&spec, &SerialConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}

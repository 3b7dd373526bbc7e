use std::fmt;
use std::io;

use rvdebug_frame::FrameError;
use rvdebug_image::ImageError;
use rvdebug_session::SessionError;
use rvdebug_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::UnsupportedBaud(_) | TransportError::InvalidPort(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        TransportError::Open { ref source, .. }
        | TransportError::Configure { ref source, .. }
        | TransportError::Connect { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::InvalidMagic { .. }
        | FrameError::FrameIncomplete { .. }
        | FrameError::LengthMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::LayoutTooLarge { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn image_error(context: &str, err: ImageError) -> CliError {
    match err {
        ImageError::Io { source, .. } => io_error(context, source),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Image(err) => image_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rvdebug_frame::ReadPhase;

    use super::*;

    #[test]
    fn frame_errors_map_to_codes() {
        let timeout = FrameError::Timeout {
            phase: ReadPhase::Sync { discarded: 0 },
            waited: Duration::from_secs(5),
        };
        assert_eq!(frame_error("dump", timeout).code, TIMEOUT);
        assert_eq!(
            frame_error("dump", FrameError::InvalidMagic { found: 0 }).code,
            DATA_INVALID
        );
        assert_eq!(
            frame_error(
                "layout",
                FrameError::LayoutTooLarge {
                    mem_dump_bytes: usize::MAX,
                    max: 1 << 20
                }
            )
            .code,
            USAGE
        );
        assert_eq!(
            frame_error("dump", FrameError::ConnectionClosed).code,
            TRANSPORT_ERROR
        );
    }

    #[test]
    fn transport_errors_map_to_codes() {
        let denied = TransportError::Open {
            path: "/dev/ttyUSB0".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(transport_error("open", denied).code, PERMISSION_DENIED);

        let missing = TransportError::Open {
            path: "/dev/ttyUSB9".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(transport_error("open", missing).code, TRANSPORT_ERROR);
        assert_eq!(
            transport_error("open", TransportError::UnsupportedBaud(1234)).code,
            USAGE
        );
    }

    #[test]
    fn image_errors_are_data_invalid() {
        let err = image_error("load", ImageError::EmptyProgram);
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("load: "));

        let session = SessionError::Image(ImageError::MalformedNumber {
            line: 2,
            token: "zz".into(),
        });
        assert_eq!(session_error("load", session).code, DATA_INVALID);
        assert_eq!(session_error("console", SessionError::QueueFull).code, INTERNAL);
    }
}

use std::fmt;
use std::time::Duration;

/// Which half of a frame read ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPhase {
    /// Scanning for the sentinel byte.
    Sync { discarded: usize },
    /// Accumulating the fixed-length frame body.
    Accumulate { received: usize, expected: usize },
}

impl fmt::Display for ReadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadPhase::Sync { discarded } => write!(
                f,
                "waiting for sentinel 0xD0 ({discarded} bytes discarded)"
            ),
            ReadPhase::Accumulate { received, expected } => {
                write!(f, "reading frame body ({received} of {expected} bytes)")
            }
        }
    }
}

/// Errors that can occur while reading, decoding or sending on the debug link.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No sentinel before the deadline, or the line went idle mid-frame.
    #[error("timed out {phase} after {waited:?}")]
    Timeout { phase: ReadPhase, waited: Duration },

    /// The frame's first byte is not the sentinel.
    #[error("invalid frame magic 0x{found:02x} (expected 0xD0)")]
    InvalidMagic { found: u8 },

    /// The frame buffer length does not match the configured layout.
    #[error("incomplete frame ({actual} bytes, expected {expected})")]
    FrameIncomplete { expected: usize, actual: usize },

    /// The pipeline block does not hold exactly the expected number of words.
    #[error("pipeline word count mismatch ({actual} words, expected {expected})")]
    LengthMismatch { expected: usize, actual: usize },

    /// The configured memory window is larger than any frame we accept.
    #[error("memory window of {mem_dump_bytes} bytes exceeds the {max}-byte limit")]
    LayoutTooLarge { mem_dump_bytes: usize, max: usize },

    /// An I/O error occurred while reading or writing.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The target side stopped accepting bytes.
    #[error("connection closed")]
    ConnectionClosed,
}

impl From<rvdebug_transport::TransportError> for FrameError {
    fn from(err: rvdebug_transport::TransportError) -> Self {
        match err {
            rvdebug_transport::TransportError::Io(io) => FrameError::Io(io),
            rvdebug_transport::TransportError::Open { source, .. }
            | rvdebug_transport::TransportError::Configure { source, .. }
            | rvdebug_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

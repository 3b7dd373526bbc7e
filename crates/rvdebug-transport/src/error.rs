use std::path::PathBuf;

/// Errors that can occur while opening or driving the debug link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to apply line settings (baud, raw mode, timeouts) to the device.
    #[error("failed to configure {}: {source}", path.display())]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a simulator socket.
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested baud rate has no termios equivalent on this platform.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    /// The port specification is empty or unusable.
    #[error("invalid port specification: {0:?}")]
    InvalidPort(String),

    /// The transport is not available on this platform.
    #[error("transport unsupported on this platform: {0}")]
    Unsupported(&'static str),

    /// An I/O error occurred on the open stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

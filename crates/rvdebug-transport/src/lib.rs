//! Byte-stream transport to a soft-core debug target.
//!
//! Provides a single [`DebugStream`] over the channels a debug host can use
//! to reach the target:
//! - A serial tty (USB-UART bridge to the FPGA board)
//! - A Unix domain socket (simulator bridge, e.g. an RTL simulation harness)
//!
//! This is the lowest layer of rvdebug. The stream only moves bytes; it knows
//! nothing about frames or commands.

pub mod error;
pub mod ports;
#[cfg(unix)]
pub mod serial;
pub mod stream;

pub use error::{Result, TransportError};
pub use ports::{list_ports, list_ports_in};
pub use stream::{DebugStream, PortSpec, SerialConfig, DEFAULT_BAUD, DEFAULT_READ_TIMEOUT};

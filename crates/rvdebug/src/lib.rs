//! Serial debug host for soft-core RISC-V CPUs on FPGAs.
//!
//! rvdebug talks to a CPU's on-chip debug unit over a UART: it sends
//! single-byte commands (dump, step, run, reset fetch, program word) and
//! decodes the fixed-layout snapshot frames the target answers with,
//! including the packed state of the 5-stage pipeline latches.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial tty and simulator-socket byte streams
//! - [`frame`]: wire protocol, frame decoder and pipeline decoder
//! - [`image`]: program image parser
//! - [`session`]: request/response sessions and the background worker
//!   (behind the `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use rvdebug_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rvdebug_frame::*;
}

/// Re-export program image types.
pub mod image {
    pub use rvdebug_image::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use rvdebug_session::*;
}

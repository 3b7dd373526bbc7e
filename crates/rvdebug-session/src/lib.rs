//! Debug sessions against a soft-core RISC-V target.
//!
//! A [`DebugSession`] owns the link and performs strict request/response
//! exchanges: one command out, at most one frame back, each wait bounded by a
//! per-command deadline. [`SessionWorker`] runs those exchanges on a
//! background thread for interactive front ends, taking actions from a
//! bounded queue and reporting results as [`WorkerEvent`]s.

pub mod config;
pub mod error;
pub mod session;
pub mod sim;
pub mod worker;

pub use config::{
    SessionConfig, DEFAULT_DUMP_TIMEOUT, DEFAULT_PROGRESS_EVERY, DEFAULT_QUEUE_DEPTH,
    DEFAULT_RUN_TIMEOUT, DEFAULT_STEP_TIMEOUT,
};
pub use error::{Result, SessionError};
pub use session::{DebugSession, TraceStop, TraceSummary};
pub use sim::{SimTarget, EBREAK, NOP};
pub use worker::{Action, SessionWorker, WorkerEvent};

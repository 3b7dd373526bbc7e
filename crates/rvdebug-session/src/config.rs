use std::time::Duration;

use rvdebug_frame::Command;

/// Default wait for the reply to `D`.
pub const DEFAULT_DUMP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait for the reply to `S`.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(8);

/// Default wait for the reply to `G`; a run can take a while to halt.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(12);

/// Words programmed between progress reports while loading an image.
pub const DEFAULT_PROGRESS_EVERY: usize = 64;

/// Pending actions a worker accepts before `submit` reports `QueueFull`.
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Per-session timing and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub dump_timeout: Duration,
    pub step_timeout: Duration,
    pub run_timeout: Duration,
    /// Report load progress every this many words; 0 disables reports.
    pub progress_every: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dump_timeout: DEFAULT_DUMP_TIMEOUT,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl SessionConfig {
    /// Reply deadline for `command`, or `None` if the target sends no reply.
    pub fn timeout_for(&self, command: &Command) -> Option<Duration> {
        match command {
            Command::Dump => Some(self.dump_timeout),
            Command::Step => Some(self.step_timeout),
            Command::Run => Some(self.run_timeout),
            Command::ResetFetch | Command::ProgramWord { .. } => None,
        }
    }
}

use std::fmt;
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use rvdebug_frame::Frame;
use rvdebug_image::ProgramImage;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::session::DebugSession;

/// A user-triggered operation for the worker to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Dump,
    Step,
    Run,
    ResetFetch,
    ProgramWord { addr: u32, data: u32 },
    ProgramSequence { base: u32, words: Vec<u32> },
    LoadImage(ProgramImage),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Dump => "dump",
            Action::Step => "step",
            Action::Run => "run",
            Action::ResetFetch => "reset",
            Action::ProgramWord { .. } => "poke",
            Action::ProgramSequence { .. } => "poke-seq",
            Action::LoadImage(_) => "load",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Dump => f.write_str("D (dump)"),
            Action::Step => f.write_str("S (step)"),
            Action::Run => f.write_str("G (run)"),
            Action::ResetFetch => f.write_str("R (reset fetch)"),
            Action::ProgramWord { addr, data } => {
                write!(f, "P addr=0x{addr:08x} data=0x{data:08x}")
            }
            Action::ProgramSequence { base, words } => {
                write!(f, "P(seq) base=0x{base:08x} n={}", words.len())
            }
            Action::LoadImage(image) => write!(f, "P(load) words={}", image.len()),
        }
    }
}

/// Messages from the worker back to the presentation loop.
///
/// Every submitted action ends with exactly one `Frame`, `Done` or `Failed`.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Progress or status text.
    Log(String),
    /// A frame-producing action completed.
    Frame { action: &'static str, frame: Frame },
    /// A non-frame action completed.
    Done { action: &'static str },
    /// The action failed; the session stays usable.
    Failed {
        action: &'static str,
        error: SessionError,
    },
}

impl WorkerEvent {
    /// Whether this event ends an action.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerEvent::Log(_))
    }
}

/// Background thread that runs actions against a shared session one at a time.
pub struct SessionWorker {
    actions: Option<SyncSender<Action>>,
    handle: Option<JoinHandle<()>>,
}

impl SessionWorker {
    /// Start a worker over `session` accepting up to `queue_depth` pending
    /// actions. Returns the worker and the receiving end of its event stream.
    pub fn spawn<R, W>(
        session: Arc<Mutex<DebugSession<R, W>>>,
        queue_depth: usize,
    ) -> Result<(Self, Receiver<WorkerEvent>)>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (action_tx, action_rx) = mpsc::sync_channel(queue_depth);
        let (event_tx, event_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("rvdebug-session".into())
            .spawn(move || run_worker(&session, &action_rx, &event_tx))
            .map_err(SessionError::Spawn)?;

        Ok((
            Self {
                actions: Some(action_tx),
                handle: Some(handle),
            },
            event_rx,
        ))
    }

    /// Queue an action without blocking.
    pub fn submit(&self, action: Action) -> Result<()> {
        let Some(actions) = &self.actions else {
            return Err(SessionError::WorkerStopped);
        };
        actions.try_send(action).map_err(|err| match err {
            TrySendError::Full(_) => SessionError::QueueFull,
            TrySendError::Disconnected(_) => SessionError::WorkerStopped,
        })
    }

    /// Stop accepting actions, let queued ones finish, and join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.actions.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("session worker panicked");
            }
        }
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker<R: Read, W: Write>(
    session: &Mutex<DebugSession<R, W>>,
    actions: &Receiver<Action>,
    events: &Sender<WorkerEvent>,
) {
    debug!("session worker started");
    for action in actions {
        let name = action.name();
        if events.send(WorkerEvent::Log(format!("[TX] {action}"))).is_err() {
            break;
        }

        let outcome = {
            let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
            execute(&mut session, action, events)
        };

        let event = match outcome {
            Ok(Some(frame)) => WorkerEvent::Frame {
                action: name,
                frame,
            },
            Ok(None) => WorkerEvent::Done { action: name },
            Err(error) => {
                warn!(action = name, %error, "action failed");
                WorkerEvent::Failed {
                    action: name,
                    error,
                }
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
    debug!("session worker stopped");
}

fn execute<R: Read, W: Write>(
    session: &mut DebugSession<R, W>,
    action: Action,
    events: &Sender<WorkerEvent>,
) -> Result<Option<Frame>> {
    match action {
        Action::Dump => session.dump().map(Some),
        Action::Step => session.step().map(Some),
        Action::Run => session.run().map(Some),
        Action::ResetFetch => session.reset_fetch().map(|()| None),
        Action::ProgramWord { addr, data } => session.program_word(addr, data).map(|()| None),
        Action::ProgramSequence { base, words } => {
            session.program_sequence(base, &words).map(|_| None)
        }
        Action::LoadImage(image) => {
            let _ = events.send(WorkerEvent::Log(format!(
                "[INFO] words to program: {}",
                image.len()
            )));
            session.load_image_with_progress(&image, |done, total| {
                let _ = events.send(WorkerEvent::Log(format!("[INFO] ... {done}/{total}")));
            })?;
            let _ = events.send(WorkerEvent::Log("[OK] program loaded".into()));
            Ok(None)
        }
    }
}

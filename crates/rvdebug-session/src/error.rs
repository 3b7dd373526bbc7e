/// Errors that can occur during a debug session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rvdebug_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] rvdebug_frame::FrameError),

    /// Program image error.
    #[error("program error: {0}")]
    Image(#[from] rvdebug_image::ImageError),

    /// The command gets no reply frame, so there is nothing to exchange.
    #[error("`{0}` gets no reply frame from the target")]
    NoReply(rvdebug_frame::Command),

    /// The worker's action queue is at capacity.
    #[error("action queue full")]
    QueueFull,

    /// The worker thread is no longer running.
    #[error("session worker stopped")]
    WorkerStopped,

    /// The worker thread could not be started.
    #[error("failed to start session worker: {0}")]
    Spawn(std::io::Error),
}

impl SessionError {
    /// Whether the target failed to answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SessionError::Frame(rvdebug_frame::FrameError::Timeout { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

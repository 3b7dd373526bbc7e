use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use rvdebug_frame::{Command, CommandWriter, Frame, FrameLayout, FrameReader};
use rvdebug_image::ProgramImage;
use rvdebug_transport::{DebugStream, PortSpec, SerialConfig};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Why a trace stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStop {
    /// A frame reported `halt_seen`.
    Halted,
    /// The step budget ran out.
    StepLimit,
    /// The caller raised the cancel flag.
    Interrupted,
}

/// Result of [`DebugSession::trace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSummary {
    pub steps: usize,
    pub stop: TraceStop,
    pub last: Option<Frame>,
}

/// An open link to a debug target.
///
/// Exchanges are strictly sequential: a command is written and, for `D`, `S`
/// and `G`, exactly one frame is awaited before the call returns. Share a
/// session across threads behind a `Mutex` so command and reply stay paired.
pub struct DebugSession<R = DebugStream, W = DebugStream> {
    reader: FrameReader<R>,
    writer: CommandWriter<W>,
    config: SessionConfig,
}

impl DebugSession {
    /// Open `port` and start a session.
    ///
    /// The link is cloned so reads and writes use separate handles on the
    /// same port.
    pub fn open(
        port: &PortSpec,
        serial: &SerialConfig,
        layout: FrameLayout,
        config: SessionConfig,
    ) -> Result<Self> {
        let stream = DebugStream::open(port, serial)?;
        let reader_stream = stream.try_clone()?;

        let reader = FrameReader::with_read_timeout(reader_stream, layout, serial.read_timeout)?;
        let writer = CommandWriter::new(stream);

        info!(
            %port,
            variant = ?layout.variant,
            mem_bytes = layout.mem_dump_bytes,
            frame_len = layout.frame_len(),
            "debug session opened"
        );
        Ok(Self::from_parts(reader, writer, config))
    }
}

impl<R: Read, W: Write> DebugSession<R, W> {
    /// Build a session from an already connected reader and writer.
    pub fn from_parts(reader: FrameReader<R>, writer: CommandWriter<W>, config: SessionConfig) -> Self {
        Self {
            reader,
            writer,
            config,
        }
    }

    /// Send a frame-producing command and wait for the reply under the
    /// configured deadline for that command.
    ///
    /// `R` and `P` get no reply; they fail with `NoReply` before anything is
    /// written.
    pub fn exchange(&mut self, command: Command) -> Result<Frame> {
        let timeout = match self.config.timeout_for(&command) {
            Some(timeout) if command.expects_frame() => timeout,
            _ => return Err(SessionError::NoReply(command)),
        };
        self.writer.send(&command)?;
        let frame = self.reader.read_frame(timeout)?;
        let snapshot = frame.snapshot();
        debug!(
            %command,
            dump_type = %snapshot.dump_type,
            pc = %format_args!("0x{:08x}", snapshot.pc),
            halt_seen = snapshot.flags.halt_seen(),
            "frame received"
        );
        Ok(frame)
    }

    /// `D` with the configured dump deadline.
    pub fn dump(&mut self) -> Result<Frame> {
        self.exchange(Command::Dump)
    }

    /// `S` with the configured step deadline.
    pub fn step(&mut self) -> Result<Frame> {
        self.exchange(Command::Step)
    }

    /// `G` with the configured run deadline.
    pub fn run(&mut self) -> Result<Frame> {
        self.exchange(Command::Run)
    }

    /// Reset the target's fetch stage. No reply is expected.
    pub fn reset_fetch(&mut self) -> Result<()> {
        self.writer.send(&Command::ResetFetch)?;
        Ok(())
    }

    /// Write one word of instruction memory. No reply is expected.
    pub fn program_word(&mut self, addr: u32, data: u32) -> Result<()> {
        self.writer.send(&Command::ProgramWord { addr, data })?;
        Ok(())
    }

    /// Write `words` to consecutive addresses from `base`.
    pub fn program_sequence(&mut self, base: u32, words: &[u32]) -> Result<usize> {
        let image = ProgramImage::sequence(base, words)?;
        self.load_image(&image)
    }

    /// Program every word of `image` in order.
    pub fn load_image(&mut self, image: &ProgramImage) -> Result<usize> {
        self.load_image_with_progress(image, |_, _| {})
    }

    /// Program every word of `image`, calling `progress(done, total)` every
    /// `progress_every` words.
    ///
    /// Fails with `EmptyProgram` before anything is sent if `image` is empty.
    pub fn load_image_with_progress(
        &mut self,
        image: &ProgramImage,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<usize> {
        if image.is_empty() {
            return Err(rvdebug_image::ImageError::EmptyProgram.into());
        }

        let total = image.len();
        let every = self.config.progress_every;
        info!(words = total, "loading program");

        for (index, &(addr, data)) in image.iter().enumerate() {
            self.program_word(addr, data)?;
            let done = index + 1;
            if every > 0 && done % every == 0 {
                info!(done, total, "program load progress");
                progress(done, total);
            }
        }

        info!(words = total, "program loaded");
        Ok(total)
    }

    /// Single-step until the target reports a halt, `max_steps` is reached,
    /// or `cancel` is raised. `on_frame(step, frame)` sees every frame.
    pub fn trace(
        &mut self,
        max_steps: usize,
        cancel: &AtomicBool,
        mut on_frame: impl FnMut(usize, &Frame),
    ) -> Result<TraceSummary> {
        let mut last = None;
        for step in 1..=max_steps {
            if cancel.load(Ordering::Relaxed) {
                return Ok(TraceSummary {
                    steps: step - 1,
                    stop: TraceStop::Interrupted,
                    last,
                });
            }

            let frame = self.step()?;
            on_frame(step, &frame);
            let halted = frame.snapshot().flags.halt_seen();
            last = Some(frame);
            if halted {
                info!(steps = step, "target halted");
                return Ok(TraceSummary {
                    steps: step,
                    stop: TraceStop::Halted,
                    last,
                });
            }
        }

        Ok(TraceSummary {
            steps: max_steps,
            stop: TraceStop::StepLimit,
            last,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    pub fn layout(&self) -> &FrameLayout {
        self.reader.layout()
    }

    /// Split the session back into its reader and writer.
    pub fn into_parts(self) -> (FrameReader<R>, CommandWriter<W>) {
        (self.reader, self.writer)
    }
}

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use rvdebug_frame::{FrameLayout, ProtocolVariant, DEFAULT_MEM_DUMP_BYTES};
use rvdebug_image::parse_int_auto;
use rvdebug_session::{DebugSession, SessionConfig};
use rvdebug_transport::{PortSpec, SerialConfig, DEFAULT_BAUD};

use crate::exit::{frame_error, session_error, transport_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod capture;
pub mod check;
pub mod console;
pub mod decode;
pub mod ports;
pub mod program;
pub mod simulate;
pub mod trace;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List candidate serial ports.
    Ports,
    /// Request a manual snapshot (D).
    Dump(CaptureArgs),
    /// Execute one instruction and print the snapshot (S).
    Step(CaptureArgs),
    /// Run until halt and print the final snapshot (G).
    Run(CaptureArgs),
    /// Reset the fetch stage (R).
    Reset,
    /// Write one word of instruction memory (P).
    Poke(PokeArgs),
    /// Write consecutive words starting at a base address.
    PokeSeq(PokeSeqArgs),
    /// Load a program file into instruction memory.
    Load(LoadArgs),
    /// Parse a program file without touching a device.
    Check(CheckArgs),
    /// Decode captured raw frames from a file.
    Decode(DecodeArgs),
    /// Single-step until the target halts.
    Trace(TraceArgs),
    /// Interactive session on stdin.
    Console,
    /// Serve a simulated target on a Unix socket.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports => ports::run(format),
        Command::Dump(args) => capture::run(capture::Kind::Dump, args, link, format),
        Command::Step(args) => capture::run(capture::Kind::Step, args, link, format),
        Command::Run(args) => capture::run(capture::Kind::Run, args, link, format),
        Command::Reset => program::reset(link, format),
        Command::Poke(args) => program::poke(args, link, format),
        Command::PokeSeq(args) => program::poke_seq(args, link, format),
        Command::Load(args) => program::load(args, link, format),
        Command::Check(args) => check::run(args, format),
        Command::Decode(args) => decode::run(args, link, format),
        Command::Trace(args) => trace::run(args, link, format),
        Command::Console => console::run(link, format),
        Command::Simulate(args) => simulate::run(args, link),
        Command::Version(args) => version::run(args),
    }
}

/// Frame layout variant the target was built with.
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum VariantArg {
    /// Frames carry the 23 pipeline-latch words.
    Pipeline,
    /// Frames carry PC, registers and memory only.
    Basic,
}

impl From<VariantArg> for ProtocolVariant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::Pipeline => ProtocolVariant::WithPipeline,
            VariantArg::Basic => ProtocolVariant::Basic,
        }
    }
}

/// Connection settings shared by every device command.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Serial device, or `unix:<path>` for a simulator socket.
    #[arg(long, short = 'p', env = "RVDEBUG_PORT", global = true)]
    pub port: Option<String>,

    /// Serial baud rate.
    #[arg(long, env = "RVDEBUG_BAUD", default_value_t = DEFAULT_BAUD, global = true)]
    pub baud: u32,

    /// Data-memory bytes appended to each frame.
    #[arg(long, env = "RVDEBUG_MEM_BYTES", default_value_t = DEFAULT_MEM_DUMP_BYTES, global = true)]
    pub mem_bytes: usize,

    /// Frame layout variant.
    #[arg(long, value_enum, default_value = "pipeline", global = true)]
    pub variant: VariantArg,

    /// Per-read timeout on the link (e.g. 200ms, 1s).
    #[arg(long, default_value = "200ms", global = true)]
    pub read_timeout: String,
}

impl LinkArgs {
    pub fn layout(&self) -> CliResult<FrameLayout> {
        FrameLayout::checked(self.variant.into(), self.mem_bytes)
            .map_err(|err| frame_error("invalid --mem-bytes", err))
    }

    pub fn serial_config(&self) -> CliResult<SerialConfig> {
        Ok(SerialConfig {
            baud: self.baud,
            read_timeout: parse_duration(&self.read_timeout)?,
            ..SerialConfig::default()
        })
    }

    pub fn port_spec(&self) -> CliResult<PortSpec> {
        let Some(port) = self.port.as_deref() else {
            return Err(CliError::usage(
                "no port given (use --port or RVDEBUG_PORT; see `rvdebug ports`)",
            ));
        };
        port.parse()
            .map_err(|err| transport_error("invalid port", err))
    }

    /// Open a session with the default per-command deadlines.
    pub fn open(&self) -> CliResult<DebugSession> {
        self.open_with(SessionConfig::default())
    }

    pub fn open_with(&self, config: SessionConfig) -> CliResult<DebugSession> {
        let layout = self.layout()?;
        let port = self.port_spec()?;
        let serial = self.serial_config()?;
        DebugSession::open(&port, &serial, layout, config)
            .map_err(|err| session_error("connect failed", err))
    }
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Override the reply deadline (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct PokeArgs {
    /// Instruction memory address (0x.., 0b.., 0o.. or decimal).
    pub addr: String,
    /// Word to write.
    pub data: String,
}

#[derive(Args, Debug)]
pub struct PokeSeqArgs {
    /// Address of the first word.
    pub base: String,
    /// Words to write at base, base+4, ...
    #[arg(required = true, num_args = 1..)]
    pub words: Vec<String>,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Program file (.mem, .hex, .txt).
    pub file: PathBuf,
    /// Reset the fetch stage after loading.
    #[arg(long)]
    pub reset: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Program file to parse.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding one or more raw frames back to back.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Stop after this many steps if the target never halts.
    #[arg(long, default_value_t = 1000)]
    pub max_steps: usize,
    /// Override the per-step deadline (e.g. 8s).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after serving this many connections.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `Nms`, `Ns` or bare seconds. Zero is rejected.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Parse an address or data word given on the command line.
pub fn parse_word(what: &str, token: &str) -> CliResult<u32> {
    parse_int_auto(token).ok_or_else(|| CliError::usage(format!("invalid {what}: {token:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_duration_millis() {
        assert_eq!(parse_duration("200ms").unwrap(), Duration::from_millis(200));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert_eq!(parse_duration("1.5s").unwrap_err().code, crate::exit::USAGE);
    }

    #[test]
    fn parse_word_radixes() {
        assert_eq!(parse_word("addr", "0x10").unwrap(), 16);
        assert_eq!(parse_word("addr", "16").unwrap(), 16);
        assert_eq!(parse_word("data", "0b1").unwrap(), 1);
        assert!(parse_word("data", "xyz").is_err());
    }

    #[test]
    fn link_layout_and_port() {
        let link = LinkArgs {
            port: Some("unix:/tmp/sim.sock".into()),
            baud: DEFAULT_BAUD,
            mem_bytes: 32,
            variant: VariantArg::Basic,
            read_timeout: "200ms".into(),
        };
        assert_eq!(
            link.layout().unwrap(),
            FrameLayout::new(ProtocolVariant::Basic, 32)
        );
        assert!(matches!(link.port_spec().unwrap(), PortSpec::Socket(_)));
        assert_eq!(
            link.serial_config().unwrap().read_timeout,
            Duration::from_millis(200)
        );
    }

    #[test]
    fn oversized_memory_window_is_usage_error() {
        let link = LinkArgs {
            port: Some("unix:/tmp/sim.sock".into()),
            baud: DEFAULT_BAUD,
            mem_bytes: usize::MAX,
            variant: VariantArg::Pipeline,
            read_timeout: "200ms".into(),
        };
        assert_eq!(link.layout().unwrap_err().code, crate::exit::USAGE);
        assert_eq!(link.open().err().map(|err| err.code), Some(crate::exit::USAGE));
    }

    #[test]
    fn missing_port_is_usage_error() {
        let link = LinkArgs {
            port: None,
            baud: DEFAULT_BAUD,
            mem_bytes: DEFAULT_MEM_DUMP_BYTES,
            variant: VariantArg::Pipeline,
            read_timeout: "200ms".into(),
        };
        assert_eq!(link.port_spec().unwrap_err().code, crate::exit::USAGE);
    }
}

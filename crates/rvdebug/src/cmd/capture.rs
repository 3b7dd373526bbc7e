use rvdebug_session::SessionConfig;
use tracing::info;

use crate::cmd::{parse_duration, CaptureArgs, LinkArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

/// Which frame-producing command to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Dump,
    Step,
    Run,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Dump => "dump",
            Kind::Step => "step",
            Kind::Run => "run",
        }
    }
}

pub fn run(kind: Kind, args: CaptureArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let config = session_config(kind, &args)?;
    let mut session = link.open_with(config)?;

    let frame = match kind {
        Kind::Dump => session.dump(),
        Kind::Step => session.step(),
        Kind::Run => session.run(),
    }
    .map_err(|err| session_error(&format!("{} failed", kind.name()), err))?;

    let snapshot = frame.snapshot();
    info!(
        dump_type = %snapshot.dump_type,
        pc = %format_args!("0x{:08x}", snapshot.pc),
        "[RX] DUMP"
    );
    print_frame(&frame, format);
    Ok(SUCCESS)
}

fn session_config(kind: Kind, args: &CaptureArgs) -> CliResult<SessionConfig> {
    let mut config = SessionConfig::default();
    if let Some(timeout) = &args.timeout {
        let timeout = parse_duration(timeout)?;
        match kind {
            Kind::Dump => config.dump_timeout = timeout,
            Kind::Step => config.step_timeout = timeout,
            Kind::Run => config.run_timeout = timeout,
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeout_override_targets_one_command() {
        let args = CaptureArgs {
            timeout: Some("500ms".into()),
        };
        let config = session_config(Kind::Run, &args).unwrap();
        assert_eq!(config.run_timeout, Duration::from_millis(500));
        assert_eq!(config.dump_timeout, Duration::from_secs(5));
        assert_eq!(config.step_timeout, Duration::from_secs(8));
    }

    #[test]
    fn defaults_without_override() {
        let config = session_config(Kind::Dump, &CaptureArgs { timeout: None }).unwrap();
        assert_eq!(config, SessionConfig::default());
    }
}

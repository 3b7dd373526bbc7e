use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rvdebug_session::{SessionConfig, TraceStop};
use serde::Serialize;

use crate::cmd::{parse_duration, LinkArgs, TraceArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_json, print_trace_step, OutputFormat};

#[derive(Serialize)]
struct TraceOutput {
    steps: usize,
    stop: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_pc: Option<String>,
}

pub fn run(args: TraceArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    if args.max_steps == 0 {
        return Err(CliError::new(USAGE, "--max-steps must be greater than zero"));
    }
    let mut config = SessionConfig::default();
    if let Some(timeout) = &args.timeout {
        config.step_timeout = parse_duration(timeout)?;
    }

    let mut session = link.open_with(config)?;

    let cancel = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(cancel.clone())?;

    let summary = session
        .trace(args.max_steps, &cancel, |step, frame| {
            print_trace_step(step, frame, format)
        })
        .map_err(|err| session_error("trace failed", err))?;

    let stop = match summary.stop {
        TraceStop::Halted => "halted",
        TraceStop::StepLimit => "step-limit",
        TraceStop::Interrupted => "interrupted",
    };
    let final_pc = summary
        .last
        .as_ref()
        .map(|frame| format!("0x{:08x}", frame.snapshot().pc));

    match format {
        OutputFormat::Json => print_json(&TraceOutput {
            steps: summary.steps,
            stop,
            final_pc,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("trace stopped ({stop}) after {} steps", summary.steps);
        }
        OutputFormat::Raw => {}
    }
    Ok(SUCCESS)
}

fn install_ctrlc_handler(cancel: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

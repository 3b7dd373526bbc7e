use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use rvdebug_image::{parse_file, parse_int_auto};
use rvdebug_session::{Action, SessionWorker, WorkerEvent, DEFAULT_QUEUE_DEPTH};
use tracing::warn;

use crate::cmd::LinkArgs;
use crate::exit::{io_error, session_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

const HELP: &str = "\
commands:
  dump | d                 manual snapshot
  step | s                 execute one instruction
  run  | g                 run until halt
  reset | r                reset fetch
  poke ADDR DATA           write one instruction word
  seq BASE WORD...         write consecutive words from BASE
  load FILE                load a program file
  help                     this text
  quit | exit              leave the console";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Action(Action),
    Help,
    Quit,
    Empty,
}

pub fn run(link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let session = link.open()?;
    let session = Arc::new(Mutex::new(session));
    let (worker, events) = SessionWorker::spawn(session, DEFAULT_QUEUE_DEPTH)
        .map_err(|err| session_error("console failed", err))?;

    eprintln!("connected; type `help` for commands");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| io_error("stdin read failed", err))?;
        match parse_line(&line) {
            Ok(Input::Empty) => {}
            Ok(Input::Help) => println!("{HELP}"),
            Ok(Input::Quit) => break,
            Ok(Input::Action(action)) => {
                if let Err(err) = worker.submit(action) {
                    eprintln!("[ERROR] {err}");
                    continue;
                }
                if !await_result(&events, format) {
                    break;
                }
            }
            Err(message) => eprintln!("[ERROR] {message}"),
        }
    }

    worker.shutdown();
    Ok(SUCCESS)
}

/// Render events until the submitted action finishes. Returns `false` if the
/// worker is gone.
fn await_result(events: &Receiver<WorkerEvent>, format: OutputFormat) -> bool {
    for event in events.iter() {
        match event {
            WorkerEvent::Log(line) => eprintln!("{line}"),
            WorkerEvent::Frame { frame, .. } => {
                print_frame(&frame, format);
                return true;
            }
            WorkerEvent::Done { action } => {
                eprintln!("[OK] {action}");
                return true;
            }
            WorkerEvent::Failed { action, error } => {
                warn!(action, %error, "console action failed");
                eprintln!("[ERROR] {action}: {error}");
                return true;
            }
        }
    }
    false
}

fn parse_line(line: &str) -> Result<Input, String> {
    let mut tokens = line.split_whitespace();
    let Some(head) = tokens.next() else {
        return Ok(Input::Empty);
    };
    let rest: Vec<&str> = tokens.collect();

    let action = match head.to_ascii_lowercase().as_str() {
        "help" | "?" => return Ok(Input::Help),
        "quit" | "exit" | "q" => return Ok(Input::Quit),
        "dump" | "d" => Action::Dump,
        "step" | "s" => Action::Step,
        "run" | "g" => Action::Run,
        "reset" | "r" => Action::ResetFetch,
        "poke" | "p" => match rest.as_slice() {
            [addr, data] => Action::ProgramWord {
                addr: word(addr)?,
                data: word(data)?,
            },
            _ => return Err("usage: poke ADDR DATA".into()),
        },
        "seq" => match rest.split_first() {
            Some((base, words)) if !words.is_empty() => Action::ProgramSequence {
                base: word(base)?,
                words: words.iter().map(|w| word(w)).collect::<Result<_, _>>()?,
            },
            _ => return Err("usage: seq BASE WORD...".into()),
        },
        "load" => match rest.as_slice() {
            [path] => Action::LoadImage(
                parse_file(Path::new(path)).map_err(|err| err.to_string())?,
            ),
            _ => return Err("usage: load FILE".into()),
        },
        other => return Err(format!("unknown command {other:?}; try `help`")),
    };
    Ok(Input::Action(action))
}

fn word(token: &str) -> Result<u32, String> {
    parse_int_auto(token).ok_or_else(|| format!("invalid number {token:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_letter_commands() {
        assert_eq!(parse_line("d"), Ok(Input::Action(Action::Dump)));
        assert_eq!(parse_line("  STEP "), Ok(Input::Action(Action::Step)));
        assert_eq!(parse_line("g"), Ok(Input::Action(Action::Run)));
        assert_eq!(parse_line("reset"), Ok(Input::Action(Action::ResetFetch)));
        assert_eq!(parse_line(""), Ok(Input::Empty));
        assert_eq!(parse_line("help"), Ok(Input::Help));
        assert_eq!(parse_line("exit"), Ok(Input::Quit));
    }

    #[test]
    fn poke_and_seq_arguments() {
        assert_eq!(
            parse_line("poke 0x10 19"),
            Ok(Input::Action(Action::ProgramWord {
                addr: 0x10,
                data: 19
            }))
        );
        assert_eq!(
            parse_line("seq 0x00000000 0x00000013 0x00100073"),
            Ok(Input::Action(Action::ProgramSequence {
                base: 0,
                words: vec![0x13, 0x0010_0073]
            }))
        );
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(parse_line("poke 0x10").is_err());
        assert!(parse_line("seq 0x10").is_err());
        assert!(parse_line("poke 0x10 zz").is_err());
        assert!(parse_line("frobnicate").is_err());
        assert!(parse_line("load /nonexistent/rvdebug.mem").is_err());
    }
}

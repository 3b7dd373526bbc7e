use std::io::ErrorKind;
use std::os::unix::net::UnixListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rvdebug_session::SimTarget;
use tracing::{info, warn};

use crate::cmd::{LinkArgs, SimulateArgs};
use crate::exit::{io_error, CliError, CliResult, INTERNAL, SUCCESS};

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Serve a simulated target until Ctrl-C or `--count` connections.
///
/// Ctrl-C also ends a connection the host is still holding open.
///
/// Target state (PC, instruction memory) persists across connections, the
/// way a board keeps its state between host sessions.
pub fn run(args: SimulateArgs, link: &LinkArgs) -> CliResult<i32> {
    let layout = link.layout()?;
    let listener = UnixListener::bind(&args.path)
        .map_err(|err| io_error(&format!("bind {} failed", args.path.display()), err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| io_error("listener setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut target = SimTarget::new(layout);
    info!(
        path = %args.path.display(),
        frame_len = layout.frame_len(),
        "simulated target listening"
    );

    let mut served = 0usize;
    let result = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(SUCCESS);
        }
        if args.count.is_some_and(|count| served >= count) {
            break Ok(SUCCESS);
        }

        let mut stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(err) => break Err(io_error("accept failed", err)),
        };
        if let Err(err) = stream
            .set_nonblocking(false)
            .and_then(|()| stream.set_read_timeout(Some(ACCEPT_POLL)))
        {
            break Err(io_error("connection setup failed", err));
        }

        info!("host connected");
        if let Err(err) = target.serve_until(&mut stream, &running) {
            warn!(error = %err, "host connection ended with error");
        }
        served += 1;
        info!(served, pc = %format_args!("0x{:08x}", target.pc), "host disconnected");
    };

    let _ = std::fs::remove_file(&args.path);
    result
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

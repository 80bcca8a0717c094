//! Plain mode - line output, no terminal UI
//!
//! Output lines go to stdout (stderr lines prefixed). Ctrl-C cancels the
//! worker; a second Ctrl-C leaves without waiting.

use crate::monitor::{Monitor, Update};
use juggle_supervisor::{Bridge, BridgeEvents};
use std::io::Write;
use tracing::info;

/// Run the monitor until the worker reports a terminal message.
/// Returns the process exit code.
pub async fn run(
    bridge: &Bridge,
    mut events: BridgeEvents,
    mut monitor: Monitor,
) -> anyhow::Result<i32> {
    monitor.start(bridge);

    let stdout = std::io::stdout();
    let mut interrupted = false;

    loop {
        tokio::select! {
            biased;

            signal = tokio::signal::ctrl_c() => {
                signal?;
                if interrupted {
                    eprintln!("Interrupted again, exiting without waiting for the worker");
                    return Ok(130);
                }
                interrupted = true;
                if monitor.request_cancel(bridge) {
                    info!(session_id = %monitor.session_id(), "Cancel requested");
                    eprintln!("Cancelling {}...", monitor.session_id());
                }
            }

            message = events.next() => {
                let Some(message) = message else {
                    break;
                };
                match monitor.handle_message(message, bridge) {
                    Update::Line => {
                        if let Some(line) = monitor.last_line() {
                            let mut out = stdout.lock();
                            writeln!(out, "{}", line.display())?;
                            out.flush()?;
                        }
                    }
                    Update::State => {
                        if monitor.is_done() {
                            break;
                        }
                        eprintln!("{} {}", monitor.state().symbol(), monitor.state().display_name());
                    }
                    Update::None => {}
                }
            }
        }
    }

    eprintln!("{}", monitor.summary());
    Ok(monitor.exit_code())
}

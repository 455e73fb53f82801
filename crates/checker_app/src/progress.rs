use std::thread;
use std::time::Duration;

use checker_core::{ResultEvent, RunStats};
use checker_engine::{RunEvent, RunHandle};

/// Poll interval, the same cadence a UI tick would use.
const TICK: Duration = Duration::from_millis(75);

/// Prints run events until the worker thread exits.
pub fn follow(handle: &RunHandle, verbose: bool) {
    loop {
        // Read the flag first so no event sent before exit is missed.
        let finished = handle.is_finished();
        while let Some(event) = handle.try_recv() {
            if let Some(line) = render(&event, verbose) {
                println!("{line}");
            }
        }
        if finished {
            return;
        }
        thread::sleep(TICK);
    }
}

/// One output line per event; informational notes only when verbose.
fn render(event: &RunEvent, verbose: bool) -> Option<String> {
    match event {
        RunEvent::Recorded { event, stats } => Some(format!(
            "[{}] {}",
            counter(stats),
            describe(event)
        )),
        RunEvent::Info(event) if verbose => Some(format!("        {}", describe(event))),
        RunEvent::Info(_) => None,
        RunEvent::Finished(stats) => Some(format!("Finished: {stats}")),
    }
}

fn counter(stats: &RunStats) -> String {
    let done = stats.processed + stats.cancelled;
    let width = stats.total.to_string().len();
    format!("{done:>width$}/{}", stats.total)
}

fn describe(event: &ResultEvent) -> String {
    let key = event.key.as_deref().unwrap_or("-");
    format!("{key}: {} ({})", event.status, event.message)
}

use std::process::ExitCode;

use anyhow::Context;
use stabby::{logging, App, BridgeError, Config, ExitReason};

const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    // logging is optional, a missing cache dir must not stop the session
    let _ = logging::init(&logging::default_log_path());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("exiting with error: {err:#}");
            report(&err)
        }
    }
}

fn run() -> anyhow::Result<()> {
    let path = Config::default_path()?;
    let config = Config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    App::new(config).run()
}

// The terminal is back in its original mode by the time this runs.
fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<BridgeError>() {
        Some(BridgeError::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Some(BridgeError::RemoteExit(ExitReason::Status(code))) => {
            eprintln!("stabby: {err:#}");
            ExitCode::from(remote_status(*code))
        }
        Some(bridge) => {
            eprintln!("stabby: {}: {err:#}", bridge.kind());
            ExitCode::FAILURE
        }
        None => {
            eprintln!("stabby: {err:#}");
            ExitCode::FAILURE
        }
    }
}

// A nonzero remote status squeezed into the 1..=255 range of a process status.
fn remote_status(code: u32) -> u8 {
    u8::try_from(code).unwrap_or(u8::MAX).max(1)
}

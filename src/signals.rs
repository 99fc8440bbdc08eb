use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bridge::Size;

/// Cancel `token` on SIGINT, SIGTERM or SIGHUP.
///
/// The handlers are installed before this returns, so a signal sent right after
/// the call already cancels the token. Must be called from within a tokio
/// runtime.
#[cfg(unix)]
pub fn cancel_on_interrupt(token: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let streams = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    );
    let (mut sigint, mut sigterm, mut sighup) = match streams {
        (Ok(sigint), Ok(sigterm), Ok(sighup)) => (sigint, sigterm, sighup),
        (sigint, sigterm, sighup) => {
            let err = [sigint.err(), sigterm.err(), sighup.err()]
                .into_iter()
                .flatten()
                .next();
            warn!(error = ?err, "failed to install signal handlers");
            return;
        }
    };

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = sighup.recv() => "SIGHUP",
            _ = token.cancelled() => return,
        };
        info!(signal = name, "received signal, ending session");
        token.cancel();
    });
}

#[cfg(not(unix))]
pub fn cancel_on_interrupt(token: CancellationToken) {
    let mut ctrl_c = match tokio::signal::windows::ctrl_c() {
        Ok(ctrl_c) => ctrl_c,
        Err(err) => {
            warn!(error = %err, "failed to listen for ctrl-c");
            return;
        }
    };

    tokio::spawn(async move {
        tokio::select! {
            _ = ctrl_c.recv() => {
                info!("received ctrl-c, ending session");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
}

/// Publish the local terminal size on every SIGWINCH until `token` fires.
#[cfg(unix)]
pub fn watch_window_size(token: CancellationToken, sizes: watch::Sender<Size>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut winch = match signal(SignalKind::window_change()) {
        Ok(winch) => winch,
        Err(err) => {
            warn!(error = %err, "failed to watch window size");
            return;
        }
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = winch.recv() => {}
                _ = token.cancelled() => return,
            }
            match crossterm::terminal::size() {
                Ok((cols, rows)) => {
                    sizes.send_replace(Size::new(cols, rows));
                }
                Err(err) => warn!(error = %err, "failed to read terminal size"),
            }
        }
    });
}

#[cfg(not(unix))]
pub fn watch_window_size(_token: CancellationToken, _sizes: watch::Sender<Size>) {}

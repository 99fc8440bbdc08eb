use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bridge::{LocalStreams, PtyRequest, ShellBridge, Size};
use crate::config::{Config, HostRecord};
use crate::select_box::{SelectBox, SelectionOutcome};
use crate::signals;
use crate::ssh::SshConnector;
use crate::terminal::{CrosstermMode, Terminal};

pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

// the stdin reader thread may still be parked in read(2)
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(100);

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        App { config }
    }

    fn select(&self) -> anyhow::Result<SelectionOutcome> {
        let mut terminal = Terminal::new()?;
        let outcome = SelectBox::new(&self.config.servers).select(&mut terminal)?;
        Ok(outcome)
    }

    /// Pick a host and run a shell on it. Quitting the selector is not an error.
    pub fn run(&self) -> anyhow::Result<()> {
        match self.select()? {
            SelectionOutcome::Quit => {
                info!("quit without connecting");
                Ok(())
            }
            SelectionOutcome::Chosen(index) => {
                let host = &self.config.servers[index];
                info!(index, host = %host.host, "host selected");
                self.connect(host)?;
                Ok(())
            }
        }
    }

    fn connect(&self, host: &HostRecord) -> anyhow::Result<()> {
        let detected = crossterm::terminal::size()
            .ok()
            .map(|(cols, rows)| Size::new(cols, rows));
        let pty = PtyRequest::new(&self.config.pty, detected);
        let connector = SshConnector::new(self.config.connect_timeout());

        let rt = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;

        let result = rt.block_on(async move {
            let cancel = CancellationToken::new();
            let (size_tx, size_rx) = watch::channel(pty.size);
            signals::cancel_on_interrupt(cancel.clone());
            signals::watch_window_size(cancel.clone(), size_tx);

            let mut bridge = ShellBridge::new(connector, CrosstermMode, pty)
                .with_cancellation(cancel.clone())
                .with_resize(size_rx);
            let result = bridge.run(host, LocalStreams::process()).await;

            // stops the signal watchers
            cancel.cancel();
            result
        });

        rt.shutdown_timeout(RUNTIME_SHUTDOWN);
        Ok(result?)
    }
}

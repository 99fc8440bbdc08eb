use std::{
    io::{self, stdout, Stdout, Write},
    ops::{Deref, DerefMut},
};

use crossterm::{
    cursor, execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{self, backend::CrosstermBackend};
use tracing::{debug, warn};

type TerminalBackend<W> = ratatui::Terminal<CrosstermBackend<W>>;

/// Full-screen terminal used by the host selector.
///
/// Raw mode and the alternate screen are active for the lifetime of the value
/// and undone on drop.
pub struct Terminal<W: Write> {
    inner: TerminalBackend<W>,
}

impl Terminal<Stdout> {
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen, Clear(ClearType::All)) {
            let _ = disable_raw_mode();
            return Err(err);
        }

        let backend = CrosstermBackend::new(stdout);
        let inner = match ratatui::Terminal::new(backend) {
            Ok(inner) => inner,
            Err(err) => {
                let _ = restore_terminal(&mut io::stdout());
                return Err(err);
            }
        };

        Ok(Self { inner })
    }
}

impl<W: Write> Deref for Terminal<W> {
    type Target = TerminalBackend<W>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<W: Write> DerefMut for Terminal<W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<W: Write> Drop for Terminal<W> {
    fn drop(&mut self) {
        if let Err(err) = restore_terminal(self.inner.backend_mut()) {
            warn!(error = %err, "failed to restore terminal after selection");
        }
    }
}

fn restore_terminal(out: &mut impl Write) -> io::Result<()> {
    let screen = execute!(out, LeaveAlternateScreen, cursor::Show);
    disable_raw_mode()?;
    screen
}

/// Switches the local terminal between its original mode and raw mode.
pub trait TerminalMode {
    /// Snapshot the current mode and switch to raw.
    fn enable_raw(&mut self) -> io::Result<()>;

    /// Put back the mode captured by the last `enable_raw`.
    fn restore(&mut self) -> io::Result<()>;
}

/// The process's controlling terminal, driven through crossterm.
///
/// crossterm keeps the pre-raw termios snapshot itself and puts it back on
/// `disable_raw_mode`.
#[derive(Debug, Default)]
pub struct CrosstermMode;

impl TerminalMode for CrosstermMode {
    fn enable_raw(&mut self) -> io::Result<()> {
        enable_raw_mode()
    }

    fn restore(&mut self) -> io::Result<()> {
        disable_raw_mode()
    }
}

/// Holds the terminal in raw mode; the original mode comes back on drop.
pub struct RawModeGuard<'a, M: TerminalMode + ?Sized> {
    mode: &'a mut M,
}

impl<'a, M: TerminalMode + ?Sized> RawModeGuard<'a, M> {
    pub fn enter(mode: &'a mut M) -> io::Result<Self> {
        mode.enable_raw()?;
        debug!("terminal switched to raw mode");
        Ok(Self { mode })
    }
}

impl<M: TerminalMode + ?Sized> Drop for RawModeGuard<'_, M> {
    fn drop(&mut self) {
        match self.mode.restore() {
            Ok(()) => debug!("terminal mode restored"),
            Err(err) => warn!(error = %err, "failed to restore terminal mode"),
        }
    }
}

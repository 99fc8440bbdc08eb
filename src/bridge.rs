//! Interactive shell session over an encrypted transport.
//!
//! The bridge walks a fixed sequence of steps (connect, open a session
//! channel, enter raw mode, request a pty, start the shell, relay until the
//! remote side closes). The first failing step ends the session. Whatever
//! happened, an opened channel is closed and a raw terminal is restored before
//! [`ShellBridge::run`] returns.

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Stderr, Stdin, Stdout},
    sync::watch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{HostRecord, PtySettings};
use crate::error::{BridgeError, Cause, ExitReason};
use crate::terminal::{RawModeGuard, TerminalMode};

const RELAY_BUFFER: usize = 4096;

/// Terminal columns and rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

impl Size {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// Parameters of the remote pseudo-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub size: Size,
    pub echo: bool,
    pub input_speed: u32,
    pub output_speed: u32,
}

impl PtyRequest {
    /// Settings from the config, sized to `detected` when the local size is known.
    pub fn new(settings: &PtySettings, detected: Option<Size>) -> Self {
        Self {
            term: settings.term.clone(),
            size: detected
                .filter(|size| size.cols > 0 && size.rows > 0)
                .unwrap_or(Size::new(settings.cols, settings.rows)),
            echo: settings.echo,
            input_speed: settings.speed,
            output_speed: settings.speed,
        }
    }
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self::new(&PtySettings::default(), None)
    }
}

/// Something the remote side sent on the session channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Stdout(Bytes),
    Stderr(Bytes),
    ExitStatus(u32),
    ExitSignal { name: String, message: String },
    /// The remote side will send no more data.
    Eof,
    Closed,
}

/// Opens transports to configured hosts.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Transport: Transport;

    /// Connect and authenticate with the host's secret.
    async fn connect(&self, host: &HostRecord) -> Result<Self::Transport, Cause>;
}

/// An authenticated, encrypted connection.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Channel: SessionChannel;

    async fn open_session(&mut self) -> Result<Self::Channel, Cause>;

    async fn disconnect(&mut self) -> Result<(), Cause>;
}

/// One logical session channel over a [`Transport`].
#[allow(async_fn_in_trait)]
pub trait SessionChannel {
    /// Resolves once the remote side accepted or rejected the request.
    async fn request_pty(&mut self, pty: &PtyRequest) -> Result<(), Cause>;

    /// Resolves once the remote side accepted or rejected the request.
    async fn request_shell(&mut self) -> Result<(), Cause>;

    async fn send(&mut self, data: &[u8]) -> Result<(), Cause>;

    async fn send_eof(&mut self) -> Result<(), Cause>;

    async fn window_change(&mut self, size: Size) -> Result<(), Cause>;

    /// Next event from the remote side, `None` once the channel is gone.
    ///
    /// Must be cancel safe: it is polled inside `tokio::select!`.
    async fn next_event(&mut self) -> Option<SessionEvent>;

    async fn close(&mut self) -> Result<(), Cause>;
}

/// The local ends of the relay.
pub struct LocalStreams<I, O, E> {
    pub stdin: I,
    pub stdout: O,
    pub stderr: E,
}

impl LocalStreams<Stdin, Stdout, Stderr> {
    /// The process's own standard streams.
    pub fn process() -> Self {
        Self {
            stdin: tokio::io::stdin(),
            stdout: tokio::io::stdout(),
            stderr: tokio::io::stderr(),
        }
    }
}

pub struct ShellBridge<C, M> {
    connector: C,
    mode: M,
    pty: PtyRequest,
    cancel: CancellationToken,
    resize: Option<watch::Receiver<Size>>,
}

impl<C: Connector, M: TerminalMode> ShellBridge<C, M> {
    pub fn new(connector: C, mode: M, pty: PtyRequest) -> Self {
        Self {
            connector,
            mode,
            pty,
            cancel: CancellationToken::new(),
            resize: None,
        }
    }

    /// Interrupt the session when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Forward local size changes as window-change requests.
    pub fn with_resize(mut self, resize: watch::Receiver<Size>) -> Self {
        self.resize = Some(resize);
        self
    }

    pub fn terminal_mode(&self) -> &M {
        &self.mode
    }

    pub async fn run<I, O, E>(
        &mut self,
        host: &HostRecord,
        streams: LocalStreams<I, O, E>,
    ) -> Result<(), BridgeError>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let target = host.address();
        info!(addr = %target, user = %host.user, "connecting");

        let connected = tokio::select! {
            res = self.connector.connect(host) => res,
            _ = self.cancel.cancelled() => return Err(interrupted("connect")),
        };
        let mut transport =
            connected.map_err(|source| BridgeError::ConnectFailed { target, source })?;

        let result = self.session(&mut transport, streams).await;

        if let Err(err) = transport.disconnect().await {
            warn!(error = %err, "failed to disconnect");
        }
        match &result {
            Ok(()) => info!("session finished"),
            Err(err) => info!(error = %err, step = %err.kind(), "session ended with error"),
        }
        result
    }

    async fn session<I, O, E>(
        &mut self,
        transport: &mut C::Transport,
        streams: LocalStreams<I, O, E>,
    ) -> Result<(), BridgeError>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let opened = tokio::select! {
            res = transport.open_session() => res,
            _ = self.cancel.cancelled() => return Err(interrupted("open session")),
        };
        let mut channel = opened.map_err(BridgeError::SessionFailed)?;
        debug!("session channel open");

        let raw = match RawModeGuard::enter(&mut self.mode) {
            Ok(raw) => raw,
            Err(err) => {
                close_channel(&mut channel).await;
                return Err(BridgeError::TerminalModeFailed(err));
            }
        };

        let result = interact(
            &mut channel,
            &self.pty,
            streams,
            &self.cancel,
            &mut self.resize,
        )
        .await;

        close_channel(&mut channel).await;
        drop(raw);
        result
    }
}

fn interrupted(step: &str) -> BridgeError {
    info!(step, "interrupted");
    BridgeError::Interrupted
}

async fn close_channel<Ch: SessionChannel>(channel: &mut Ch) {
    match channel.close().await {
        Ok(()) => debug!("session channel closed"),
        Err(err) => warn!(error = %err, "failed to close session channel"),
    }
}

async fn interact<Ch, I, O, E>(
    channel: &mut Ch,
    pty: &PtyRequest,
    streams: LocalStreams<I, O, E>,
    cancel: &CancellationToken,
    resize: &mut Option<watch::Receiver<Size>>,
) -> Result<(), BridgeError>
where
    Ch: SessionChannel,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    tokio::select! {
        res = channel.request_pty(pty) => res.map_err(BridgeError::PtyFailed)?,
        _ = cancel.cancelled() => return Err(interrupted("request pty")),
    }
    debug!(term = %pty.term, cols = pty.size.cols, rows = pty.size.rows, "pty allocated");

    tokio::select! {
        res = channel.request_shell() => res.map_err(BridgeError::ShellStartFailed)?,
        _ = cancel.cancelled() => return Err(interrupted("start shell")),
    }
    debug!("shell started");

    let LocalStreams {
        mut stdin,
        mut stdout,
        mut stderr,
    } = streams;

    let mut buf = vec![0u8; RELAY_BUFFER];
    let mut stdin_open = true;
    let mut exit: Option<ExitReason> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(interrupted("relay")),
            event = channel.next_event() => match event {
                Some(SessionEvent::Stdout(data)) => forward(&mut stdout, &data).await?,
                Some(SessionEvent::Stderr(data)) => forward(&mut stderr, &data).await?,
                Some(SessionEvent::ExitStatus(code)) => {
                    debug!(code, "remote exit status");
                    exit = Some(ExitReason::Status(code));
                }
                Some(SessionEvent::ExitSignal { name, message }) => {
                    debug!(signal = %name, "remote killed by signal");
                    exit = Some(ExitReason::Signal { name, message });
                }
                Some(SessionEvent::Eof) => debug!("remote eof"),
                Some(SessionEvent::Closed) | None => break,
            },
            read = stdin.read(&mut buf), if stdin_open => match read {
                Ok(0) => {
                    debug!("local stdin closed");
                    stdin_open = false;
                    if let Err(err) = channel.send_eof().await {
                        warn!(error = %err, "failed to send eof");
                    }
                }
                Ok(n) => {
                    if let Err(err) = channel.send(&buf[..n]).await {
                        warn!(error = %err, "failed to send input, no longer reading stdin");
                        stdin_open = false;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to read stdin");
                    stdin_open = false;
                }
            },
            size = next_size(resize) => match size {
                Some(size) => {
                    if let Err(err) = channel.window_change(size).await {
                        warn!(error = %err, "failed to forward window size");
                    }
                }
                None => *resize = None,
            },
        }
    }

    stdout.flush().await.map_err(BridgeError::RelayFailed)?;
    stderr.flush().await.map_err(BridgeError::RelayFailed)?;

    match exit {
        None => {
            warn!("remote closed without an exit status");
            Ok(())
        }
        Some(ExitReason::Status(0)) => Ok(()),
        Some(reason) => Err(BridgeError::RemoteExit(reason)),
    }
}

async fn forward<W: AsyncWrite + Unpin>(out: &mut W, data: &[u8]) -> Result<(), BridgeError> {
    out.write_all(data).await.map_err(BridgeError::RelayFailed)?;
    out.flush().await.map_err(BridgeError::RelayFailed)
}

// Pending forever without a resize source; `None` once the sender is gone.
async fn next_size(resize: &mut Option<watch::Receiver<Size>>) -> Option<Size> {
    match resize {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

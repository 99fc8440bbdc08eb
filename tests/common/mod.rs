#![allow(dead_code)]

use std::{
    collections::VecDeque,
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use bytes::Bytes;
use stabby::{
    bridge::{Connector, SessionChannel, SessionEvent, Transport},
    error::Cause,
    HostRecord, PtyRequest, Size, TerminalMode,
};
use tokio::io::AsyncWrite;

pub fn host() -> HostRecord {
    HostRecord::new("fake.example", 22, "test box").with_secret("hunter2")
}

pub fn stdout_event(text: &str) -> SessionEvent {
    SessionEvent::Stdout(Bytes::copy_from_slice(text.as_bytes()))
}

/// How the fake remote side behaves.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub fail_connect: bool,
    pub hang_connect: bool,
    pub fail_session: bool,
    /// Never answer the session, pty or shell request.
    pub hang_session: bool,
    pub hang_pty: bool,
    pub hang_shell: bool,
    pub fail_pty: bool,
    pub fail_shell: bool,
    pub fail_close: bool,
    pub events: Vec<SessionEvent>,
    /// Once `events` run out, wait forever instead of reporting the channel gone.
    pub hang: bool,
    /// Exit cleanly when the local side sends eof.
    pub exit_on_eof: bool,
}

/// Everything the bridge asked the fake remote side to do.
#[derive(Debug, Default)]
pub struct Calls {
    pub connected: bool,
    pub session_opened: bool,
    pub pty: Option<PtyRequest>,
    pub shell_started: bool,
    pub input: Vec<u8>,
    pub eof_sent: bool,
    pub resized: Vec<Size>,
    pub channel_closed: usize,
    pub disconnected: usize,
}

pub type SharedCalls = Arc<Mutex<Calls>>;

pub struct FakeConnector {
    script: Script,
    calls: SharedCalls,
}

impl FakeConnector {
    pub fn new(script: Script) -> (Self, SharedCalls) {
        let calls = SharedCalls::default();
        (
            Self {
                script,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

fn refused(what: &str) -> Cause {
    io::Error::new(io::ErrorKind::Other, format!("{what} refused")).into()
}

impl Connector for FakeConnector {
    type Transport = FakeTransport;

    async fn connect(&self, _host: &HostRecord) -> Result<FakeTransport, Cause> {
        if self.script.hang_connect {
            std::future::pending::<()>().await;
        }
        if self.script.fail_connect {
            return Err(refused("connection"));
        }
        self.calls.lock().unwrap().connected = true;
        Ok(FakeTransport {
            script: self.script.clone(),
            calls: self.calls.clone(),
        })
    }
}

pub struct FakeTransport {
    script: Script,
    calls: SharedCalls,
}

impl Transport for FakeTransport {
    type Channel = FakeChannel;

    async fn open_session(&mut self) -> Result<FakeChannel, Cause> {
        if self.script.hang_session {
            std::future::pending::<()>().await;
        }
        if self.script.fail_session {
            return Err(refused("session"));
        }
        self.calls.lock().unwrap().session_opened = true;
        Ok(FakeChannel {
            events: self.script.events.iter().cloned().collect(),
            script: self.script.clone(),
            calls: self.calls.clone(),
        })
    }

    async fn disconnect(&mut self) -> Result<(), Cause> {
        self.calls.lock().unwrap().disconnected += 1;
        Ok(())
    }
}

pub struct FakeChannel {
    events: VecDeque<SessionEvent>,
    script: Script,
    calls: SharedCalls,
}

impl SessionChannel for FakeChannel {
    async fn request_pty(&mut self, pty: &PtyRequest) -> Result<(), Cause> {
        self.calls.lock().unwrap().pty = Some(pty.clone());
        if self.script.hang_pty {
            std::future::pending::<()>().await;
        }
        if self.script.fail_pty {
            return Err(refused("pty"));
        }
        Ok(())
    }

    async fn request_shell(&mut self) -> Result<(), Cause> {
        if self.script.hang_shell {
            std::future::pending::<()>().await;
        }
        if self.script.fail_shell {
            return Err(refused("shell"));
        }
        self.calls.lock().unwrap().shell_started = true;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), Cause> {
        self.calls.lock().unwrap().input.extend_from_slice(data);
        Ok(())
    }

    async fn send_eof(&mut self) -> Result<(), Cause> {
        self.calls.lock().unwrap().eof_sent = true;
        if self.script.exit_on_eof {
            self.events.push_back(SessionEvent::ExitStatus(0));
            self.events.push_back(SessionEvent::Closed);
        }
        Ok(())
    }

    async fn window_change(&mut self, size: Size) -> Result<(), Cause> {
        self.calls.lock().unwrap().resized.push(size);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<SessionEvent> {
        tokio::task::yield_now().await;
        match self.events.pop_front() {
            Some(event) => Some(event),
            None if self.script.hang || self.script.exit_on_eof => {
                std::future::pending().await
            }
            None => None,
        }
    }

    async fn close(&mut self) -> Result<(), Cause> {
        self.calls.lock().unwrap().channel_closed += 1;
        if self.script.fail_close {
            return Err(refused("close"));
        }
        Ok(())
    }
}

/// Terminal double that tracks the mode instead of touching a tty.
#[derive(Debug, Clone, Default)]
pub struct RecordingMode {
    pub raw: bool,
    pub snapshots: usize,
    pub restores: usize,
    pub fail_enable: bool,
}

impl RecordingMode {
    pub fn failing() -> Self {
        Self {
            fail_enable: true,
            ..Default::default()
        }
    }
}

impl TerminalMode for RecordingMode {
    fn enable_raw(&mut self) -> io::Result<()> {
        if self.fail_enable {
            return Err(io::Error::new(io::ErrorKind::Other, "not a terminal"));
        }
        self.raw = true;
        self.snapshots += 1;
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        self.raw = false;
        self.restores += 1;
        Ok(())
    }
}

/// A local stream that rejects every write.
pub struct BrokenPipe;

impl AsyncWrite for BrokenPipe {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

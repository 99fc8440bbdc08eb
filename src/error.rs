use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Underlying cause reported by a transport implementation.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The step of the shell bridge that ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectFailed,
    SessionFailed,
    TerminalModeFailed,
    PtyFailed,
    ShellStartFailed,
    RemoteExit,
    RelayFailed,
    Interrupted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            ErrorKind::ConnectFailed => "connect",
            ErrorKind::SessionFailed => "open session",
            ErrorKind::TerminalModeFailed => "enter raw mode",
            ErrorKind::PtyFailed => "request pty",
            ErrorKind::ShellStartFailed => "start shell",
            ErrorKind::RemoteExit => "remote exit",
            ErrorKind::RelayFailed => "relay",
            ErrorKind::Interrupted => "interrupted",
        };
        f.write_str(step)
    }
}

/// How the remote shell ended when it did not end cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Status(u32),
    Signal { name: String, message: String },
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Status(code) => write!(f, "status {code}"),
            ExitReason::Signal { name, message } if message.is_empty() => {
                write!(f, "signal {name}")
            }
            ExitReason::Signal { name, message } => write!(f, "signal {name} ({message})"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to connect to {target}")]
    ConnectFailed {
        target: String,
        #[source]
        source: Cause,
    },

    #[error("failed to open a session channel")]
    SessionFailed(#[source] Cause),

    #[error("failed to put the local terminal into raw mode")]
    TerminalModeFailed(#[source] io::Error),

    #[error("pseudo-terminal request failed")]
    PtyFailed(#[source] Cause),

    #[error("failed to start the remote shell")]
    ShellStartFailed(#[source] Cause),

    #[error("remote shell exited with {0}")]
    RemoteExit(ExitReason),

    #[error("failed to relay session output")]
    RelayFailed(#[source] io::Error),

    #[error("session interrupted")]
    Interrupted,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::ConnectFailed { .. } => ErrorKind::ConnectFailed,
            BridgeError::SessionFailed(_) => ErrorKind::SessionFailed,
            BridgeError::TerminalModeFailed(_) => ErrorKind::TerminalModeFailed,
            BridgeError::PtyFailed(_) => ErrorKind::PtyFailed,
            BridgeError::ShellStartFailed(_) => ErrorKind::ShellStartFailed,
            BridgeError::RemoteExit(_) => ErrorKind::RemoteExit,
            BridgeError::RelayFailed(_) => ErrorKind::RelayFailed,
            BridgeError::Interrupted => ErrorKind::Interrupted,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the home directory")]
    NoHomeDir,

    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("server #{index} ({host}) has port 0")]
    InvalidPort { index: usize, host: String },
}

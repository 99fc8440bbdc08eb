mod app;
pub mod bridge;
pub mod config;
pub mod error;
mod input;
pub mod logging;
mod select_box;
mod signals;
pub mod ssh;
mod terminal;

pub use app::App;
pub use bridge::{LocalStreams, PtyRequest, ShellBridge, Size};
pub use config::{Config, HostRecord};
pub use error::{BridgeError, ErrorKind, ExitReason};
pub use select_box::{SelectBox, SelectionOutcome};
pub use terminal::{CrosstermMode, RawModeGuard, Terminal, TerminalMode};

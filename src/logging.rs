use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing_subscriber::EnvFilter;

use crate::app::CRATE_NAME;

const DEFAULT_FILTER: &str = "info";

/// `<cache dir>/stabby/stabby.log`, or the working directory as a last resort.
pub fn default_log_path() -> PathBuf {
    let file = format!("{CRATE_NAME}.log");
    dirs::cache_dir()
        .map(|dir| dir.join(CRATE_NAME).join(&file))
        .unwrap_or_else(|| PathBuf::from(file))
}

/// Send tracing output to `path`, filtered by `RUST_LOG`.
///
/// stdout and stderr belong to the selector and the remote session, so
/// nothing is ever logged there.
pub fn init(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}

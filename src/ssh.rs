use std::{collections::VecDeque, sync::Arc, time::Duration};

use bytes::Bytes;
use russh::{
    client::{self, AuthResult, Handle},
    keys::{HashAlg, PublicKey},
    Channel, ChannelMsg, Disconnect, Pty,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::bridge::{Connector, PtyRequest, SessionChannel, SessionEvent, Size, Transport};
use crate::config::HostRecord;
use crate::error::Cause;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const KEEPALIVE_MAX: usize = 3;
// SSH_EXTENDED_DATA_STDERR
const STDERR_STREAM: u32 = 1;

#[derive(Debug, Error)]
pub enum SshError {
    #[error(transparent)]
    Protocol(#[from] russh::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("password authentication rejected for user {user}")]
    AuthRejected { user: String },

    #[error("{0} request rejected by the server")]
    Rejected(&'static str),

    #[error("channel closed before the {0} request was answered")]
    ChannelClosed(&'static str),
}

/// Password-authenticated SSH connections.
///
/// Host keys are not verified: every key is accepted and logged.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    connect_timeout: Option<Duration>,
}

impl SshConnector {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for SshConnector {
    type Transport = SshTransport;

    async fn connect(&self, host: &HostRecord) -> Result<SshTransport, Cause> {
        let config = Arc::new(client::Config {
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            keepalive_max: KEEPALIVE_MAX,
            ..Default::default()
        });
        let handler = AcceptAnyHostKey {
            target: host.address(),
        };

        let connecting = client::connect(config, (host.host.as_str(), host.port), handler);
        let mut handle = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| SshError::Timeout(limit))?,
            None => connecting.await,
        }
        .map_err(SshError::from)?;
        debug!(addr = %host.address(), "transport established");

        let auth = handle
            .authenticate_password(host.user.as_str(), host.secret.as_str())
            .await
            .map_err(SshError::from)?;
        match auth {
            AuthResult::Success => {}
            AuthResult::Failure {
                remaining_methods, ..
            } => {
                debug!(?remaining_methods, "password rejected");
                return Err(SshError::AuthRejected {
                    user: host.user.clone(),
                }
                .into());
            }
        }
        debug!(user = %host.user, "authenticated");

        Ok(SshTransport { handle })
    }
}

struct AcceptAnyHostKey {
    target: String,
}

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(&mut self, key: &PublicKey) -> Result<bool, Self::Error> {
        warn!(
            addr = %self.target,
            algorithm = %key.algorithm(),
            fingerprint = %key.fingerprint(HashAlg::Sha256),
            "accepting unverified host key"
        );
        Ok(true)
    }
}

pub struct SshTransport {
    handle: Handle<AcceptAnyHostKey>,
}

impl Transport for SshTransport {
    type Channel = SshChannel;

    async fn open_session(&mut self) -> Result<SshChannel, Cause> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(SshError::from)?;
        Ok(SshChannel {
            channel,
            pending: VecDeque::new(),
        })
    }

    async fn disconnect(&mut self) -> Result<(), Cause> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(SshError::from)?;
        Ok(())
    }
}

pub struct SshChannel {
    channel: Channel<client::Msg>,
    // messages that arrived while waiting for a request reply
    pending: VecDeque<ChannelMsg>,
}

impl SshChannel {
    async fn reply(&mut self, request: &'static str) -> Result<(), SshError> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => return Err(SshError::Rejected(request)),
                Some(ChannelMsg::Close) | None => return Err(SshError::ChannelClosed(request)),
                Some(msg) => self.pending.push_back(msg),
            }
        }
    }
}

impl SessionChannel for SshChannel {
    async fn request_pty(&mut self, pty: &PtyRequest) -> Result<(), Cause> {
        let modes = [
            (Pty::ECHO, u32::from(pty.echo)),
            (Pty::TTY_OP_ISPEED, pty.input_speed),
            (Pty::TTY_OP_OSPEED, pty.output_speed),
        ];
        self.channel
            .request_pty(
                true,
                &pty.term,
                u32::from(pty.size.cols),
                u32::from(pty.size.rows),
                0,
                0,
                &modes,
            )
            .await
            .map_err(SshError::from)?;
        Ok(self.reply("pty").await?)
    }

    async fn request_shell(&mut self) -> Result<(), Cause> {
        self.channel
            .request_shell(true)
            .await
            .map_err(SshError::from)?;
        Ok(self.reply("shell").await?)
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), Cause> {
        self.channel.data(data).await.map_err(SshError::from)?;
        Ok(())
    }

    async fn send_eof(&mut self) -> Result<(), Cause> {
        self.channel.eof().await.map_err(SshError::from)?;
        Ok(())
    }

    async fn window_change(&mut self, size: Size) -> Result<(), Cause> {
        self.channel
            .window_change(u32::from(size.cols), u32::from(size.rows), 0, 0)
            .await
            .map_err(SshError::from)?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let msg = match self.pending.pop_front() {
                Some(msg) => msg,
                None => self.channel.wait().await?,
            };
            match msg {
                ChannelMsg::Data { data } => {
                    return Some(SessionEvent::Stdout(Bytes::copy_from_slice(&data)))
                }
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext != STDERR_STREAM {
                        debug!(ext, "extended data on unknown stream");
                    }
                    return Some(SessionEvent::Stderr(Bytes::copy_from_slice(&data)));
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    return Some(SessionEvent::ExitStatus(exit_status))
                }
                ChannelMsg::ExitSignal {
                    signal_name,
                    error_message,
                    ..
                } => {
                    return Some(SessionEvent::ExitSignal {
                        name: format!("{signal_name:?}"),
                        message: error_message,
                    })
                }
                ChannelMsg::Eof => return Some(SessionEvent::Eof),
                ChannelMsg::Close => return Some(SessionEvent::Closed),
                _ => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), Cause> {
        // eof is best effort; the channel may already be half closed
        if let Err(err) = self.channel.eof().await {
            debug!(error = %err, "eof before close failed");
        }
        self.channel.close().await.map_err(SshError::from)?;
        Ok(())
    }
}

//! Byte transports to a router's CLI.
//!
//! A [`Transport`] is a connected, authenticated-as-far-as-the-protocol-goes
//! byte pipe. SSH authenticates during connect; Telnet leaves the login
//! dialogue to the session layer.

pub mod config;
mod ssh;
mod telnet;

pub use config::{HostKeyVerification, TransportConfig, TransportKind};
pub use ssh::SshTransport;
pub use telnet::TelnetTransport;

use std::time::Duration;

use bytes::Bytes;

use crate::error::TransportError;

/// One connected transport, SSH or Telnet.
pub enum Transport {
    Ssh(SshTransport),
    Telnet(TelnetTransport),
}

impl Transport {
    /// Connect with the protocol named in `config.kind`.
    pub async fn connect(
        config: &TransportConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        match config.kind {
            TransportKind::Ssh => SshTransport::connect(config, timeout)
                .await
                .map(Transport::Ssh),
            TransportKind::Telnet => TelnetTransport::connect(config, timeout)
                .await
                .map(Transport::Telnet),
        }
    }

    /// Write raw bytes.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self {
            Transport::Ssh(t) => t.send(data).await,
            Transport::Telnet(t) => t.send(data).await,
        }
    }

    /// Wait for the next non-empty chunk of output.
    pub async fn read_chunk(&mut self) -> Result<Bytes, TransportError> {
        match self {
            Transport::Ssh(t) => t.read_chunk().await,
            Transport::Telnet(t) => t.read_chunk().await,
        }
    }

    /// Tear the connection down.
    pub async fn close(self) -> Result<(), TransportError> {
        match self {
            Transport::Ssh(t) => t.close().await,
            Transport::Telnet(t) => t.close().await,
        }
    }

    /// Which protocol this transport speaks.
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Ssh(_) => TransportKind::Ssh,
            Transport::Telnet(_) => TransportKind::Telnet,
        }
    }
}

//! Telnet transport over a tokio TCP stream.
//!
//! Option negotiation is minimal: every `DO` is answered with `WONT` and
//! every `WILL` with `DONT`, subnegotiations are skipped. What is left is
//! the plain NVT data stream the router's CLI writes.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::config::TransportConfig;
use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Position of the IAC parser between reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IacState {
    Data,
    Iac,
    /// Saw IAC followed by WILL/WONT/DO/DONT; waiting for the option byte.
    Option(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Telnet transport wrapping any byte stream (a `TcpStream` in production).
pub struct TelnetTransport<S = TcpStream> {
    stream: S,
    state: IacState,
    read_buf: BytesMut,
}

impl TelnetTransport<TcpStream> {
    /// Open the TCP connection. Telnet has no protocol-level login;
    /// credentials are exchanged in the CLI dialogue.
    pub async fn connect(
        config: &TransportConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let connect = TcpStream::connect((config.host.as_str(), config.port));
        let connected = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| TransportError::Timeout(timeout))?,
            None => connect.await,
        };

        let stream = connected.map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;
        let _ = stream.set_nodelay(true);

        Ok(Self::new(stream))
    }
}

impl<S> TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            state: IacState::Data,
            read_buf: BytesMut::with_capacity(4096),
        }
    }

    /// Write data, escaping literal 0xFF bytes.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if memchr::memchr(IAC, data).is_some() {
            let mut escaped = Vec::with_capacity(data.len() + 1);
            for &b in data {
                escaped.push(b);
                if b == IAC {
                    escaped.push(IAC);
                }
            }
            self.stream.write_all(&escaped).await?;
        } else {
            self.stream.write_all(data).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Wait for the next chunk of data, answering negotiation on the way.
    ///
    /// Never returns an empty chunk: reads that carried only negotiation
    /// bytes are followed by another read.
    pub async fn read_chunk(&mut self) -> Result<Bytes, TransportError> {
        loop {
            self.read_buf.clear();
            self.read_buf.reserve(4096);
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(TransportError::Disconnected);
            }

            let raw = self.read_buf.split().freeze();
            let (data, replies) = self.filter(&raw);
            if !replies.is_empty() {
                trace!("telnet negotiation reply: {:?}", replies.as_ref());
                self.stream.write_all(&replies).await?;
                self.stream.flush().await?;
            }
            if !data.is_empty() {
                return Ok(data.freeze());
            }
        }
    }

    /// Split raw bytes into NVT data and the negotiation replies they require.
    fn filter(&mut self, raw: &[u8]) -> (BytesMut, BytesMut) {
        let mut data = BytesMut::with_capacity(raw.len());
        let mut replies = BytesMut::new();

        for &b in raw {
            self.state = match (self.state, b) {
                (IacState::Data, IAC) => IacState::Iac,
                (IacState::Data, _) => {
                    data.put_u8(b);
                    IacState::Data
                }
                (IacState::Iac, IAC) => {
                    data.put_u8(IAC);
                    IacState::Data
                }
                (IacState::Iac, WILL | WONT | DO | DONT) => IacState::Option(b),
                (IacState::Iac, SB) => IacState::Subnegotiation,
                (IacState::Iac, _) => IacState::Data,
                (IacState::Option(verb), option) => {
                    match verb {
                        DO => replies.put_slice(&[IAC, WONT, option]),
                        WILL => replies.put_slice(&[IAC, DONT, option]),
                        _ => {}
                    }
                    IacState::Data
                }
                (IacState::Subnegotiation, IAC) => IacState::SubnegotiationIac,
                (IacState::Subnegotiation, _) => IacState::Subnegotiation,
                (IacState::SubnegotiationIac, SE) => IacState::Data,
                (IacState::SubnegotiationIac, _) => IacState::Subnegotiation,
            };
        }

        (data, replies)
    }

    /// Shut the stream down.
    pub async fn close(mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

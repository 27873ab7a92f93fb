//! Interactive CLI session to one router.
//!
//! A [`Session`] exists only once the transport is connected: a failed
//! connect never produces a value, so nothing can execute on it.
//!
//! ```text
//! Authenticating ─► Ready ◄─► Executing
//!       │             │           │
//!       └─────────────┴───────────┴─► Closed
//! ```
//!
//! Any failure while executing (timeout, disconnect, oversized reply)
//! tears the transport down immediately, so the session is `Closed`
//! when the error reaches the caller.

use std::io;
use std::time::Duration;

use log::{debug, trace, warn};
use secrecy::ExposeSecret;
use tokio::time::Instant;

use crate::channel::OutputBuffer;
use crate::error::{
    CommandError, CommandFailure, ConnectionError, Error, LoginError, Result, TransportError,
};
use crate::platform::PlatformDefinition;
use crate::transport::{Transport, TransportConfig};

/// Upper bound on the logout sequence in [`Session::close`].
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a login failure message may stand before the exec prompt
/// follows it. Exec banners can quote the same words.
const LOGIN_FAILURE_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticating,
    Ready,
    Executing,
    Closed,
}

/// Why a read loop gave up.
#[derive(Debug)]
enum ReadError {
    Transport(TransportError),
    Timeout(Duration),
    Overflow(usize),
}

/// An authenticated shell on one router.
pub struct Session {
    /// Router name used in errors and logs.
    router: String,
    username: String,
    platform: PlatformDefinition,
    transport: Option<Transport>,
    line_ending: &'static str,
    timeout: Option<Duration>,
    buffer: OutputBuffer,
    state: SessionState,
    /// Prompt text seen after login.
    prompt: String,
}

impl Session {
    /// Connect, log in and prepare the terminal.
    ///
    /// Fails with [`ConnectionError`] when the device cannot be reached or
    /// the session cannot be set up, and with [`LoginError`] when the
    /// credentials are rejected. `timeout` bounds connect, the login
    /// dialogue and every later command separately.
    pub async fn open(
        router: impl Into<String>,
        config: &TransportConfig,
        platform: PlatformDefinition,
        timeout: Option<Duration>,
        max_output: usize,
    ) -> Result<Self> {
        let router = router.into();
        debug!(
            "{router}: connecting to {} over {}",
            config.socket_addr(),
            config.kind
        );

        let transport = match Transport::connect(config, timeout).await {
            Ok(transport) => transport,
            Err(TransportError::AuthenticationFailed { user }) => {
                debug!("{router}: {} rejected user '{user}'", config.kind);
                return Err(LoginError {
                    router,
                    user,
                    output: None,
                }
                .into());
            }
            Err(source) => return Err(ConnectionError { router, source }.into()),
        };

        let mut session = Self {
            router,
            username: config.username.clone(),
            platform,
            line_ending: transport.kind().line_ending(),
            transport: Some(transport),
            timeout,
            buffer: OutputBuffer::new(max_output),
            state: SessionState::Authenticating,
            prompt: String::new(),
        };

        if let Err(e) = session.login(config).await {
            session.teardown().await;
            return Err(e);
        }
        session.state = SessionState::Ready;
        debug!("{}: logged in, prompt {:?}", session.router, session.prompt);

        if let Err(e) = session.autoinit().await {
            session.teardown().await;
            return Err(e);
        }

        Ok(session)
    }

    /// Run one command and return its output.
    ///
    /// The echoed command line and the trailing prompt are removed. A reply
    /// matching one of the platform's error patterns fails with
    /// [`CommandError`], whatever else it contains.
    pub async fn execute(&mut self, command: &str) -> Result<String> {
        let output = match self.run(command).await {
            Ok(output) => output,
            Err((ReadError::Transport(source), _)) => {
                return Err(ConnectionError {
                    router: self.router.clone(),
                    source,
                }
                .into());
            }
            Err((ReadError::Timeout(limit), output)) => {
                return Err(self.command_error(output, CommandFailure::Timeout(limit)));
            }
            Err((ReadError::Overflow(limit), output)) => {
                return Err(self.command_error(output, CommandFailure::OutputLimit(limit)));
            }
        };

        if let Some(pattern) = self.platform.errors.classify(&output) {
            debug!("{}: {command:?} failed, matched {pattern:?}", self.router);
            let kind = CommandFailure::DeviceError {
                pattern: pattern.to_string(),
            };
            return Err(self.command_error(output, kind));
        }

        Ok(output)
    }

    /// Log out and tear the transport down. Never fails.
    pub async fn close(mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };

        let logout = async {
            for command in &self.platform.on_close_commands {
                let line = format!("{command}{}", self.line_ending);
                transport.send(line.as_bytes()).await?;
            }
            transport.close().await
        };

        match tokio::time::timeout(CLOSE_TIMEOUT, logout).await {
            Ok(Ok(())) => debug!("{}: closed", self.router),
            Ok(Err(e)) => debug!("{}: logout failed: {e}", self.router),
            Err(_) => warn!("{}: logout did not finish within {CLOSE_TIMEOUT:?}", self.router),
        }
        self.state = SessionState::Closed;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Router name this session belongs to.
    pub fn router(&self) -> &str {
        &self.router
    }

    /// Prompt seen right after login.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Answer the login dialogue until the exec prompt shows up.
    async fn login(&mut self, config: &TransportConfig) -> Result<()> {
        let deadline = self.deadline();
        let mut sent_username = false;
        let mut sent_password = false;

        loop {
            let (at_prompt, rejected, wants_username, wants_password) = {
                let line = self.buffer.last_line();
                (
                    self.platform.prompt.is_match(line),
                    sent_password
                        && self
                            .platform
                            .login_failures
                            .classify(self.buffer.as_str())
                            .is_some(),
                    self.platform.username_prompt.is_match(line),
                    self.platform.password_prompt.is_match(line),
                )
            };

            if at_prompt {
                break;
            }

            if wants_username {
                if sent_username {
                    return Err(self.login_error());
                }
                trace!("{}: sending username", self.router);
                self.buffer.clear();
                if self.send_line(&config.username).await.is_err() {
                    return Err(self.login_error());
                }
                sent_username = true;
                continue;
            }

            if wants_password {
                if sent_password {
                    return Err(self.login_error());
                }
                trace!("{}: sending password", self.router);
                self.buffer.clear();
                if self
                    .send_line(config.password.expose_secret())
                    .await
                    .is_err()
                {
                    return Err(self.login_error());
                }
                sent_password = true;
                continue;
            }

            let limit = if rejected {
                let grace = Instant::now() + LOGIN_FAILURE_GRACE;
                Some(deadline.map_or(grace, |deadline| deadline.min(grace)))
            } else {
                deadline
            };
            if let Err(e) = self.read_more(limit).await {
                debug!("{}: login dialogue aborted: {e:?}", self.router);
                return Err(self.login_error());
            }
        }

        self.prompt = self.buffer.last_line().trim_end().to_string();
        self.buffer.clear();
        Ok(())
    }

    /// Run the platform's terminal setup commands.
    ///
    /// Devices that reject one of them keep working with their defaults, so
    /// device errors are only logged. Anything that breaks the session is a
    /// connection failure.
    async fn autoinit(&mut self) -> Result<()> {
        let commands = self.platform.on_open_commands.clone();
        for command in &commands {
            match self.run(command).await {
                Ok(output) => {
                    if let Some(pattern) = self.platform.errors.classify(&output) {
                        warn!(
                            "{}: terminal setup {command:?} rejected (matched {pattern:?})",
                            self.router
                        );
                    }
                }
                Err((error, _)) => {
                    let source = match error {
                        ReadError::Transport(e) => e,
                        ReadError::Timeout(limit) => TransportError::Timeout(limit),
                        ReadError::Overflow(limit) => TransportError::Io(io::Error::other(
                            format!("terminal setup produced more than {limit} bytes"),
                        )),
                    };
                    return Err(ConnectionError {
                        router: self.router.clone(),
                        source,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Send `command` and collect everything up to the next prompt.
    ///
    /// On failure the transport is torn down and whatever was captured is
    /// handed back with the reason.
    async fn run(&mut self, command: &str) -> std::result::Result<String, (ReadError, String)> {
        self.state = SessionState::Executing;
        self.buffer.clear();
        debug!("{}: sending {command:?}", self.router);

        let deadline = self.deadline();
        let result = match self.send_line(command).await {
            Ok(()) => self.read_until_prompt(deadline).await,
            Err(e) => Err(ReadError::Transport(e)),
        };

        let raw = self.buffer.take();
        match result {
            Ok(()) => {
                self.state = SessionState::Ready;
                Ok(strip_echo_and_prompt(&raw, command))
            }
            Err(e) => {
                debug!("{}: {command:?} aborted: {e:?}", self.router);
                self.teardown().await;
                Err((e, strip_echo(&raw, command).to_string()))
            }
        }
    }

    async fn read_until_prompt(&mut self, deadline: Option<Instant>) -> std::result::Result<(), ReadError> {
        loop {
            if self.buffer.is_full() {
                return Err(ReadError::Overflow(self.buffer.max_len()));
            }
            if self.platform.prompt.is_match(self.buffer.last_line()) {
                return Ok(());
            }
            self.read_more(deadline).await?;
        }
    }

    /// Read one chunk into the buffer.
    async fn read_more(&mut self, deadline: Option<Instant>) -> std::result::Result<(), ReadError> {
        if self.buffer.is_full() {
            return Err(ReadError::Overflow(self.buffer.max_len()));
        }

        let limit = self.timeout.unwrap_or_default();
        let transport = self
            .transport
            .as_mut()
            .ok_or(ReadError::Transport(TransportError::Disconnected))?;

        let chunk = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, transport.read_chunk())
                .await
                .map_err(|_| ReadError::Timeout(limit))?,
            None => transport.read_chunk().await,
        }
        .map_err(ReadError::Transport)?;

        trace!("{}: received {} bytes", self.router, chunk.len());
        self.buffer.extend(&chunk);
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> std::result::Result<(), TransportError> {
        let transport = self.transport.as_mut().ok_or(TransportError::Disconnected)?;
        let data = format!("{line}{}", self.line_ending);
        transport.send(data.as_bytes()).await
    }

    /// Drop the transport without logging out.
    async fn teardown(&mut self) {
        if let Some(transport) = self.transport.take() {
            if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, transport.close()).await {
                debug!("{}: teardown: {e}", self.router);
            }
        }
        self.state = SessionState::Closed;
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|limit| Instant::now() + limit)
    }

    fn login_error(&mut self) -> Error {
        let output = self.buffer.take();
        LoginError {
            router: self.router.clone(),
            user: self.username.clone(),
            output: (!output.trim().is_empty()).then_some(output),
        }
        .into()
    }

    fn command_error(&self, output: String, kind: CommandFailure) -> Error {
        CommandError {
            router: self.router.clone(),
            output,
            kind,
        }
        .into()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // dropping the transport closes its socket
        if self.transport.is_some() {
            debug!("{}: session dropped without close()", self.router);
        }
    }
}

/// Remove the echoed command line, if present.
fn strip_echo<'a>(raw: &'a str, command: &str) -> &'a str {
    let command = command.trim();
    if command.is_empty() {
        return raw;
    }
    match raw.split_once('\n') {
        Some((first, rest)) if first.trim_end().ends_with(command) => rest,
        None if raw.trim_end().ends_with(command) => "",
        _ => raw,
    }
}

/// Remove the echoed command line and the trailing prompt line.
fn strip_echo_and_prompt(raw: &str, command: &str) -> String {
    let body = match raw.rfind('\n') {
        Some(pos) => &raw[..pos],
        None => "",
    };
    strip_echo(body, command).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DEFAULT_MAX_OUTPUT;
    use crate::error::TransportError;
    use crate::platform::vendors::ios;
    use crate::testing::{FakeRouter, Script, closed_port_config};

    const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

    async fn open(router: &FakeRouter) -> Result<Session> {
        Session::open(
            "r1",
            &router.transport_config(),
            ios::platform(),
            TIMEOUT,
            DEFAULT_MAX_OUTPUT,
        )
        .await
    }

    #[test]
    fn test_strip_echo_and_prompt() {
        let raw = "show ip route 192.0.2.1\nRouting entry for 192.0.2.0/24\n  Known via \"bgp 65000\"\nrouter#";
        assert_eq!(
            strip_echo_and_prompt(raw, "show ip route 192.0.2.1"),
            "Routing entry for 192.0.2.0/24\n  Known via \"bgp 65000\""
        );

        let with_prompt_prefix = "router#terminal length 0\nrouter#";
        assert_eq!(strip_echo_and_prompt(with_prompt_prefix, "terminal length 0"), "");
        assert_eq!(strip_echo_and_prompt("router#", "x"), "");
        assert_eq!(strip_echo_and_prompt("no echo\nrouter#", "x"), "no echo");
    }

    #[tokio::test]
    async fn test_open_execute_close() {
        let router = FakeRouter::start(
            Script::new("router#").reply("show clock", "*10:00:00.000 UTC Mon Jan 1 2024"),
        )
        .await;

        let mut session = open(&router).await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.prompt(), "router#");

        let output = session.execute("show clock").await.unwrap();
        assert_eq!(output, "*10:00:00.000 UTC Mon Jan 1 2024");
        assert_eq!(session.state(), SessionState::Ready);

        session.close().await;
        router.wait_for_commands(5).await;
        assert_eq!(
            router.commands(),
            ["terminal length 0", "terminal width 0", "show clock", "exit", "exit"]
        );
    }

    #[tokio::test]
    async fn test_device_error_is_command_error() {
        let router = FakeRouter::start(Script::new("router#").reply(
            "show bgp ipv4 unicast 192.0.2.0",
            "BGP routing table entry for 192.0.2.0/24\n% Invalid input detected at '^' marker.",
        ))
        .await;

        let mut session = open(&router).await.unwrap();
        let err = session
            .execute("show bgp ipv4 unicast 192.0.2.0")
            .await
            .unwrap_err();
        match err {
            Error::Command(e) => {
                assert_eq!(e.router, "r1");
                assert!(e.output.contains("BGP routing table entry"));
                assert!(matches!(e.kind, CommandFailure::DeviceError { .. }));
            }
            other => panic!("expected command error, got {other:?}"),
        }
        // a device error leaves the session usable
        assert_eq!(session.state(), SessionState::Ready);
        session.close().await;
    }

    #[tokio::test]
    async fn test_bad_password_is_login_error() {
        let router = FakeRouter::start(Script::new("router#")).await;
        let mut config = router.transport_config();
        config.password = "wrong".into();

        let err = Session::open("r1", &config, ios::platform(), TIMEOUT, DEFAULT_MAX_OUTPUT)
            .await
            .err()
            .unwrap();
        match err {
            Error::Login(e) => {
                assert_eq!(e.router, "r1");
                assert_eq!(e.user, "lg");
                assert!(e.output.unwrap().contains("Login invalid"));
            }
            other => panic!("expected login error, got {other:?}"),
        }
        assert!(router.commands().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_password_prompt_is_login_error() {
        let router = FakeRouter::start(Script::new("router#").reprompt_password()).await;
        let err = open(&router).await.err().unwrap();
        match err {
            Error::Login(e) => assert!(e.output.unwrap().contains("Password:")),
            other => panic!("expected login error, got {other:?}"),
        }
        router.wait_for_closed(1).await;
        assert_eq!(router.closed(), 1);
    }

    #[tokio::test]
    async fn test_banner_quoting_failure_words_is_not_a_login_failure() {
        let router = FakeRouter::start(
            Script::new("router#")
                .banner("Access denied to unauthorised users. All activity is logged.")
                .reply("show clock", "*10:00:00.000 UTC Mon Jan 1 2024"),
        )
        .await;

        let mut session = open(&router).await.unwrap();
        assert_eq!(session.prompt(), "router#");
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(
            session.execute("show clock").await.unwrap(),
            "*10:00:00.000 UTC Mon Jan 1 2024"
        );
        session.close().await;
    }

    #[tokio::test]
    async fn test_drop_without_close_hangs_up() {
        let router = FakeRouter::start(Script::new("router#")).await;
        let session = open(&router).await.unwrap();
        assert_eq!(router.closed(), 0);

        drop(session);
        router.wait_for_closed(1).await;
        assert_eq!(router.closed(), 1);
        // no logout was sent
        assert!(!router.commands().iter().any(|c| c == "exit"));
    }

    #[tokio::test]
    async fn test_unreachable_is_connection_error() {
        let config = closed_port_config().await;
        let err = Session::open("r1", &config, ios::platform(), TIMEOUT, DEFAULT_MAX_OUTPUT)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError {
                source: TransportError::ConnectionFailed { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_timeout_closes_session() {
        let router = FakeRouter::start(Script::new("router#").hang_on("traceroute ip 192.0.2.1"))
            .await;
        let mut session = Session::open(
            "r1",
            &router.transport_config(),
            ios::platform(),
            Some(Duration::from_millis(300)),
            DEFAULT_MAX_OUTPUT,
        )
        .await
        .unwrap();

        let err = session.execute("traceroute ip 192.0.2.1").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Command(CommandError {
                kind: CommandFailure::Timeout(_),
                ..
            })
        ));
        assert_eq!(session.state(), SessionState::Closed);

        // the transport is gone; further commands fail without I/O
        assert!(matches!(
            session.execute("show clock").await,
            Err(Error::Connection(_))
        ));
        session.close().await;
    }

    #[tokio::test]
    async fn test_output_limit() {
        let big = "x".repeat(200);
        let router = FakeRouter::start(Script::new("router#").reply("show big", &big)).await;
        let mut session = Session::open(
            "r1",
            &router.transport_config(),
            ios::platform(),
            TIMEOUT,
            64,
        )
        .await
        .unwrap();

        let err = session.execute("show big").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Command(CommandError {
                kind: CommandFailure::OutputLimit(64),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_escape_sequences_are_stripped() {
        let router = FakeRouter::start(
            Script::new("router#").reply("show version", "\x1b[1mCisco IOS\x1b[0m Software"),
        )
        .await;
        let mut session = open(&router).await.unwrap();
        assert_eq!(session.execute("show version").await.unwrap(), "Cisco IOS Software");
        session.close().await;
    }
}

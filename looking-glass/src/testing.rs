//! Scripted Telnet router for tests.
//!
//! Serves an IOS-style login dialogue on `127.0.0.1`, echoes every command
//! and answers from a table of canned replies. Unknown commands get the IOS
//! "invalid input" marker; `exit` hangs up. A connection counts as closed
//! once the client hangs up its end.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::transport::{TransportConfig, TransportKind};

pub(crate) const USERNAME: &str = "lg";
pub(crate) const PASSWORD: &str = "secret";

const IAC: u8 = 255;
const WILL: u8 = 251;
const ECHO: u8 = 1;
const SGA: u8 = 3;

/// What the fake router says.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    prompt: String,
    replies: HashMap<String, String>,
    hang: HashSet<String>,
    banner: Option<String>,
    reprompt_password: bool,
}

impl Script {
    pub(crate) fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            replies: HashMap::new(),
            hang: HashSet::new(),
            banner: None,
            reprompt_password: false,
        }
    }

    /// Answer `command` with `output`.
    pub(crate) fn reply(mut self, command: &str, output: &str) -> Self {
        self.replies.insert(command.to_string(), output.to_string());
        self
    }

    /// Never answer `command`.
    pub(crate) fn hang_on(mut self, command: &str) -> Self {
        self.hang.insert(command.to_string());
        self
    }

    /// Show `banner` after login, a little ahead of the prompt.
    pub(crate) fn banner(mut self, banner: &str) -> Self {
        self.banner = Some(banner.to_string());
        self
    }

    /// Ask for the password again instead of accepting it.
    pub(crate) fn reprompt_password(mut self) -> Self {
        self.reprompt_password = true;
        self
    }

    fn answer(&self, command: &str) -> String {
        if let Some(reply) = self.replies.get(command) {
            return format!("{reply}\r\n");
        }
        if command.starts_with("terminal ") {
            return String::new();
        }
        "                 ^\r\n% Invalid input detected at '^' marker.\r\n\r\n".to_string()
    }
}

/// A running fake router. Stops when dropped.
pub(crate) struct FakeRouter {
    port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeRouter {
    pub(crate) async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(script);

        let task = {
            let commands = commands.clone();
            let connections = connections.clone();
            let closed = closed.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let script = script.clone();
                    let commands = commands.clone();
                    let closed = closed.clone();
                    tokio::spawn(async move {
                        let _ = serve(stream, &script, &commands).await;
                        closed.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            port,
            commands,
            connections,
            closed,
            task,
        }
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Telnet settings with working credentials.
    pub(crate) fn transport_config(&self) -> TransportConfig {
        let mut config =
            TransportConfig::new(TransportKind::Telnet, "127.0.0.1", USERNAME, PASSWORD.into());
        config.port = self.port;
        config
    }

    /// Every command received so far, across all connections.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Number of accepted connections.
    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Number of connections the client has hung up.
    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until the client hung up at least `n` connections.
    pub(crate) async fn wait_for_closed(&self, n: usize) {
        for _ in 0..100 {
            if self.closed() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait until at least `n` commands arrived; the logout is sent without
    /// waiting for the router, so it can trail the session's return.
    pub(crate) async fn wait_for_commands(&self, n: usize) {
        for _ in 0..100 {
            if self.commands.lock().unwrap().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for FakeRouter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Telnet settings for a port nothing listens on.
pub(crate) async fn closed_port_config() -> TransportConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config =
        TransportConfig::new(TransportKind::Telnet, "127.0.0.1", USERNAME, PASSWORD.into());
    config.port = port;
    config
}

async fn serve(
    stream: TcpStream,
    script: &Script,
    commands: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer.write_all(&[IAC, WILL, ECHO, IAC, WILL, SGA]).await?;

    loop {
        writer
            .write_all(b"\r\n\r\nUser Access Verification\r\n\r\nUsername: ")
            .await?;
        let Some(user) = read_line(&mut reader).await? else {
            return Ok(());
        };
        writer.write_all(format!("{user}\r\nPassword: ").as_bytes()).await?;
        let Some(password) = read_line(&mut reader).await? else {
            return Ok(());
        };
        if script.reprompt_password {
            writer.write_all(b"\r\nPassword: ").await?;
            while read_line(&mut reader).await?.is_some() {}
            return Ok(());
        }
        if user == USERNAME && password == PASSWORD {
            break;
        }
        writer.write_all(b"\r\n% Login invalid\r\n").await?;
    }

    if let Some(banner) = &script.banner {
        writer.write_all(format!("\r\n{banner}\r\n").as_bytes()).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    writer
        .write_all(format!("\r\n\r\n{}", script.prompt).as_bytes())
        .await?;

    let mut logged_out = false;
    while let Some(command) = read_line(&mut reader).await? {
        commands.lock().unwrap().push(command.clone());

        // keep reading after logout so trailing lines are still recorded
        if logged_out {
            continue;
        }
        if command == "exit" {
            logged_out = true;
            let _ = writer.shutdown().await;
            continue;
        }

        writer.write_all(format!("{command}\r\n").as_bytes()).await?;
        if script.hang.contains(&command) {
            continue;
        }

        let reply = script.answer(&command);
        writer
            .write_all(format!("{reply}{}", script.prompt).as_bytes())
            .await?;
    }
    Ok(())
}

/// Read one line, dropping telnet negotiation replies and line endings.
async fn read_line<R>(reader: &mut BufReader<R>) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::new();
    if reader.read_until(b'\n', &mut raw).await? == 0 {
        return Ok(None);
    }

    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == IAC {
            i += 3;
            continue;
        }
        bytes.push(raw[i]);
        i += 1;
    }

    let line = String::from_utf8_lossy(&bytes);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

//! IRC adapter - TCP connection, registration and the read loop

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::application::messaging::EventDispatcher;
use crate::domain::entities::{cmd, Message};
use crate::domain::traits::{Client, ClientHandle};
use crate::infrastructure::config::ServerConfig;

/// How long queued lines get to reach the socket once the read side ends
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound half of a live connection
///
/// Lines are queued on an unbounded channel and written by a separate task,
/// so sending from a handler never waits on the socket.
pub struct IrcClient {
    nick: RwLock<String>,
    outbound: mpsc::UnboundedSender<String>,
}

impl IrcClient {
    pub fn new(nick: &str, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            nick: RwLock::new(nick.to_string()),
            outbound,
        }
    }
}

impl Client for IrcClient {
    fn current_nick(&self) -> String {
        match self.nick.read() {
            Ok(nick) => nick.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_nick(&self, nick: &str) {
        match self.nick.write() {
            Ok(mut current) => *current = nick.to_string(),
            Err(poisoned) => *poisoned.into_inner() = nick.to_string(),
        }
    }

    fn send_raw(&self, line: &str) -> Result<(), BotError> {
        // A stray CR or LF would split one line into two commands
        let line: String = line.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        tracing::debug!(">> {}", line);
        self.outbound.send(line).map_err(|_| BotError::Disconnected)
    }
}

/// One connection attempt to the configured server
pub struct IrcConnection {
    config: ServerConfig,
}

impl IrcConnection {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Connect, register and process events until the server goes away
    pub async fn run(&self, dispatcher: &EventDispatcher) -> Result<(), BotError> {
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        tracing::info!("Connecting to {}", self.config.address);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&self.config.address))
            .await
            .map_err(|_| BotError::Network(format!("Timed out connecting to {}", self.config.address)))?
            .map_err(|e| BotError::Network(format!("Failed to connect to {}: {}", self.config.address, e)))?;

        tracing::info!("Connected to {}", self.config.address);
        self.serve(stream, dispatcher).await
    }

    /// Drive an already open stream
    pub async fn serve<S>(&self, stream: S, dispatcher: &EventDispatcher) -> Result<(), BotError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer_task = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    tracing::warn!("Write failed: {}", e);
                    break;
                }
                if let Err(e) = writer.write_all(b"\r\n").await {
                    tracing::warn!("Write failed: {}", e);
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        let client: ClientHandle = Arc::new(IrcClient::new(&self.config.nick, tx));
        self.register(client.as_ref())?;

        let result = read_loop(reader, &client, dispatcher).await;

        // Closing the last sender lets the writer drain what is queued and exit
        drop(client);
        let mut writer_task = writer_task;
        if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer_task).await.is_err() {
            tracing::warn!("Outbound queue did not drain, dropping remaining lines");
            writer_task.abort();
        }
        result
    }

    fn register(&self, client: &dyn Client) -> Result<(), BotError> {
        client.send_raw(&format!("{} {}", cmd::NICK, self.config.nick))?;
        client.send_raw(&format!(
            "{} {} 0 * :{}",
            cmd::USER,
            self.config.user,
            self.config.real_name
        ))
    }
}

async fn read_loop<R>(reader: R, client: &ClientHandle, dispatcher: &EventDispatcher) -> Result<(), BotError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(512);

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        if read == 0 {
            tracing::warn!("Server closed the connection");
            return Err(BotError::Disconnected);
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }
        tracing::trace!("<< {}", line);

        match Message::parse(line) {
            Ok(msg) => {
                let closing = msg.command == cmd::ERROR;
                dispatcher.dispatch(client, &msg);
                if closing {
                    tracing::warn!("Server error: {}", msg.trailing());
                    return Err(BotError::Disconnected);
                }
            }
            Err(e) => tracing::debug!("Skipping unparsable line {:?}: {}", line, e),
        }
    }
}

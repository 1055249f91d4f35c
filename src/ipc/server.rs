//! Async Unix socket IPC server for daemon control.

use crate::error::{ChunkwaveError, Result};
use crate::ipc::protocol::{Command, Response, TaskEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, broadcast};

/// Handler trait for processing IPC commands.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a command and return a response.
    async fn handle(&self, command: Command) -> Response;

    /// Event stream for `Follow` connections. `None` rejects followers.
    fn subscribe(&self) -> Option<broadcast::Receiver<TaskEvent>> {
        None
    }
}

/// State for managing server shutdown.
#[derive(Debug, Clone)]
struct ServerState {
    shutdown: Arc<Mutex<bool>>,
}

impl ServerState {
    fn new() -> Self {
        Self {
            shutdown: Arc::new(Mutex::new(false)),
        }
    }

    async fn is_shutdown(&self) -> bool {
        *self.shutdown.lock().await
    }

    async fn set_shutdown(&self) {
        *self.shutdown.lock().await = true;
    }
}

/// IPC server for handling daemon control commands via Unix socket.
pub struct IpcServer {
    socket_path: PathBuf,
    state: ServerState,
}

impl IpcServer {
    /// Create a new IPC server bound to the specified socket path.
    pub fn new(socket_path: PathBuf) -> Result<Self> {
        Ok(Self {
            socket_path,
            state: ServerState::new(),
        })
    }

    /// Get the socket path this server is using.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Get the default socket path based on XDG_RUNTIME_DIR or fallback.
    pub fn default_socket_path() -> PathBuf {
        if let Some(runtime_dir) = dirs::runtime_dir() {
            runtime_dir.join("chunkwave.sock")
        } else {
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/chunkwave-{}.sock", uid))
        }
    }

    /// Start the IPC server and handle incoming connections.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        // A stale socket from a crashed daemon would make bind fail
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| ChunkwaveError::IpcSocket {
                message: format!("Failed to remove existing socket: {}", e),
            })?;
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| ChunkwaveError::IpcSocket {
                message: format!("Failed to bind to socket: {}", e),
            })?;
        tracing::info!(socket = %self.socket_path.display(), "IPC server listening");

        let handler = Arc::new(handler);

        loop {
            if self.state.is_shutdown().await {
                break;
            }

            // Accept with a timeout so the shutdown flag is re-checked
            let accept_result =
                tokio::time::timeout(tokio::time::Duration::from_millis(100), listener.accept())
                    .await;

            match accept_result {
                Ok(Ok((stream, _))) => {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler).await {
                            tracing::warn!("Error handling client: {}", e);
                        }
                    });
                }
                Ok(Err(e)) => {
                    return Err(ChunkwaveError::IpcConnection {
                        message: format!("Failed to accept connection: {}", e),
                    });
                }
                Err(_) => continue,
            }
        }

        Ok(())
    }

    /// Stop the IPC server and clean up the socket file.
    pub async fn stop(&self) -> Result<()> {
        self.state.set_shutdown().await;

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| ChunkwaveError::IpcSocket {
                message: format!("Failed to remove socket file: {}", e),
            })?;
        }

        Ok(())
    }
}

/// Handle a single client connection.
async fn handle_client<H>(stream: UnixStream, handler: Arc<H>) -> Result<()>
where
    H: CommandHandler,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader
        .read_line(&mut line)
        .await
        .map_err(|e| ChunkwaveError::IpcConnection {
            message: format!("Failed to read from client: {}", e),
        })?;

    let command = match Command::from_json(line.trim()) {
        Ok(command) => command,
        Err(e) => {
            let message = format!("Failed to parse command: {}", e);
            write_response(&mut writer, &Response::Error {
                message: message.clone(),
            })
            .await?;
            return Err(ChunkwaveError::IpcProtocol { message });
        }
    };
    tracing::debug!(?command, "IPC command");

    if matches!(command, Command::Follow) {
        return match handler.subscribe() {
            Some(events) => {
                write_response(&mut writer, &Response::Following).await?;
                stream_events(reader, writer, events).await
            }
            None => {
                write_response(&mut writer, &Response::Error {
                    message: "Follow is not supported by this server".to_string(),
                })
                .await
            }
        };
    }

    let response = handler.handle(command).await;
    write_response(&mut writer, &response).await
}

/// Forward task events to a follower until it disconnects or the channel closes.
async fn stream_events(
    mut reader: BufReader<OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
    mut events: broadcast::Receiver<TaskEvent>,
) -> Result<()> {
    let mut ignored = String::new();
    loop {
        ignored.clear();
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let json = event.to_json().map_err(|e| ChunkwaveError::IpcProtocol {
                        message: format!("Failed to serialize event: {}", e),
                    })?;
                    if write_line(&mut writer, &json).await.is_err() {
                        tracing::debug!("Follower went away");
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Follower lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            read = reader.read_line(&mut ignored) => match read {
                Ok(0) | Err(_) => {
                    tracing::debug!("Follower closed connection");
                    return Ok(());
                }
                Ok(_) => {}
            },
        }
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let response_json = response.to_json().map_err(|e| ChunkwaveError::IpcProtocol {
        message: format!("Failed to serialize response: {}", e),
    })?;
    write_line(writer, &response_json).await
}

async fn write_line(writer: &mut OwnedWriteHalf, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| ChunkwaveError::IpcConnection {
            message: format!("Failed to write to client: {}", e),
        })?;

    writer
        .write_all(b"\n")
        .await
        .map_err(|e| ChunkwaveError::IpcConnection {
            message: format!("Failed to write newline to client: {}", e),
        })?;

    writer
        .flush()
        .await
        .map_err(|e| ChunkwaveError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    Ok(())
}

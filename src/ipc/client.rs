//! IPC client for sending commands to the daemon.

use crate::error::{ChunkwaveError, Result};
use crate::ipc::protocol::{Command, Response, TaskEvent};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

/// Send a command to the daemon via Unix socket.
///
/// # Errors
/// Returns `ChunkwaveError::IpcConnection` if connection fails
/// Returns `ChunkwaveError::IpcProtocol` if serialization/deserialization fails
pub async fn send_command(socket_path: &Path, command: Command) -> Result<Response> {
    let (mut reader, _writer) = connect_and_send(socket_path, &command).await?;
    read_response(&mut reader).await
}

/// Live stream of task events from the daemon.
pub struct EventStream {
    reader: BufReader<OwnedReadHalf>,
    // Dropping the write half would signal the daemon that we left
    _writer: OwnedWriteHalf,
    line: String,
}

impl EventStream {
    /// Next event, or `None` once the daemon closes the connection.
    pub async fn next(&mut self) -> Result<Option<TaskEvent>> {
        self.line.clear();
        let read = self
            .reader
            .read_line(&mut self.line)
            .await
            .map_err(|e| ChunkwaveError::IpcConnection {
                message: format!("Failed to read event: {}", e),
            })?;
        if read == 0 {
            return Ok(None);
        }

        TaskEvent::from_json(self.line.trim())
            .map(Some)
            .map_err(|e| ChunkwaveError::IpcProtocol {
                message: format!("Failed to deserialize event: {}", e),
            })
    }
}

/// Open a follow connection.
///
/// Returns once the daemon has subscribed the connection, so every event
/// published afterwards is delivered.
pub async fn subscribe(socket_path: &Path) -> Result<EventStream> {
    let (mut reader, writer) = connect_and_send(socket_path, &Command::Follow).await?;

    match read_response(&mut reader).await? {
        Response::Following => Ok(EventStream {
            reader,
            _writer: writer,
            line: String::new(),
        }),
        Response::Error { message } => Err(ChunkwaveError::IpcProtocol { message }),
        other => Err(ChunkwaveError::IpcProtocol {
            message: format!("Unexpected response to follow: {:?}", other),
        }),
    }
}

/// Follow the daemon's task events.
///
/// `on_event` is called for every event; returning `false` ends the stream.
/// Returns when the callback stops, or when the daemon closes the connection.
pub async fn follow<F>(socket_path: &Path, mut on_event: F) -> Result<()>
where
    F: FnMut(TaskEvent) -> bool,
{
    let mut events = subscribe(socket_path).await?;
    while let Some(event) = events.next().await? {
        if !on_event(event) {
            break;
        }
    }
    Ok(())
}

async fn connect_and_send(
    socket_path: &Path,
    command: &Command,
) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
    let stream =
        UnixStream::connect(socket_path)
            .await
            .map_err(|e| ChunkwaveError::IpcConnection {
                message: format!("Failed to connect to daemon: {}", e),
            })?;

    let (reader, mut writer) = stream.into_split();

    let command_json = command.to_json().map_err(|e| ChunkwaveError::IpcProtocol {
        message: format!("Failed to serialize command: {}", e),
    })?;

    writer
        .write_all(command_json.as_bytes())
        .await
        .map_err(|e| ChunkwaveError::IpcConnection {
            message: format!("Failed to write command: {}", e),
        })?;

    writer
        .write_all(b"\n")
        .await
        .map_err(|e| ChunkwaveError::IpcConnection {
            message: format!("Failed to write newline: {}", e),
        })?;

    writer
        .flush()
        .await
        .map_err(|e| ChunkwaveError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    Ok((BufReader::new(reader), writer))
}

async fn read_response(reader: &mut BufReader<OwnedReadHalf>) -> Result<Response> {
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .await
        .map_err(|e| ChunkwaveError::IpcConnection {
            message: format!("Failed to read response: {}", e),
        })?;

    Response::from_json(response_line.trim()).map_err(|e| ChunkwaveError::IpcProtocol {
        message: format!("Failed to deserialize response: {}", e),
    })
}

//! Daemon control over a Unix socket, one JSON message per line.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{EventStream, follow, send_command, subscribe};
pub use protocol::{Command, Response, TaskEvent, TaskStatusEntry};
pub use server::{CommandHandler, IpcServer};

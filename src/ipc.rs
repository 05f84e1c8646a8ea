//! Control socket protocol
//!
//! The agent and the CLI live in the same binary, so requests and responses
//! are sent directly on the wire as newline-delimited JSON: one request line,
//! one response line per connection.

use crate::alerts::AlertSnapshot;
use crate::error::{Error, Result};
use crate::resolve::display::DisplayId;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

/// Default socket path for the agent.
pub fn socket_path() -> PathBuf {
    std::env::temp_dir().join("halo.sock")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    DismissAll,
    DismissDisplay { display: DisplayId },
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    Dismissed { count: usize },
    Status { snapshot: AlertSnapshot },
    Error { message: String },
}

/// Send one request to the running agent and wait for its reply.
pub fn send(request: &ControlRequest) -> Result<ControlResponse> {
    send_to(&socket_path(), request)
}

pub fn send_to(path: &Path, request: &ControlRequest) -> Result<ControlResponse> {
    let mut stream = UnixStream::connect(path).map_err(|source| Error::NotRunning {
        path: path.to_path_buf(),
        source,
    })?;

    let json = serde_json::to_string(request)?;
    writeln!(stream, "{json}")?;

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line)?;
    Ok(serde_json::from_str(line.trim_end())?)
}

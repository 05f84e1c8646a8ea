//! Unix socket server for control requests (dismiss, status)
//!
//! Listens on `$TMPDIR/halo.sock` for newline-delimited JSON requests. Each
//! request is forwarded to the agent loop with a reply channel; the answer is
//! written back as one JSON line.

use crate::error::Result;
use crate::ipc::{self, ControlRequest, ControlResponse};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// A request waiting for the agent loop.
#[derive(Debug)]
pub struct ControlCommand {
    pub request: ControlRequest,
    pub reply: oneshot::Sender<ControlResponse>,
}

/// Start the control socket on the default path.
///
/// A socket that cannot be bound is logged; the agent keeps running without
/// it.
pub async fn start(commands: mpsc::Sender<ControlCommand>) {
    let path = ipc::socket_path();
    let listener = match bind(&path) {
        Ok(l) => l,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to bind control socket");
            return;
        }
    };
    info!(path = %path.display(), "control socket listening");
    serve(listener, commands).await;
}

/// Remove any stale socket file and bind to `path`.
pub fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(UnixListener::bind(path)?)
}

pub async fn serve(listener: UnixListener, commands: mpsc::Sender<ControlCommand>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let commands = commands.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, commands).await {
                        trace!(error = %e, "control connection closed");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "failed to accept control connection");
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    commands: mpsc::Sender<ControlCommand>,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ControlRequest>(&line) {
            Ok(request) => {
                debug!(?request, "control request");
                dispatch(&commands, request).await
            }
            Err(e) => {
                trace!(error = %e, line, "failed to parse control message");
                ControlResponse::Error {
                    message: format!("invalid request: {e}"),
                }
            }
        };
        let mut json = serde_json::to_string(&response).map_err(std::io::Error::other)?;
        json.push('\n');
        write.write_all(json.as_bytes()).await?;
    }
    Ok(())
}

async fn dispatch(commands: &mpsc::Sender<ControlCommand>, request: ControlRequest) -> ControlResponse {
    let (reply, answer) = oneshot::channel();
    if commands.send(ControlCommand { request, reply }).await.is_err() {
        return ControlResponse::Error {
            message: "agent is shutting down".into(),
        };
    }
    answer.await.unwrap_or_else(|_| ControlResponse::Error {
        message: "agent dropped the request".into(),
    })
}

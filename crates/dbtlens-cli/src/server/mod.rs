//! `dbtlens serve`: newline-delimited JSON over a pair of byte streams.
//!
//! Incoming lines are handled one at a time, in order. Everything written
//! back goes through a single writer task, so engine notifications and
//! request replies never interleave within a line.

mod sink;

pub use sink::ChannelSink;

use crate::protocol::{encode_message, parse_message, ClientMessage, RequestId, ServerMessage};
use anyhow::{Context, Result};
use dbtlens_core::{EngineConfig, SchemaSource, SessionError, Workspace};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Whether the read loop keeps going after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Serves on stdin/stdout until stdin closes or a `shutdown` arrives.
pub async fn run_stdio(config: EngineConfig, schema: Arc<dyn SchemaSource>) -> Result<()> {
    serve(tokio::io::stdin(), tokio::io::stdout(), config, schema).await
}

pub async fn serve<R, W>(
    input: R,
    output: W,
    config: EngineConfig,
    schema: Arc<dyn SchemaSource>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outgoing, incoming) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_messages(incoming, output));

    let sink = Arc::new(ChannelSink::new(outgoing.clone()));
    let workspace = Workspace::bundled(config, schema, sink);
    info!("serving on stdio");

    let mut lines = BufReader::new(input).lines();
    let read_result = async {
        while let Some(line) = lines.next_line().await.context("Failed to read request")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let flow = match parse_message(line) {
                Ok(message) => dispatch(&workspace, &outgoing, message).await,
                Err(err) => {
                    warn!(error = %err, "rejected message");
                    let _ = outgoing.send(ServerMessage::error(None, err.to_string()));
                    Flow::Continue
                }
            };
            if flow == Flow::Stop {
                break;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    workspace.shutdown().await;
    drop(workspace);
    drop(outgoing);
    writer.await.context("Writer task failed")??;
    info!("server stopped");
    read_result
}

async fn dispatch(
    workspace: &Workspace,
    outgoing: &mpsc::UnboundedSender<ServerMessage>,
    message: ClientMessage,
) -> Flow {
    debug!(?message, "received");
    let reply = match message {
        ClientMessage::DidOpen {
            uri,
            version,
            text,
            language_id,
        } => workspace
            .did_open(&uri, version, &text, &language_id)
            .err()
            .map(notification_error),
        ClientMessage::DidChange {
            uri,
            version,
            changes,
        } => workspace
            .did_change(&uri, version, changes)
            .await
            .err()
            .map(notification_error),
        ClientMessage::DidClose { uri } => workspace.did_close(&uri).await.err().map(notification_error),
        ClientMessage::ForceRecompile { uri } => workspace
            .force_recompile(&uri)
            .await
            .err()
            .map(notification_error),
        ClientMessage::Hover { id, uri, position } => {
            Some(respond(id, workspace.hover(&uri, position).await))
        }
        ClientMessage::Completion { id, uri, position } => {
            Some(respond(id, workspace.completion(&uri, position).await))
        }
        ClientMessage::SignatureHelp { id, uri, position } => {
            Some(respond(id, workspace.signature_help(&uri, position).await))
        }
        ClientMessage::Status { id, uri } => Some(respond(id, workspace.status(&uri).await)),
        ClientMessage::Shutdown { id } => {
            workspace.shutdown().await;
            if let Some(id) = id {
                let _ = outgoing.send(ServerMessage::Response {
                    id,
                    result: serde_json::Value::Null,
                });
            }
            return Flow::Stop;
        }
    };

    if let Some(reply) = reply {
        let _ = outgoing.send(reply);
    }
    Flow::Continue
}

fn notification_error(err: SessionError) -> ServerMessage {
    warn!(error = %err, "notification failed");
    ServerMessage::error(None, err.to_string())
}

fn respond<T: Serialize>(id: RequestId, result: Result<T, SessionError>) -> ServerMessage {
    match result.map_err(|err| err.to_string()).and_then(|value| {
        serde_json::to_value(value).map_err(|err| format!("failed to encode result: {err}"))
    }) {
        Ok(result) => ServerMessage::Response { id, result },
        Err(message) => ServerMessage::error(Some(id), message),
    }
}

async fn write_messages<W>(mut incoming: mpsc::UnboundedReceiver<ServerMessage>, mut output: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = incoming.recv().await {
        let mut line = encode_message(&message)?;
        line.push('\n');
        output
            .write_all(line.as_bytes())
            .await
            .context("Failed to write message")?;
        output.flush().await.context("Failed to flush output")?;
    }
    output.shutdown().await.context("Failed to close output")?;
    Ok(())
}

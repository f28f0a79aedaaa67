//! Streamed imports over WebSocket.
//!
//! The request is validated before the upgrade, so an invalid stream is an
//! ordinary 400. After the upgrade each inbound text frame carries one chunk
//! and each outbound frame is a progress snapshot. A failure is sent as a
//! final `{ "error", "code" }` frame before the socket closes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tollsync_core::chunk::ImportChunk;
use tollsync_core::error::CoreError;
use tollsync_core::import_session::ImportProgress;
use tollsync_pipeline::{ImportStream, StreamRequest};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Query parameters that open a stream.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub account_type: String,
    pub account_id: String,
    pub file_name: String,
    pub file_size: Option<i64>,
    pub created_by: Option<String>,
}

/// One inbound chunk frame. `data` is the chunk's CSV text.
#[derive(Debug, Deserialize)]
pub struct ChunkFrame {
    pub session_id: String,
    pub sequence: u64,
    #[serde(default)]
    pub is_last: bool,
    pub data: String,
}

impl From<ChunkFrame> for ImportChunk {
    fn from(frame: ChunkFrame) -> Self {
        ImportChunk {
            session_id: frame.session_id,
            payload: frame.data.into_bytes(),
            sequence: frame.sequence,
            is_last: frame.is_last,
        }
    }
}

/// GET /api/v1/imports/stream
pub async fn import_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let stream = state.imports.start_import_stream(StreamRequest {
        account_type: params.account_type,
        account_id: params.account_id,
        file_name: params.file_name,
        file_size: params.file_size,
        created_by: params.created_by,
    })?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, stream)))
}

/// Outbound frame for one progress update.
pub fn progress_frame(update: Result<ImportProgress, CoreError>) -> serde_json::Value {
    match update {
        Ok(progress) => serde_json::to_value(progress).unwrap_or_else(|e| {
            AppError::Core(CoreError::Internal(format!("progress encoding: {e}"))).body()
        }),
        Err(err) => AppError::Core(err).body(),
    }
}

/// Parse an inbound text frame into a chunk.
pub fn parse_chunk(text: &str) -> Result<ImportChunk, AppError> {
    serde_json::from_str::<ChunkFrame>(text)
        .map(ImportChunk::from)
        .map_err(|e| AppError::BadRequest(format!("Malformed chunk frame: {e}")))
}

/// Pump chunks in and progress out until the import ends or either side
/// goes away.
///
/// At most one parsed chunk waits for room in the chunk channel, and the
/// socket is not read while it waits. Progress is drained on every turn,
/// so a client that sends ahead of reading never stalls the coordinator.
/// Closing the inbound side drops the chunk sender, which the coordinator
/// treats as the end of the stream.
async fn handle_socket(socket: WebSocket, stream: ImportStream) {
    let ImportStream {
        chunks,
        mut progress,
    } = stream;
    let mut chunks = Some(chunks);
    let mut pending: Option<ImportChunk> = None;
    let (mut sink, mut inbound) = socket.split();

    loop {
        tokio::select! {
            update = progress.recv() => {
                let Some(update) = update else { break };
                let frame = progress_frame(update).to_string();
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    tracing::debug!("Import stream sink closed");
                    break;
                }
            }
            permit = reserve(chunks.clone()), if pending.is_some() => match (permit, pending.take()) {
                (Some(permit), Some(chunk)) => {
                    permit.send(chunk);
                }
                (_, chunk) => {
                    let sequence = chunk.map(|c| c.sequence);
                    tracing::debug!(?sequence, "Import already finished, chunk dropped");
                    chunks = None;
                }
            },
            message = inbound.next(), if chunks.is_some() && pending.is_none() => match message {
                Some(Ok(Message::Text(text))) => match parse_chunk(text.as_str()) {
                    Ok(chunk) => pending = Some(chunk),
                    Err(err) => {
                        tracing::warn!(error = %err, "Rejected import stream frame");
                        let frame = err.body().to_string();
                        let _ = sink.send(Message::Text(frame.into())).await;
                        break;
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    chunks = None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Import stream receive error");
                    break;
                }
            },
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    tracing::debug!("Import stream socket closed");
}

/// Wait for room in the chunk channel. `None` once the coordinator has
/// stopped reading.
async fn reserve(chunks: Option<mpsc::Sender<ImportChunk>>) -> Option<mpsc::OwnedPermit<ImportChunk>> {
    chunks?.reserve_owned().await.ok()
}

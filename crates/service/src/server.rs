//! TCP front end: one task per connection, frames in, frames out.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use core_types::ErrorKind;
use ipc::{ReloadResponse, Request, Response, SearchRequest, framing};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::metrics::ServiceMetrics;
use crate::search_handler::SearchHandler;
use crate::status::make_status_response;
use crate::status_provider::StatusProvider;

/// Everything a connection needs to answer requests.
pub struct ServerState {
    pub handler: Arc<dyn SearchHandler>,
    pub status: Arc<dyn StatusProvider>,
    pub metrics: Option<Arc<ServiceMetrics>>,
    /// Used when a search request carries no deadline of its own.
    pub default_timeout: Duration,
}

/// Accept connections until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let addr = listener.local_addr().context("listener address")?;
    info!(%addr, "search service listening");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested; no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (conn, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                };
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(conn, state).await {
                        warn!(%peer, "connection error: {e:?}");
                    }
                });
            }
        }
    }
}

async fn handle_connection(mut conn: TcpStream, state: Arc<ServerState>) -> Result<()> {
    while let Some(payload) = framing::read_frame(&mut conn).await? {
        let response = match bincode::deserialize::<Request>(&payload) {
            Ok(req) => dispatch(&state, req).await,
            Err(e) => {
                warn!(error = %e, "undecodable request");
                Response::error(Uuid::nil(), ErrorKind::Validation, format!("bad request: {e}"))
            }
        };
        let bytes = encode_response(&response)?;
        framing::write_frame(&mut conn, &bytes).await?;
    }
    Ok(())
}

/// Serialize a response, replacing it with an `Internal` error when it would
/// not fit in one frame.
fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let bytes = bincode::serialize(response).context("encode response")?;
    if bytes.len() <= framing::MAX_FRAME_BYTES {
        return Ok(bytes);
    }
    let id = response.id();
    warn!(%id, bytes = bytes.len(), "response exceeds frame limit");
    bincode::serialize(&oversized(id, bytes.len() as u64)).context("encode response")
}

fn oversized(id: Uuid, bytes: u64) -> Response {
    Response::error(
        id,
        ErrorKind::Internal,
        format!(
            "response of {bytes} bytes exceeds the {} byte frame limit; request fewer results",
            framing::MAX_FRAME_BYTES
        ),
    )
}

pub async fn dispatch(state: &ServerState, req: Request) -> Response {
    match req {
        Request::Search(search) => handle_search(state, search).await,
        Request::Status(status) => {
            Response::Status(make_status_response(status.id, state.status.snapshot()))
        }
        Request::Reload(reload) => {
            let handler = state.handler.clone();
            match tokio::task::spawn_blocking(move || handler.reload()).await {
                Ok(Ok(info)) => {
                    if let Some(m) = &state.metrics {
                        m.record_reload();
                        m.set_index_entries(info.entries);
                    }
                    Response::Reload(ReloadResponse {
                        id: reload.id,
                        index_entries: info.entries as u64,
                        dimension: info.dimension.map(|d| d as u32),
                    })
                }
                Ok(Err(e)) => {
                    warn!(error = %e, kind = %e.kind(), "reload failed; keeping current snapshot");
                    Response::error(reload.id, e.kind(), e.to_string())
                }
                Err(e) => {
                    error!(error = %e, "reload task failed");
                    Response::error(reload.id, ErrorKind::Internal, "reload task failed")
                }
            }
        }
    }
}

async fn handle_search(state: &ServerState, req: SearchRequest) -> Response {
    let id = req.id;
    let started = Instant::now();
    let deadline = req
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(state.default_timeout);

    let handler = state.handler.clone();
    let task = tokio::task::spawn_blocking(move || handler.search(&req));

    let (response, kind) = match tokio::time::timeout(deadline, task).await {
        Ok(Ok(Ok(resp))) => {
            let response = Response::Search(resp);
            match bincode::serialized_size(&response) {
                Ok(bytes) if bytes <= framing::MAX_FRAME_BYTES as u64 => (response, None),
                Ok(bytes) => {
                    warn!(%id, bytes, "search response exceeds frame limit");
                    (oversized(id, bytes), Some(ErrorKind::Internal))
                }
                Err(e) => {
                    error!(%id, error = %e, "search response not encodable");
                    (
                        Response::error(id, ErrorKind::Internal, "search response not encodable"),
                        Some(ErrorKind::Internal),
                    )
                }
            }
        }
        Ok(Ok(Err(e))) => {
            debug!(%id, error = %e, "search rejected");
            (Response::error(id, e.kind(), e.to_string()), Some(e.kind()))
        }
        Ok(Err(e)) => {
            error!(%id, error = %e, "search task failed");
            (
                Response::error(id, ErrorKind::Internal, "search task failed"),
                Some(ErrorKind::Internal),
            )
        }
        Err(_) => {
            warn!(%id, timeout_ms = deadline.as_millis() as u64, "search timed out");
            (
                Response::error(
                    id,
                    ErrorKind::Timeout,
                    format!("search exceeded {} ms", deadline.as_millis()),
                ),
                Some(ErrorKind::Timeout),
            )
        }
    };

    if let Some(m) = &state.metrics {
        match kind {
            None => m.record_search(started.elapsed()),
            Some(kind) => m.record_search_error(kind),
        }
    }
    response
}

//! TCP client for the logsight search service.

use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use tokio::net::TcpStream;
use tokio::time::{Duration, sleep};
use tracing::warn;
use uuid::Uuid;

use crate::{
    DEFAULT_ADDR, ErrorKind, ReloadRequest, ReloadResponse, Request, Response, SearchRequest,
    SearchResponse, StatusRequest, StatusResponse, framing,
};

const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_MS: u64 = 50;

/// Error reported by the service itself, as opposed to a transport failure.
/// Never retried.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct TcpClient {
    addr: String,
    request_timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl Default for TcpClient {
    fn default() -> Self {
        Self::new(DEFAULT_ADDR)
    }
}

impl TcpClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retries: DEFAULT_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn search(&self, query: impl Into<String>, top_k: u32) -> Result<SearchResponse> {
        let req = Request::Search(SearchRequest {
            id: Uuid::new_v4(),
            query: query.into(),
            top_k,
            timeout_ms: None,
        });
        match self.request(&req).await? {
            Response::Search(resp) => Ok(resp),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        let req = Request::Status(StatusRequest { id: Uuid::new_v4() });
        match self.request(&req).await? {
            Response::Status(resp) => Ok(resp),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn reload(&self) -> Result<ReloadResponse> {
        let req = Request::Reload(ReloadRequest { id: Uuid::new_v4() });
        match self.request(&req).await? {
            Response::Reload(resp) => Ok(resp),
            other => Err(unexpected(&other)),
        }
    }

    /// Send one request and wait for its response. `Response::Error` is
    /// surfaced as a [`RemoteError`].
    pub async fn request(&self, req: &Request) -> Result<Response> {
        let payload = bincode::serialize(req)?;

        let mut attempt = 0;
        let mut last_err: Option<anyhow::Error> = None;

        while attempt <= self.retries {
            let fut = async {
                let mut conn = TcpStream::connect(&self.addr)
                    .await
                    .with_context(|| format!("connect to {}", self.addr))?;
                framing::write_frame(&mut conn, &payload).await?;
                let Some(buf) = framing::read_frame(&mut conn).await? else {
                    bail!("connection closed before response");
                };
                let resp: Response = bincode::deserialize(&buf)?;
                Ok(resp)
            };

            match tokio::time::timeout(self.request_timeout, fut).await {
                Ok(Ok(Response::Error(err))) => {
                    return Err(RemoteError {
                        kind: err.kind,
                        message: err.message,
                    }
                    .into());
                }
                Ok(Ok(resp)) => {
                    if resp.id() != req.id() {
                        bail!("response id {} does not match request {}", resp.id(), req.id());
                    }
                    return Ok(resp);
                }
                Ok(Err(e)) => {
                    warn!("request attempt {} failed: {e:?}", attempt + 1);
                    last_err = Some(e);
                }
                Err(e) => {
                    warn!("request attempt {} timed out: {e:?}", attempt + 1);
                    last_err = Some(e.into());
                }
            }

            attempt += 1;
            if attempt <= self.retries {
                sleep(self.backoff * attempt).await;
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("request failed")))
    }
}

fn unexpected(resp: &Response) -> anyhow::Error {
    anyhow!("unexpected response variant: {}", VariantName(resp))
}

struct VariantName<'a>(&'a Response);

impl fmt::Display for VariantName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.0 {
            Response::Search(_) => "search",
            Response::Status(_) => "status",
            Response::Reload(_) => "reload",
            Response::Error(_) => "error",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorResponse, SearchHit};
    use tokio::net::TcpListener;

    async fn serve_once(reply: impl FnOnce(Request) -> Response + Send + 'static) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let buf = framing::read_frame(&mut sock).await.unwrap().unwrap();
            let req: Request = bincode::deserialize(&buf).unwrap();
            let resp = reply(req);
            framing::write_frame(&mut sock, &bincode::serialize(&resp).unwrap())
                .await
                .unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn search_roundtrip() {
        let addr = serve_once(|req| {
            let Request::Search(s) = req else {
                panic!("expected search");
            };
            Response::Search(SearchResponse {
                id: s.id,
                hits: vec![SearchHit {
                    rank: 1,
                    text: format!("echo {}", s.query),
                    score: 0.9,
                }],
                total: 1,
                took_ms: 0,
                served_by: None,
            })
        })
        .await;

        let resp = TcpClient::new(addr).search("disk full", 3).await.unwrap();
        assert_eq!(resp.hits.len(), 1);
        assert_eq!(resp.hits[0].text, "echo disk full");
    }

    #[tokio::test]
    async fn service_errors_are_not_retried() {
        let addr = serve_once(|req| {
            Response::Error(ErrorResponse {
                id: req.id(),
                kind: ErrorKind::Validation,
                message: "query is empty".into(),
            })
        })
        .await;

        // only one accept is served; a retry would fail to connect and mask the error
        let err = TcpClient::new(addr).search(" ", 3).await.unwrap_err();
        let remote = err.downcast_ref::<RemoteError>().expect("remote error");
        assert_eq!(remote.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn connect_failure_exhausts_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = TcpClient::new(addr)
            .with_retries(1)
            .with_backoff(Duration::from_millis(1))
            .with_request_timeout(Duration::from_millis(200));
        assert!(client.status().await.is_err());
    }
}

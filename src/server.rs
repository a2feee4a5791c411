//! Status endpoint: pipeline counters, the latest frame and remote player
//! input over a small HTTP/1.1 server.
//!
//! One request per connection; responses always close the socket.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::input::Controls;
use crate::png::placeholder_png;
use crate::telemetry::{unix_millis, Telemetry};
use crate::world::PlayerInput;

const MAX_HEADER_LINES: usize = 64;
/// Request line plus headers.
const MAX_HEADER_BYTES: usize = 8 * 1024;
const MAX_BODY_BYTES: usize = 16 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    BadRequest(String),
}

/// A parsed request: method, path without query, body.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &ErrorBody { error: message.into() })
    }

    fn png(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "image/png",
            body,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: u64,
}

#[derive(Serialize)]
struct Accepted {
    success: bool,
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

/// Shared state behind every connection.
#[derive(Clone)]
pub struct StatusState {
    pub telemetry: Telemetry,
    pub controls: Controls,
}

impl StatusState {
    pub fn new(telemetry: Telemetry, controls: Controls) -> Self {
        Self {
            telemetry,
            controls,
        }
    }

    /// Map a request to its response.
    pub fn route(&self, request: &Request) -> Response {
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/health") => Response::json(
                200,
                &Health {
                    status: "OK",
                    timestamp: unix_millis(),
                },
            ),
            ("GET", "/api/status") => Response::json(200, &self.telemetry.status()),
            ("GET", "/api/frame") => {
                let png = self
                    .telemetry
                    .latest()
                    .map(|frame| frame.png)
                    .filter(|png| !png.is_empty())
                    .unwrap_or_else(|| placeholder_png().to_vec());
                Response::png(png)
            }
            ("POST", "/api/player/input") => {
                match serde_json::from_slice::<PlayerInput>(&request.body) {
                    Ok(input) => {
                        self.controls.submit(input);
                        Response::json(200, &Accepted { success: true })
                    }
                    Err(e) => Response::error(400, format!("invalid player input: {}", e)),
                }
            }
            (_, "/health" | "/api/status" | "/api/frame" | "/api/player/input") => {
                Response::error(405, "method not allowed")
            }
            _ => Response::error(404, "not found"),
        }
    }
}

/// Read one line, charging it against the shared header budget.
async fn read_limited_line<R>(
    reader: &mut BufReader<R>,
    line: &mut String,
    budget: &mut usize,
) -> Result<usize, ServerError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let n = (&mut *reader).take(*budget as u64).read_line(line).await?;
    *budget -= n;
    if *budget == 0 && !line.ends_with('\n') {
        return Err(ServerError::BadRequest(format!(
            "headers exceed {} bytes",
            MAX_HEADER_BYTES
        )));
    }
    Ok(n)
}

/// Read one request off the stream.
pub async fn read_request<R>(reader: &mut BufReader<R>) -> Result<Request, ServerError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut budget = MAX_HEADER_BYTES;
    let mut line = String::new();
    if read_limited_line(reader, &mut line, &mut budget).await? == 0 {
        return Err(ServerError::BadRequest("empty request".to_string()));
    }
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(ServerError::BadRequest(format!("request line {:?}", line.trim())));
    };
    let method = method.to_ascii_uppercase();
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut content_length = 0usize;
    for _ in 0..MAX_HEADER_LINES {
        let mut header = String::new();
        if read_limited_line(reader, &mut header, &mut budget).await? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| ServerError::BadRequest(format!("content-length {:?}", value)))?;
            }
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Err(ServerError::BadRequest(format!(
            "body of {} bytes exceeds {}",
            content_length, MAX_BODY_BYTES
        )));
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;

    Ok(Request { method, path, body })
}

async fn write_response(stream: &mut TcpStream, response: &Response) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-cache, no-store, must-revalidate\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n",
        response.status,
        reason(response.status),
        response.content_type,
        response.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.shutdown().await
}

async fn handle_connection(mut stream: TcpStream, state: StatusState) -> Result<(), ServerError> {
    let (read_half, _) = stream.split();
    let mut reader = BufReader::new(read_half);
    let request = tokio::time::timeout(READ_TIMEOUT, read_request(&mut reader)).await;
    drop(reader);

    let response = match request {
        Ok(Ok(request)) => {
            debug!("{} {}", request.method, request.path);
            state.route(&request)
        }
        Ok(Err(ServerError::BadRequest(msg))) => Response::error(400, msg),
        Ok(Err(e)) => return Err(e),
        Err(_) => Response::error(400, "request timed out"),
    };
    write_response(&mut stream, &response).await?;
    Ok(())
}

/// Bound listener, ready to serve.
pub struct StatusServer {
    listener: TcpListener,
    state: StatusState,
}

impl StatusServer {
    pub async fn bind(host: &str, port: u16, state: StatusState) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped.
    pub async fn serve(self) -> Result<(), ServerError> {
        info!("Status server listening on http://{}", self.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, state).await {
                    warn!("Status request from {} failed: {}", peer, e);
                }
            });
        }
    }
}

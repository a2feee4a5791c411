//! Byte transports behind a display target.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::frame::MonoFrame;
use super::serial::SerialPort;
use super::terminal;

/// Timeout applied to the HTTP client itself; the display adds its own
/// per-flush timeout on top.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("{0}")]
    Unsupported(String),
}

/// State recorded by the in-memory emulator.
#[derive(Debug, Default, Clone)]
pub struct EmulatorState {
    pub frames_received: u64,
    pub last_frame: Option<MonoFrame>,
    pub last_payload: Vec<u8>,
}

/// Shared view of an emulator target, cloneable across tasks.
#[derive(Debug, Default, Clone)]
pub struct EmulatorHandle {
    inner: Arc<Mutex<EmulatorState>>,
}

impl EmulatorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EmulatorState> {
        // A poisoned lock still holds a consistent snapshot
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> EmulatorState {
        self.lock().clone()
    }

    pub fn frames_received(&self) -> u64 {
        self.lock().frames_received
    }

    fn record(&self, payload: &[u8], frame: &MonoFrame) {
        let mut state = self.lock();
        state.frames_received += 1;
        state.last_frame = Some(frame.clone());
        state.last_payload = payload.to_vec();
    }
}

/// Where a target's bytes go.
#[derive(Debug)]
pub enum Transport {
    Serial(SerialPort),
    Tcp { host: String, port: u16 },
    Http { client: reqwest::Client, url: String },
    Stdout,
    Emulator(EmulatorHandle),
}

impl Transport {
    pub fn serial(path: impl Into<std::path::PathBuf>, baud_rate: u32) -> Self {
        Transport::Serial(SerialPort::new(path, baud_rate))
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Transport::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn http(url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()?;
        Ok(Transport::Http {
            client,
            url: url.into(),
        })
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Transport::Serial(_) => "serial",
            Transport::Tcp { .. } => "tcp",
            Transport::Http { .. } => "http",
            Transport::Stdout => "stdout",
            Transport::Emulator(_) => "emulator",
        }
    }

    /// Deliver one encoded frame. `frame` is the same frame in dot form for
    /// transports that render it themselves.
    pub async fn send(
        &mut self,
        payload: &[u8],
        frame: &MonoFrame,
        label: &str,
    ) -> Result<(), TransportError> {
        match self {
            Transport::Serial(port) => port.write(payload).await,
            Transport::Tcp { host, port } => {
                let mut stream = TcpStream::connect((host.as_str(), *port)).await?;
                stream.write_all(payload).await?;
                stream.shutdown().await?;
                Ok(())
            }
            Transport::Http { client, url } => {
                let response = client
                    .post(url.as_str())
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(payload.to_vec())
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(TransportError::HttpStatus {
                        status: status.as_u16(),
                        body,
                    });
                }
                Ok(())
            }
            Transport::Stdout => {
                write_stdout(frame, label)?;
                Ok(())
            }
            Transport::Emulator(handle) => {
                handle.record(payload, frame);
                Ok(())
            }
        }
    }
}

fn write_stdout(frame: &MonoFrame, label: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    terminal::write_frame(&mut lock, frame, label)
}

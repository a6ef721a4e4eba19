//! Serial line to the gauge
//!
//! [`AtgConnector`] opens links; [`AtgLink`] performs one request/response
//! exchange. Both are traits so the adapter can be driven by a scripted link
//! in tests.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use super::protocol::FRAME_DELIMITER;

const ETX: u8 = 0x03;
const CHECKSUM_LEN: usize = 4;
const READ_CHUNK: usize = 512;
const MAX_FRAME: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot open {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no complete response within {0:?}")]
    Timeout(Duration),

    #[error("line closed by peer")]
    Closed,
}

/// An open line to the gauge.
#[async_trait]
pub trait AtgLink: Send {
    /// Write `command` and collect the response until its delimiter.
    async fn exchange(&mut self, command: &[u8], timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Factory for [`AtgLink`]s.
#[async_trait]
pub trait AtgConnector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn AtgLink>, TransportError>;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}

/// Whether `buf` holds a complete inventory response.
///
/// A response ends with ETX, or with the delimiter followed by the
/// four-character checksum.
pub fn frame_complete(buf: &[u8]) -> bool {
    if buf.last() == Some(&ETX) {
        return true;
    }
    let delimiter = FRAME_DELIMITER.as_bytes();
    buf.windows(delimiter.len())
        .position(|w| w == delimiter)
        .is_some_and(|pos| buf.len() >= pos + delimiter.len() + CHECKSUM_LEN)
}

fn contains_delimiter(buf: &[u8]) -> bool {
    buf.windows(FRAME_DELIMITER.len())
        .any(|w| w == FRAME_DELIMITER.as_bytes())
}

// ── tokio-serial implementation ─────────────────────────────────

#[derive(Debug, Clone)]
pub struct SerialConnector {
    pub port: String,
    pub baud_rate: u32,
}

impl SerialConnector {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }
}

#[async_trait]
impl AtgConnector for SerialConnector {
    async fn open(&self) -> Result<Box<dyn AtgLink>, TransportError> {
        let stream = tokio_serial::new(&self.port, self.baud_rate)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| TransportError::Open {
                port: self.port.clone(),
                reason: e.to_string(),
            })?;
        info!(port = %self.port, baud = self.baud_rate, "🔌 Serial port opened");
        Ok(Box::new(SerialLink { stream }))
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.port, self.baud_rate)
    }
}

pub struct SerialLink {
    stream: SerialStream,
}

#[async_trait]
impl AtgLink for SerialLink {
    async fn exchange(&mut self, command: &[u8], timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.stream.write_all(command).await?;
        self.stream.flush().await?;

        let deadline = Instant::now() + timeout;
        let mut buf = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        while !frame_complete(&buf) && buf.len() < MAX_FRAME {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => return Err(TransportError::Closed),
                Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }

        // A response cut after the delimiter still carries all tank blocks
        if frame_complete(&buf) || contains_delimiter(&buf) {
            debug!(bytes = buf.len(), "Gauge response received");
            Ok(buf)
        } else {
            Err(TransportError::Timeout(timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_completion_rules() {
        assert!(!frame_complete(b"i20100"));
        assert!(!frame_complete(b"i20100&&FA"));
        assert!(frame_complete(b"i20100&&FA3B"));
        assert!(frame_complete(b"i20100\x03"));
        assert!(contains_delimiter(b"i20100&&"));
    }

    #[tokio::test]
    async fn unopenable_port_is_an_open_error() {
        let connector = SerialConnector::new("/dev/does-not-exist-atg", 9600);
        let result = connector.open().await;
        assert!(matches!(result, Err(TransportError::Open { .. })));
        assert_eq!(connector.describe(), "/dev/does-not-exist-atg@9600");
    }
}

//! JSON-RPC client over the node IPC socket
//!
//! One persistent Unix socket connection, one request in flight at a time.
//! Responses are read as a stream of JSON values; values with an id other
//! than the pending request (late answers to timed out calls) are dropped.
//!
//! A connection that times out or delivers bytes that are not JSON is
//! discarded, and the next call dials the socket again.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Mutex;

use crate::market::MarketError;

const READ_CHUNK_SIZE: usize = 4096;

struct Connection {
    stream: UnixStream,
    buf: Vec<u8>,
}

impl Connection {
    async fn open(path: &Path, timeout: Duration) -> Result<Self, MarketError> {
        let stream = tokio::time::timeout(timeout, UnixStream::connect(path))
            .await
            .map_err(|_| MarketError::Timeout(timeout))??;
        Ok(Connection {
            stream,
            buf: Vec::new(),
        })
    }

    async fn send(&mut self, request: &Value) -> Result<(), MarketError> {
        let payload = serde_json::to_vec(request)?;
        self.stream.write_all(&payload).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Next complete JSON value on the stream.
    async fn read_value(&mut self) -> Result<Value, MarketError> {
        loop {
            if let Some((value, consumed)) = Self::parse_buffered(&self.buf)? {
                self.buf.drain(..consumed);
                return Ok(value);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "node closed the connection",
                )
                .into());
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn parse_buffered(buf: &[u8]) -> Result<Option<(Value, usize)>, MarketError> {
        let mut values = serde_json::Deserializer::from_slice(buf).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) => Ok(Some((value, values.byte_offset()))),
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    async fn round_trip(&mut self, id: u64, request: &Value) -> Result<Value, MarketError> {
        self.send(request).await?;
        loop {
            let response = self.read_value().await?;
            if response.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(error) = response.get("error") {
                return Err(MarketError::Rpc {
                    code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
            return Ok(response.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

pub struct IpcClient {
    path: PathBuf,
    timeout: Duration,
    next_id: AtomicU64,
    closed: AtomicBool,
    conn: Mutex<Option<Connection>>,
}

impl IpcClient {
    pub async fn connect<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self, MarketError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path, timeout).await?;
        Ok(IpcClient {
            path,
            timeout,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, MarketError> {
        let mut guard = self.conn.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(MarketError::Closed);
        }
        if guard.is_none() {
            *guard = Some(Connection::open(&self.path, self.timeout).await?);
        }
        let conn = guard.as_mut().ok_or(MarketError::Closed)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let outcome = tokio::time::timeout(self.timeout, conn.round_trip(id, &request)).await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            // the node answered; the stream is still in sync
            Ok(Err(e @ MarketError::Rpc { .. })) => return Err(e),
            Ok(Err(e)) => {
                *guard = None;
                return Err(e);
            }
            Err(_) => {
                *guard = None;
                return Err(MarketError::Timeout(self.timeout));
            }
        };
        Ok(serde_json::from_value(result)?)
    }

    /// Drops the connection for good. Returns false when it was already
    /// closed.
    pub async fn close(&self) -> bool {
        let mut guard = self.conn.lock().await;
        guard.take();
        !self.closed.swap(true, Ordering::SeqCst)
    }
}

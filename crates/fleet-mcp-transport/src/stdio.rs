//! Child-process transport speaking LF-delimited JSON over stdin/stdout.
//!
//! A dedicated reader task pumps the child's stdout: response envelopes
//! complete the matching entry in the pending-request table, notifications
//! go to the broadcast sink. Writes are serialized under a lock so framing
//! is preserved. The child's stderr is left alone.

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace, warn};

use fleet_mcp_core::error::{FleetError, FleetResult};
use fleet_mcp_core::protocol::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};

use crate::{Transport, NOTIFICATION_CAPACITY};

/// How long a closing transport waits for the child to exit before killing
/// it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type PendingTable = Arc<Mutex<HashMap<i64, oneshot::Sender<JsonRpcResponse>>>>;

/// Transport over a spawned child process.
pub struct StdioTransport {
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    pending: PendingTable,
    notify_tx: broadcast::Sender<JsonRpcRequest>,
    reader: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl StdioTransport {
    /// Spawn `command` with `args` and `environment`, wire up the pipes and
    /// start the reader task.
    pub fn spawn(
        command: &str,
        args: &[String],
        environment: &HashMap<String, String>,
    ) -> FleetResult<Self> {
        let mut child = Command::new(command)
            .args(args)
            .envs(environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FleetError::Transport(format!("failed to spawn '{command}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FleetError::Transport("failed to capture child stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FleetError::Transport("failed to capture child stdout".to_string()))?;

        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let reader = tokio::spawn(reader_pump(stdout, pending.clone(), notify_tx.clone()));

        debug!(command, "spawned stdio MCP server");

        Ok(Self {
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            pending,
            notify_tx,
            reader: Mutex::new(Some(reader)),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of requests still awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn write_line(&self, request: &JsonRpcRequest) -> FleetResult<()> {
        // serde_json escapes interior newlines, so the envelope occupies
        // exactly one line.
        let line = serde_json::to_string(request)?;
        trace!(%line, "stdio write");

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(FleetError::ConnectionClosed)?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| FleetError::Transport(format!("stdin write failed: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| FleetError::Transport(format!("stdin write failed: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| FleetError::Transport(format!("stdin flush failed: {e}")))?;
        Ok(())
    }
}

/// Reader task: one envelope per line until EOF.
async fn reader_pump(
    stdout: tokio::process::ChildStdout,
    pending: PendingTable,
    notify_tx: broadcast::Sender<JsonRpcRequest>,
) {
    let mut lines = BufReader::new(stdout).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        trace!(%line, "stdio read");

        match serde_json::from_str::<JsonRpcMessage>(&line) {
            Ok(JsonRpcMessage::Response(response)) => {
                let Some(id) = response.id.as_ref().and_then(|id| id.as_number()) else {
                    warn!(%line, "response without a numeric id, dropping");
                    continue;
                };
                let sender = pending.lock().await.remove(&id);
                match sender {
                    // Receiver may have timed out meanwhile; that is fine.
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!(id, "response for unknown or expired request"),
                }
            }
            Ok(JsonRpcMessage::Request(request)) if request.is_notification() => {
                // No receivers is not an error; fan-out starts at subscribe.
                let _ = notify_tx.send(request);
            }
            Ok(JsonRpcMessage::Request(request)) => {
                debug!(method = %request.method, "ignoring server-initiated request");
            }
            Err(e) => warn!(%line, error = %e, "failed to parse envelope from child"),
        }
    }

    debug!("stdio reader reached EOF");
    // Fail everything still in flight; dropping the senders surfaces
    // connection-closed to the waiting callers.
    pending.lock().await.clear();
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(
        &self,
        request: JsonRpcRequest,
        timeout: Duration,
    ) -> FleetResult<JsonRpcResponse> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FleetError::ConnectionClosed);
        }

        let id = request
            .id
            .as_ref()
            .and_then(|id| id.as_number())
            .ok_or_else(|| {
                FleetError::InvalidRequest("stdio requests require a numeric id".to_string())
            })?;

        // Register before writing so an immediate response cannot be lost.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.write_line(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            // Sender dropped: reader hit EOF or the transport closed.
            Ok(Err(_)) => Err(FleetError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(FleetError::Timeout(timeout))
            }
        }
    }

    fn notifications(&self) -> BroadcastStream<JsonRpcRequest> {
        BroadcastStream::new(self.notify_tx.subscribe())
    }

    async fn close(&self) -> FleetResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }

        self.pending.lock().await.clear();

        // Closing stdin asks a conforming server to exit.
        drop(self.stdin.lock().await.take());

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "stdio server exited"),
                Ok(Err(e)) => warn!(error = %e, "failed to reap stdio server"),
                Err(_) => {
                    warn!("stdio server did not exit in time, killing");
                    let _ = child.kill().await;
                }
            }
        }

        debug!("stdio transport closed");
        Ok(())
    }
}

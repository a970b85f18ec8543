//! MCP JSON-RPC client for communicating with MCP servers.
//!
//! Implements the MCP protocol over stdio (JSON-RPC 2.0, one message per
//! line). Reference: <https://spec.modelcontextprotocol.io/>

use std::process::Stdio;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::Instrument;

use mcphub_core::{
    McpClientError, McpConnection, McpConnector, McpSession, McpTool, ProcessExit, SpawnSpec,
    StderrMode,
};

/// Protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Default time to wait for a single response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// MCP initialize result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_info: ServerInfo,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
}

/// Server information from initialize.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Server capabilities.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<ToolsCapability>,
}

/// Tools capability.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(default)]
    pub list_changed: Option<bool>,
}

/// One page of `tools/list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<McpTool>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Launches tool servers as child processes speaking MCP over stdio.
#[derive(Debug, Clone)]
pub struct StdioConnector {
    request_timeout: Duration,
}

impl StdioConnector {
    pub const fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request response timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for StdioConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl McpConnector for StdioConnector {
    async fn connect(&self, spec: &SpawnSpec) -> Result<McpConnection, McpClientError> {
        let mut child = spawn_child(spec)?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpClientError::SpawnFailed("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpClientError::SpawnFailed("Failed to get stdout".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_forwarder(stderr);
        }

        let (exit_tx, exited) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel();
        let monitor = spawn_monitor(child, kill_rx, exit_tx);

        let mut io = SessionIo {
            stdin,
            stdout: BufReader::new(stdout),
            request_timeout: self.request_timeout,
        };
        let next_id = AtomicU64::new(1);

        let init = match io.initialize(&next_id).await {
            Ok(init) => init,
            Err(e) => {
                terminate(kill_tx, monitor).await;
                return Err(e);
            }
        };

        tracing::debug!(
            pid = ?pid,
            server_name = %init.server_info.name,
            protocol_version = %init.protocol_version,
            "MCP handshake complete"
        );

        let session = StdioSession {
            pid,
            capabilities: init.capabilities,
            next_id,
            io: Mutex::new(Some(io)),
            shutdown: StdMutex::new(Some((kill_tx, monitor))),
        };

        Ok(McpConnection {
            session: std::sync::Arc::new(session),
            exited,
        })
    }
}

fn spawn_child(spec: &SpawnSpec) -> Result<Child, McpClientError> {
    let mut command = Command::new(&spec.command);
    command
        .args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(match spec.stderr {
            StderrMode::Pipe => Stdio::piped(),
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Null => Stdio::null(),
        })
        .kill_on_drop(true);

    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }

    command.spawn().map_err(|e| {
        McpClientError::SpawnFailed(format!(
            "Failed to spawn '{}': {e}\nArgs: {:?}\nCwd: {:?}",
            spec.command, spec.args, spec.cwd
        ))
    })
}

/// Forward each stderr line to the log at debug level.
///
/// Reads bytes and decodes lossily so non-UTF-8 output does not end the task.
fn spawn_stderr_forwarder(stream: impl AsyncRead + Unpin + Send + 'static) {
    tokio::spawn(
        async move {
            let mut reader = BufReader::new(stream);
            let mut buf: Vec<u8> = Vec::with_capacity(1024);

            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end();
                        if !line.is_empty() {
                            tracing::debug!(stream = "stderr", "{line}");
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "stderr reader exiting due to read error");
                        break;
                    }
                }
            }
        }
        .in_current_span(),
    );
}

/// Own the child until it exits or a kill is requested.
///
/// An exit the caller did not ask for is reported on `exit_tx`. A kill
/// request (or the session being dropped) kills and reaps the child and
/// drops `exit_tx` without a value.
fn spawn_monitor(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    exit_tx: oneshot::Sender<ProcessExit>,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            tokio::select! {
                status = child.wait() => {
                    let exit = match status {
                        Ok(status) => ProcessExit {
                            code: status.code(),
                            description: status.to_string(),
                        },
                        Err(e) => ProcessExit {
                            code: None,
                            description: format!("failed to wait for process: {e}"),
                        },
                    };
                    tracing::debug!(exit = %exit, "MCP server process exited");
                    let _ = exit_tx.send(exit);
                }
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(error = %e, "Kill of MCP server process failed");
                    }
                }
            }
        }
        .in_current_span(),
    )
}

async fn terminate(kill_tx: oneshot::Sender<()>, monitor: JoinHandle<()>) {
    let _ = kill_tx.send(());
    let _ = monitor.await;
}

/// The pipes of a connected child.
struct SessionIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    request_timeout: Duration,
}

impl SessionIo {
    /// Send `initialize` and the `notifications/initialized` notification.
    async fn initialize(&mut self, next_id: &AtomicU64) -> Result<InitializeResult, McpClientError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": "mcphub",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {}
        });

        let id = next_id.fetch_add(1, Ordering::SeqCst);
        let result: InitializeResult = self.request(id, "initialize", Some(params)).await?;

        self.notify("notifications/initialized", None).await?;

        Ok(result)
    }

    /// Send a JSON-RPC request and wait for the response with the same id.
    async fn request<T: for<'de> Deserialize<'de>>(
        &mut self,
        id: u64,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, McpClientError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let line = serde_json::to_string(&request)? + "\n";
        self.write_line(&line).await?;

        let response = timeout(self.request_timeout, self.read_response(id))
            .await
            .map_err(|_| McpClientError::Timeout)??;

        if let Some(err) = response.error {
            return Err(McpClientError::ServerError {
                code: err.code,
                message: err.message,
            });
        }

        let result = response.result.ok_or_else(|| {
            McpClientError::Protocol("Missing result in response".to_string())
        })?;

        serde_json::from_value(result).map_err(Into::into)
    }

    /// Send a JSON-RPC notification (no response expected).
    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpClientError> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.unwrap_or_else(|| json!({}))
        });
        let line = serde_json::to_string(&notification)? + "\n";
        self.write_line(&line).await
    }

    async fn write_line(&mut self, line: &str) -> Result<(), McpClientError> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Read lines until the response for `id` arrives.
    ///
    /// Blank lines, non-JSON output (e.g. npx banners), notifications and
    /// responses to other ids are skipped.
    async fn read_response(&mut self, id: u64) -> Result<JsonRpcResponse, McpClientError> {
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        loop {
            buf.clear();
            if self.stdout.read_until(b'\n', &mut buf).await? == 0 {
                return Err(McpClientError::Protocol(
                    "Server closed connection".to_string(),
                ));
            }

            let line = String::from_utf8_lossy(&buf);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(response) if response.id == Some(id) => return Ok(response),
                Ok(_) => tracing::debug!(line = trimmed, "Skipping unrelated JSON-RPC message"),
                Err(_) => tracing::debug!(line = trimmed, "Skipping non-JSON-RPC output"),
            }
        }
    }
}

/// A connected stdio tool server.
pub struct StdioSession {
    pid: Option<u32>,
    capabilities: ServerCapabilities,
    next_id: AtomicU64,
    /// `None` once disconnected.
    io: Mutex<Option<SessionIo>>,
    shutdown: StdMutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

impl StdioSession {
    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, McpClientError> {
        let mut guard = self.io.lock().await;
        let io = guard.as_mut().ok_or(McpClientError::NotConnected)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        io.request(id, method, params).await
    }
}

#[async_trait]
impl McpSession for StdioSession {
    async fn list_tools(&self) -> Result<Vec<McpTool>, McpClientError> {
        // Servers that do not advertise tools have none
        if self.capabilities.tools.is_none() {
            return Ok(Vec::new());
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ToolsPage = self.request("tools/list", params).await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        Ok(tools)
    }

    async fn disconnect(&self) {
        // Kill before closing the pipes so the exit is never mistaken for a crash.
        // An in-flight request then fails on EOF and releases the pipes.
        let shutdown = self
            .shutdown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some((kill_tx, monitor)) = shutdown {
            terminate(kill_tx, monitor).await;
        }

        drop(self.io.lock().await.take());
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

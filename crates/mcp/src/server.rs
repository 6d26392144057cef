//! MCP server management (spawn, communicate, lifecycle).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsParams, ListToolsResult, RequestId, Tool,
};

/// Default timeout for a single MCP request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum output size (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Configuration for an MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Per-request timeout in seconds; [`DEFAULT_TIMEOUT`] when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            timeout_secs: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

type Reader = Box<dyn AsyncRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Both directions of the transport, locked together so one exchange owns
/// the line.
struct Io {
    writer: Writer,
    reader: BufReader<Reader>,
    /// Bytes of a line not yet terminated. Kept across reads so a cancelled
    /// exchange never drops part of the next message.
    pending: Vec<u8>,
    /// Set after an oversized line, until its newline has been discarded.
    skipping: bool,
}

impl Io {
    fn new(reader: Reader, writer: Writer) -> Self {
        Self {
            writer,
            reader: BufReader::new(reader),
            pending: Vec::new(),
            skipping: false,
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next complete line, or `None` once the stream has ended.
    ///
    /// Lines longer than [`MAX_OUTPUT_SIZE`] fail with
    /// [`Error::OutputTooLarge`] without being buffered whole; their
    /// remainder is skipped on later reads.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=end).collect();
                if self.skipping {
                    self.skipping = false;
                    continue;
                }
                if line.len() > MAX_OUTPUT_SIZE {
                    return Err(Error::OutputTooLarge {
                        size: line.len(),
                        max: MAX_OUTPUT_SIZE,
                    });
                }
                return Ok(Some(line));
            }

            if self.skipping {
                self.pending.clear();
            } else if self.pending.len() > MAX_OUTPUT_SIZE {
                let size = self.pending.len();
                self.pending.clear();
                self.skipping = true;
                return Err(Error::OutputTooLarge {
                    size,
                    max: MAX_OUTPUT_SIZE,
                });
            }

            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(None);
            }
            let read = chunk.len();
            self.pending.extend_from_slice(chunk);
            self.reader.consume(read);
        }
    }

    /// Read lines until the response for `id` arrives.
    ///
    /// Notifications, server-initiated requests and responses to earlier
    /// abandoned requests are skipped.
    async fn read_response(&mut self, id: &RequestId) -> Result<JsonRpcResponse> {
        loop {
            let line = self.next_line().await?.ok_or(Error::ServerExited)?;
            let line = std::str::from_utf8(&line)
                .map_err(|e| Error::InvalidResponse(format!("line is not UTF-8: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }

            let message: JsonRpcResponse = serde_json::from_str(line)
                .map_err(|e| Error::InvalidResponse(format!("malformed JSON-RPC line: {e}")))?;

            if !message.is_response() {
                debug!(method = ?message.method, "skipping server-initiated message");
                continue;
            }
            if message.id.as_ref() != Some(id) {
                debug!(expected = ?id, got = ?message.id, "discarding stale response");
                continue;
            }
            return Ok(message);
        }
    }
}

/// Handle to a running MCP server.
pub struct Server {
    config: ServerConfig,
    process: Mutex<Option<Child>>,
    io: Mutex<Io>,
    next_id: AtomicI64,
    initialized: AtomicBool,
    tools: Mutex<Vec<Tool>>,
}

impl Server {
    /// Spawn a new MCP server process.
    pub async fn spawn(config: ServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        debug!(server = %config.name, command = %config.command, "spawned MCP server");

        Ok(Self::new(
            config,
            Some(process),
            Io::new(Box::new(stdout), Box::new(stdin)),
        ))
    }

    /// Attach to a server that already speaks MCP over the given streams,
    /// such as an in-process server. `config.command` is not used.
    pub fn from_transport(
        config: ServerConfig,
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self::new(config, None, Io::new(Box::new(reader), Box::new(writer)))
    }

    fn new(config: ServerConfig, process: Option<Child>, io: Io) -> Self {
        Self {
            config,
            process: Mutex::new(process),
            io: Mutex::new(io),
            next_id: AtomicI64::new(1),
            initialized: AtomicBool::new(false),
            tools: Mutex::new(Vec::new()),
        }
    }

    /// Initialize the server (must be called before other operations).
    pub async fn initialize(&self) -> Result<&Self> {
        let params = InitializeParams::default();
        let result: InitializeResult = self.request("initialize", Some(params)).await?;

        self.notify("notifications/initialized").await?;

        info!(
            server = %self.config.name,
            remote = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP handshake complete"
        );
        self.initialized.store(true, Ordering::SeqCst);

        self.refresh_tools().await?;

        Ok(self)
    }

    /// Check if the server is initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Refresh the list of available tools, following pagination cursors.
    pub async fn refresh_tools(&self) -> Result<()> {
        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let params = ListToolsParams { cursor };
            let page: ListToolsResult = self.request("tools/list", Some(params)).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        debug!(server = %self.config.name, count = tools.len(), "listed tools");
        *self.tools.lock().await = tools;
        Ok(())
    }

    /// Get the list of available tools.
    pub async fn tools(&self) -> Vec<Tool> {
        self.tools.lock().await.clone()
    }

    /// Call a tool by name.
    ///
    /// A result flagged `isError` is returned as [`Error::ToolCallFailed`].
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<CallToolResult> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }

        Ok(result)
    }

    /// Shut down the server, closing its input and killing the process.
    pub async fn shutdown(self) -> Result<()> {
        self.initialized.store(false, Ordering::SeqCst);

        // End of input is the stdio transport's shutdown signal.
        {
            let mut io = self.io.lock().await;
            let _ = io.writer.shutdown().await;
        }

        if let Some(mut process) = self.process.into_inner() {
            let _ = process.kill().await;
        }
        debug!(server = %self.config.name, "MCP server stopped");

        Ok(())
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }
        let request_json = serde_json::to_string(&request)?;

        // Hold the transport for the whole exchange so concurrent callers
        // never consume each other's responses.
        let mut io = self.io.lock().await;
        io.write_line(&request_json).await?;

        let response = timeout(self.config.timeout(), io.read_response(&id))
            .await
            .map_err(|_| Error::Timeout)??;
        drop(io);

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)?;

        Ok(result)
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let notification_json = serde_json::to_string(&JsonRpcNotification::new(method))?;
        self.io.lock().await.write_line(&notification_json).await
    }
}

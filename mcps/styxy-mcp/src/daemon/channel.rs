//! Persistent socket connection with CLI fallback

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::error::ChannelError;
use super::framing::FrameBuffer;
use crate::command::Command;
use crate::config::StyxyConfig;
use crate::error::StyxyResult;
use crate::fallback::CliFallback;
use crate::types::CommandResult;

/// Bound on establishing the socket connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on a whole socket call, connect included
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

const READ_CHUNK: usize = 4096;

type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<UnixStream>> + Send>>;

/// Opens the daemon socket at a path
type Connector = fn(PathBuf) -> ConnectFuture;

fn connect_unix(path: PathBuf) -> ConnectFuture {
    Box::pin(async move { UnixStream::connect(path).await })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTimeouts {
    pub connect: Duration,
    pub call: Duration,
}

impl Default for ChannelTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            call: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Lifecycle of the channel's single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unopened,
    Open,
    /// Failed mid-call; replaced on next use
    Closed,
}

struct Connection {
    stream: UnixStream,
    state: ConnectionState,
}

impl Connection {
    fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            state: ConnectionState::Open,
        }
    }

    fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Write one frame and read until one complete message has arrived
    async fn exchange(&mut self, frame: &[u8]) -> Result<Value, ChannelError> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;

        let mut buffer = FrameBuffer::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(ChannelError::ConnectionClosed {
                    received: buffer.len(),
                });
            }
            if let Some(message) = buffer.push(&chunk[..n]) {
                return Ok(message);
            }
        }
    }
}

/// Sends commands to the Styxy daemon
///
/// Holds at most one socket connection, opened lazily and reused until it
/// fails. Calls are serialized: one command is in flight at a time.
pub struct DaemonChannel {
    config: Arc<StyxyConfig>,
    timeouts: ChannelTimeouts,
    connection: Mutex<Option<Connection>>,
    connector: Connector,
    fallback: CliFallback,
}

impl DaemonChannel {
    pub fn new(config: Arc<StyxyConfig>, fallback: CliFallback) -> Self {
        Self {
            config,
            timeouts: ChannelTimeouts::default(),
            connection: Mutex::new(None),
            connector: connect_unix,
            fallback,
        }
    }

    pub fn with_timeouts(mut self, timeouts: ChannelTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[cfg(test)]
    fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }

    pub fn config(&self) -> &StyxyConfig {
        &self.config
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection
            .lock()
            .await
            .as_ref()
            .map_or(ConnectionState::Unopened, |conn| conn.state)
    }

    /// Send `command`, via the socket if possible, otherwise via the CLI
    ///
    /// The CLI is tried at most once per call, and only when the socket
    /// stage failed, including when the daemon answered `success: false`.
    #[instrument(skip_all, fields(command = %command.kind()))]
    pub async fn send(&self, command: &Command) -> StyxyResult<CommandResult> {
        let error = match self.send_via_socket(command).await {
            Ok(result) => {
                debug!("answered by daemon socket");
                return Ok(result);
            }
            Err(e) => e,
        };

        warn!(error = %error, "daemon socket failed, falling back to styxy CLI");
        self.fallback.translate(command).await
    }

    /// Socket stage only; never invokes the CLI
    pub async fn send_via_socket(&self, command: &Command) -> Result<CommandResult, ChannelError> {
        let mut frame = command.to_wire()?;
        frame.push('\n');

        let mut slot = self.connection.lock().await;
        let outcome = match tokio::time::timeout(
            self.timeouts.call,
            self.round_trip(&mut slot, frame.as_bytes()),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(ChannelError::CallTimeout(self.timeouts.call)),
        };

        if outcome.is_err() {
            if let Some(conn) = slot.as_mut() {
                conn.state = ConnectionState::Closed;
            }
        }
        drop(slot);

        let payload = unwrap_envelope(outcome?)?;
        Ok(CommandResult::decode(command.kind(), payload)?)
    }

    async fn round_trip(
        &self,
        slot: &mut Option<Connection>,
        frame: &[u8],
    ) -> Result<Value, ChannelError> {
        if !slot.as_ref().is_some_and(Connection::is_open) {
            *slot = Some(self.open().await?);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(ChannelError::ConnectionClosed { received: 0 });
        };
        conn.exchange(frame).await
    }

    async fn open(&self) -> Result<Connection, ChannelError> {
        let path = &self.config.socket_path;
        debug!("connecting to styxy daemon at {}", path.display());

        let connect = (self.connector)(path.clone());
        match tokio::time::timeout(self.timeouts.connect, connect).await {
            Ok(Ok(stream)) => Ok(Connection::new(stream)),
            Ok(Err(source)) => Err(ChannelError::ConnectionFailed {
                path: path.clone(),
                source,
            }),
            Err(_elapsed) => Err(ChannelError::ConnectionTimeout(self.timeouts.connect)),
        }
    }
}

/// Strip an optional `{success, data, error}` envelope
fn unwrap_envelope(payload: Value) -> Result<Value, ChannelError> {
    let Value::Object(mut map) = payload else {
        return Ok(payload);
    };

    match map.get("success").and_then(Value::as_bool) {
        Some(false) => {
            let message = map
                .get("error")
                .or_else(|| map.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("no reason given")
                .to_string();
            Err(ChannelError::Rejected(message))
        }
        Some(true) => match map.remove("data") {
            Some(data) => Ok(data),
            None => {
                map.remove("success");
                Ok(Value::Object(map))
            }
        },
        None => Ok(Value::Object(map)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::UnixListener;

    use crate::command::CommandContext;
    use crate::config::{ConfigSource, PortRange};
    use crate::styxy::StyxyCli;

    /// Serve each request line with `respond`, counting accepted connections
    fn spawn_daemon<F>(path: &Path, respond: F) -> Arc<AtomicUsize>
    where
        F: Fn(Value) -> Vec<u8> + Send + Sync + 'static,
    {
        let listener = UnixListener::bind(path).unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepts);
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.into_split();
                    let mut lines = BufReader::new(reader).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let request: Value = serde_json::from_str(&line).unwrap();
                        if writer.write_all(&respond(request)).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        accepts
    }

    fn config_for(socket_path: PathBuf) -> Arc<StyxyConfig> {
        Arc::new(StyxyConfig {
            socket_path,
            port_range: PortRange::default(),
            log_path: PathBuf::from("/tmp/styxy.log"),
            source: ConfigSource::NotFound,
        })
    }

    /// CLI stub that appends its arguments to `marker` before running `body`
    fn recording_cli(marker: &Path, body: &str) -> CliFallback {
        let script = format!("echo \"$*\" >> '{}'; {}", marker.display(), body);
        CliFallback::new(StyxyCli::new("sh").with_base_args(["-c".to_string(), script, "styxy".to_string()]))
    }

    fn fast_timeouts() -> ChannelTimeouts {
        ChannelTimeouts {
            connect: Duration::from_millis(200),
            call: Duration::from_millis(300),
        }
    }

    fn allocate_demo() -> Command {
        let context = CommandContext {
            project_name: Some("demo".to_string()),
            ..Default::default()
        };
        Command::allocate(context, "web", None, None, None)
    }

    #[tokio::test]
    async fn test_socket_answer_skips_fallback() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("daemon.sock");
        let marker = dir.path().join("cli-calls");
        spawn_daemon(&socket, |request| {
            assert_eq!(request["command"], "allocate");
            b"{\"allocated_port\": 3100, \"lock_id\": \"abc\"}\n".to_vec()
        });

        let channel = DaemonChannel::new(config_for(socket), recording_cli(&marker, "exit 1"))
            .with_timeouts(fast_timeouts());
        let result = channel.send(&allocate_demo()).await.unwrap();

        let CommandResult::Allocate(alloc) = result else {
            panic!("expected allocate result");
        };
        assert_eq!(alloc.allocated_port, 3100);
        assert_eq!(alloc.service_url, "http://localhost:3100");
        assert_eq!(alloc.lock_id.as_deref(), Some("abc"));
        assert!(!marker.exists(), "CLI fallback must not run");
        assert_eq!(channel.connection_state().await, ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_connection_is_reused() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("daemon.sock");
        let accepts = spawn_daemon(&socket, |_| {
            b"{\"success\": true, \"data\": {\"daemon_running\": true}}\n".to_vec()
        });

        let channel = DaemonChannel::new(
            config_for(socket),
            recording_cli(&dir.path().join("cli-calls"), "exit 1"),
        );
        for _ in 0..3 {
            let result = channel.send(&Command::status(CommandContext::default())).await;
            assert!(result.is_ok());
        }

        assert_eq!(accepts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chunked_response_is_accumulated() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            lines.next_line().await.unwrap();
            for part in [&b"{\"released_ports\": [30"[..], b"01, 3002]", b"}\n"] {
                writer.write_all(part).await.unwrap();
                writer.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            // Keep the connection open until the client is done
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let channel = DaemonChannel::new(
            config_for(socket),
            recording_cli(&dir.path().join("cli-calls"), "exit 1"),
        );
        let result = channel
            .send_via_socket(&Command::cleanup(CommandContext::default(), true, None))
            .await
            .unwrap();

        let CommandResult::Cleanup(cleanup) = result else {
            panic!("expected cleanup result");
        };
        assert_eq!(cleanup.released_ports, vec![3001, 3002]);
    }

    #[tokio::test]
    async fn test_unreachable_daemon_falls_back_once() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("cli-calls");
        let channel = DaemonChannel::new(
            config_for(dir.path().join("missing.sock")),
            recording_cli(&marker, "echo 'Port: 3042'"),
        );

        let socket_error = channel.send_via_socket(&allocate_demo()).await.unwrap_err();
        assert!(matches!(socket_error, ChannelError::ConnectionFailed { .. }));
        assert!(socket_error.to_string().contains("styxy daemon start"));

        let result = channel.send(&allocate_demo()).await.unwrap();
        assert_eq!(result.kind(), crate::command::CommandType::Allocate);

        let calls = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(calls.lines().count(), 1);
        assert!(calls.starts_with("allocate --service-type web --project demo"));
    }

    #[tokio::test]
    async fn test_malformed_response_hits_call_timeout() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("daemon.sock");
        spawn_daemon(&socket, |_| b"\x00\x7f garbage {{{".to_vec());

        let channel = DaemonChannel::new(
            config_for(socket),
            recording_cli(&dir.path().join("cli-calls"), "exit 1"),
        )
        .with_timeouts(fast_timeouts());

        let err = channel
            .send_via_socket(&Command::status(CommandContext::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::CallTimeout(_)));
        assert_eq!(channel.connection_state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_closed_connection_is_replaced() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("daemon.sock");
        let accepts = spawn_daemon(&socket, |_| b"{\"lines\": [\"started\"]}\n".to_vec());

        let channel = DaemonChannel::new(
            config_for(socket),
            recording_cli(&dir.path().join("cli-calls"), "exit 1"),
        );
        let logs = Command::logs(CommandContext::default(), Some(5));
        channel.send_via_socket(&logs).await.unwrap();

        // Simulate a failed call
        {
            let mut slot = channel.connection.lock().await;
            slot.as_mut().unwrap().state = ConnectionState::Closed;
        }
        channel.send_via_socket(&logs).await.unwrap();

        assert_eq!(accepts.load(Ordering::SeqCst), 2);
        assert_eq!(channel.connection_state().await, ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_peer_hangup_falls_back() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let marker = dir.path().join("cli-calls");
        let channel = DaemonChannel::new(
            config_for(socket),
            recording_cli(&marker, "echo 'Released port 3005'"),
        );
        let result = channel
            .send(&Command::cleanup(CommandContext::default(), false, Some(3005)))
            .await
            .unwrap();

        let CommandResult::Cleanup(cleanup) = result else {
            panic!("expected cleanup result");
        };
        assert_eq!(cleanup.released_ports, vec![3005]);
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_shape_mismatch_falls_back() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("daemon.sock");
        spawn_daemon(&socket, |_| b"{\"unexpected\": true}\n".to_vec());

        let marker = dir.path().join("cli-calls");
        let channel =
            DaemonChannel::new(config_for(socket), recording_cli(&marker, "echo 'Port: 3300'"));
        let result = channel.send(&allocate_demo()).await.unwrap();

        let CommandResult::Allocate(alloc) = result else {
            panic!("expected allocate result");
        };
        assert_eq!(alloc.allocated_port, 3300);
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_rejected_status_falls_back_to_cli() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("daemon.sock");
        spawn_daemon(&socket, |_| {
            serde_json::to_vec(&json!({"success": false, "error": "internal"})).unwrap()
        });

        let marker = dir.path().join("cli-calls");
        let channel = DaemonChannel::new(
            config_for(socket),
            recording_cli(
                &marker,
                r#"[ "$2" = "--json" ] && echo '{"daemon_running": true, "pid": 9}' || exit 1"#,
            ),
        );
        let result = channel.send(&Command::status(CommandContext::default())).await.unwrap();

        let CommandResult::Status(status) = result else {
            panic!("expected status result");
        };
        assert!(status.daemon_running);
        assert_eq!(status.pid, Some(9));
        let calls = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["status --json"]);
    }

    #[tokio::test]
    async fn test_rejected_allocate_is_issued_once_through_cli() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("daemon.sock");
        spawn_daemon(&socket, |_| {
            serde_json::to_vec(&json!({"success": false, "error": "range exhausted"})).unwrap()
        });

        let marker = dir.path().join("cli-calls");
        let channel =
            DaemonChannel::new(config_for(socket), recording_cli(&marker, "echo 'Port: 3400'"));
        let result = channel.send(&allocate_demo()).await.unwrap();

        let CommandResult::Allocate(alloc) = result else {
            panic!("expected allocate result");
        };
        assert_eq!(alloc.allocated_port, 3400);
        assert_eq!(std::fs::read_to_string(&marker).unwrap().lines().count(), 1);
    }

    fn never_connects(_path: PathBuf) -> ConnectFuture {
        Box::pin(std::future::pending::<io::Result<UnixStream>>())
    }

    #[tokio::test]
    async fn test_connect_timeout_leaves_no_connection() {
        let dir = TempDir::new().unwrap();
        let channel = DaemonChannel::new(
            config_for(dir.path().join("daemon.sock")),
            recording_cli(&dir.path().join("cli-calls"), "exit 1"),
        )
        .with_timeouts(fast_timeouts())
        .with_connector(never_connects);

        let err = channel
            .send_via_socket(&Command::status(CommandContext::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::ConnectionTimeout(_)));
        assert_eq!(channel.connection_state().await, ConnectionState::Unopened);
    }

    #[tokio::test]
    async fn test_connect_timeout_falls_back_once() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("cli-calls");
        let channel = DaemonChannel::new(
            config_for(dir.path().join("daemon.sock")),
            recording_cli(&marker, "echo 'Port: 3050'"),
        )
        .with_timeouts(ChannelTimeouts {
            connect: Duration::from_millis(100),
            call: Duration::from_secs(5),
        })
        .with_connector(never_connects);

        let started = std::time::Instant::now();
        let result = channel.send(&allocate_demo()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));

        let CommandResult::Allocate(alloc) = result else {
            panic!("expected allocate result");
        };
        assert_eq!(alloc.allocated_port, 3050);
        assert_eq!(std::fs::read_to_string(&marker).unwrap().lines().count(), 1);
        assert_eq!(channel.connection_state().await, ConnectionState::Unopened);
    }

    #[test]
    fn test_envelope_unwrapping() {
        assert_eq!(
            unwrap_envelope(json!({"success": true, "data": {"port": 1}})).unwrap(),
            json!({"port": 1})
        );
        assert_eq!(
            unwrap_envelope(json!({"success": true, "port": 1})).unwrap(),
            json!({"port": 1})
        );
        assert_eq!(unwrap_envelope(json!({"port": 1})).unwrap(), json!({"port": 1}));
        assert!(matches!(
            unwrap_envelope(json!({"success": false, "message": "nope"})),
            Err(ChannelError::Rejected(m)) if m == "nope"
        ));
    }
}

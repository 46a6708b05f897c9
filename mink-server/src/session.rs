//! One connection's lifecycle
//!
//! A [`Session`] owns a single accepted connection and walks it through a
//! fixed state machine:
//!
//! ```text
//! Connecting → Handshaking → Reading → Processing → Writing
//!                               ↑                      │
//!                               └──────────────────────┘
//! ```
//!
//! and `Closed` from any state. Every step runs sequentially inside the
//! session's own task, so there is never more than one outstanding read or
//! write, and the next read is only issued after the reply has been written.
//!
//! What happens to each inbound frame:
//!
//! - text: validated, dispatched, answered with exactly one reply
//! - close (or the peer vanishing): the session ends quietly
//! - anything else (binary, ping, pong): the session sends a close frame with
//!   status 1000 and ends
//!
//! Malformed or invalid text never ends the session; it is answered with an
//! error envelope and the session keeps reading. Transport failures end the
//! session and are reported through [`crate::diagnostics`].
//!
//! Sessions are generic over the byte stream so they can run on anything that
//! is `AsyncRead + AsyncWrite`, which is how the tests drive them in-process.

use crate::config::SessionConfig;
use crate::diagnostics::{self, Failure};
use crate::dispatch::{self, Dispatcher};
use crate::metrics::ServerMetrics;
use futures::{SinkExt, StreamExt};
use mink_core::{codec, envelope, EnvelopeError, Response};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response as UpgradeResponse,
};
use tokio_tungstenite::tungstenite::http::{header::SERVER, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_hdr_async_with_config, WebSocketStream};
use tracing::Instrument;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Accepted, nothing done yet
    Connecting,
    /// WebSocket upgrade in progress
    Handshaking,
    /// Waiting for the next message
    Reading,
    /// Validating and dispatching a message
    Processing,
    /// Sending the reply
    Writing,
    /// Finished; nothing else happens on this session
    Closed,
}

impl SessionState {
    /// Lowercase name, as used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Handshaking => "handshaking",
            SessionState::Reading => "reading",
            SessionState::Processing => "processing",
            SessionState::Writing => "writing",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The peer closed the connection
    Peer,
    /// The peer sent a non-text frame and was sent a normal close
    NonText,
    /// The WebSocket upgrade failed or timed out
    Handshake,
    /// Reading failed
    Read,
    /// Nothing arrived within the idle timeout
    IdleTimeout,
    /// Writing a reply failed
    Write,
}

impl CloseReason {
    /// Snake-case name, as used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Peer => "peer",
            CloseReason::NonText => "non_text",
            CloseReason::Handshake => "handshake",
            CloseReason::Read => "read",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::Write => "write",
        }
    }
}

/// Transport failure that ends a session
#[derive(Debug, Error)]
enum SessionError {
    #[error("WebSocket upgrade failed: {0}")]
    Handshake(#[source] WsError),

    #[error("WebSocket upgrade did not finish within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("{0}")]
    Read(#[source] WsError),

    #[error("no message received within {0:?}")]
    IdleTimeout(Duration),

    #[error("failed to encode reply: {0}")]
    Encode(#[source] mink_core::Error),

    #[error("{0}")]
    Write(#[source] WsError),
}

impl SessionError {
    fn failure(&self) -> Failure {
        match self {
            SessionError::Handshake(_) | SessionError::HandshakeTimeout(_) => Failure::Handshake,
            SessionError::Read(_) | SessionError::IdleTimeout(_) => Failure::Read,
            SessionError::Encode(_) | SessionError::Write(_) => Failure::Write,
        }
    }

    fn close_reason(&self) -> CloseReason {
        match self {
            SessionError::Handshake(_) | SessionError::HandshakeTimeout(_) => CloseReason::Handshake,
            SessionError::Read(_) => CloseReason::Read,
            SessionError::IdleTimeout(_) => CloseReason::IdleTimeout,
            SessionError::Encode(_) | SessionError::Write(_) => CloseReason::Write,
        }
    }
}

/// A single connection and its state machine
///
/// ```rust,no_run
/// use mink_server::{PlaceholderDispatcher, Session, SessionConfig};
/// use std::sync::Arc;
///
/// # async fn example(stream: tokio::net::TcpStream) {
/// let session = Session::new(
///     1,
///     stream,
///     Arc::new(PlaceholderDispatcher),
///     Arc::new(SessionConfig::default()),
/// );
/// let reason = session.run().await;
/// println!("session ended: {}", reason.as_str());
/// # }
/// ```
pub struct Session<S> {
    stream: S,
    driver: Driver,
}

struct Driver {
    id: u64,
    peer: Option<SocketAddr>,
    dispatcher: Arc<dyn Dispatcher>,
    config: Arc<SessionConfig>,
    metrics: Option<Arc<ServerMetrics>>,
    state: SessionState,
    state_log: Option<mpsc::UnboundedSender<SessionState>>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// New session in the `Connecting` state
    pub fn new(
        id: u64,
        stream: S,
        dispatcher: Arc<dyn Dispatcher>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            stream,
            driver: Driver {
                id,
                peer: None,
                dispatcher,
                config,
                metrics: None,
                state: SessionState::Connecting,
                state_log: None,
            },
        }
    }

    /// Remote address, for logs
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.driver.peer = Some(peer);
        self
    }

    /// Record session and message metrics
    pub fn with_metrics(mut self, metrics: Option<Arc<ServerMetrics>>) -> Self {
        self.driver.metrics = metrics;
        self
    }

    /// Send every state the session enters to `log`, starting with `Connecting`
    pub fn with_state_log(mut self, log: mpsc::UnboundedSender<SessionState>) -> Self {
        self.driver.state_log = Some(log);
        self
    }

    /// Session id
    pub fn id(&self) -> u64 {
        self.driver.id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.driver.state
    }

    /// Drive the session until it closes
    pub async fn run(self) -> CloseReason {
        let Session { stream, mut driver } = self;
        let span = tracing::info_span!(
            "session",
            session_id = driver.id,
            peer = ?driver.peer,
        );
        driver.drive(stream).instrument(span).await
    }
}

impl Driver {
    async fn drive<S>(&mut self, stream: S) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.transition(SessionState::Connecting);
        if let Some(m) = &self.metrics {
            m.session_opened();
        }

        let reason = match self.handshake(stream).await {
            Ok(mut ws) => self.serve(&mut ws).await,
            Err(e) => {
                self.fail(&e);
                e.close_reason()
            }
        };

        self.transition(SessionState::Closed);
        if let Some(m) = &self.metrics {
            m.session_closed(reason.as_str());
        }
        tracing::debug!(reason = reason.as_str(), "Session closed");
        reason
    }

    async fn handshake<S>(&mut self, stream: S) -> Result<WebSocketStream<S>, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.transition(SessionState::Handshaking);

        let server = HeaderValue::from_str(&self.config.server_header()).ok();
        let decorate = move |_request: &Request,
                             mut response: UpgradeResponse|
              -> Result<UpgradeResponse, ErrorResponse> {
            if let Some(value) = server {
                response.headers_mut().insert(SERVER, value);
            }
            Ok(response)
        };
        let ws_config = WebSocketConfig {
            max_message_size: self.config.max_message_size,
            ..WebSocketConfig::default()
        };

        let limit = self.config.handshake_timeout;
        match timeout(
            limit,
            accept_hdr_async_with_config(stream, decorate, Some(ws_config)),
        )
        .await
        {
            Ok(Ok(ws)) => {
                tracing::debug!("WebSocket upgrade complete");
                Ok(ws)
            }
            Ok(Err(e)) => Err(SessionError::Handshake(e)),
            Err(_) => Err(SessionError::HandshakeTimeout(limit)),
        }
    }

    async fn serve<S>(&mut self, ws: &mut WebSocketStream<S>) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            self.transition(SessionState::Reading);
            let message = match self.read(ws).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    // Push out the queued close reply, if any.
                    let _ = ws.flush().await;
                    return CloseReason::Peer;
                }
                Err(e) => {
                    self.fail(&e);
                    return e.close_reason();
                }
            };
            let started = Instant::now();

            self.transition(SessionState::Processing);
            // The frame's text is the receive buffer; it is consumed per message.
            let raw = match message {
                Message::Text(text) => text,
                other => {
                    tracing::debug!(frame = frame_kind(&other), "Rejecting non-text frame");
                    if let Err(e) = self.reject(ws).await {
                        self.fail(&e);
                    }
                    return CloseReason::NonText;
                }
            };
            let (response, outcome) = self.process(&raw).await;

            self.transition(SessionState::Writing);
            if let Err(e) = self.write(ws, &response).await {
                self.fail(&e);
                return e.close_reason();
            }

            if let Some(m) = &self.metrics {
                m.record_message(outcome, started.elapsed().as_secs_f64());
            }
        }
    }

    /// `Ok(None)` when the peer has closed the connection.
    async fn read<S>(&mut self, ws: &mut WebSocketStream<S>) -> Result<Option<Message>, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let next = match self.config.idle_timeout {
            Some(idle) => timeout(idle, ws.next())
                .await
                .map_err(|_| SessionError::IdleTimeout(idle))?,
            None => ws.next().await,
        };

        match next {
            None | Some(Ok(Message::Close(_))) => Ok(None),
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => Ok(None),
            Some(Err(e)) => Err(SessionError::Read(e)),
            Some(Ok(message)) => Ok(Some(message)),
        }
    }

    async fn process(&self, raw: &str) -> (Response, &'static str) {
        match envelope::parse(raw) {
            Ok(envelope) => {
                tracing::debug!(
                    method = %envelope.method,
                    id = %envelope.reply_id(),
                    "Dispatching request"
                );
                let response = dispatch::respond(self.dispatcher.as_ref(), &envelope).await;
                let outcome = if response.is_success() { "ok" } else { "error" };
                (response, outcome)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected message");
                let outcome = match e {
                    EnvelopeError::Malformed(_) => "malformed",
                    EnvelopeError::Invalid { .. } => "invalid",
                };
                (e.to_response(), outcome)
            }
        }
    }

    async fn write<S>(
        &self,
        ws: &mut WebSocketStream<S>,
        response: &Response,
    ) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let encoded = codec::encode_response(response).map_err(SessionError::Encode)?;
        ws.send(Message::Text(encoded))
            .await
            .map_err(SessionError::Write)
    }

    async fn reject<S>(&mut self, ws: &mut WebSocketStream<S>) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // An auto-reply to a ping may still be queued; it must precede the close.
        match ws.flush().await {
            Ok(()) | Err(WsError::ConnectionClosed) => {}
            Err(e) => return Err(SessionError::Write(e)),
        }
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        match ws.close(Some(frame)).await {
            Ok(()) | Err(WsError::ConnectionClosed) => Ok(()),
            Err(e) => Err(SessionError::Write(e)),
        }
    }

    fn fail(&self, error: &SessionError) {
        diagnostics::report(error.failure(), error, self.metrics.as_deref());
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = %self.state, to = %next, "State transition");
        self.state = next;
        if let Some(log) = &self.state_log {
            let _ = log.send(next);
        }
    }
}

fn frame_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "frame",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::PlaceholderDispatcher;
    use mink_core::{ErrorCode, Id};
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;

    type Client = WebSocketStream<DuplexStream>;

    fn spawn_session(
        config: SessionConfig,
    ) -> (
        DuplexStream,
        JoinHandle<CloseReason>,
        mpsc::UnboundedReceiver<SessionState>,
    ) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(
            7,
            server_io,
            Arc::new(PlaceholderDispatcher),
            Arc::new(config),
        )
        .with_state_log(tx);
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.id(), 7);
        (client_io, tokio::spawn(session.run()), rx)
    }

    async fn connect(client_io: DuplexStream) -> Client {
        let (client, response) = tokio_tungstenite::client_async("ws://localhost/", client_io)
            .await
            .unwrap();
        let server = response.headers().get("server").unwrap().to_str().unwrap();
        assert!(server.starts_with("mink/"));
        assert!(server.ends_with("websocket-server-async"));
        client
    }

    async fn roundtrip(client: &mut Client, text: &str) -> Response {
        client.send(Message::Text(text.to_string())).await.unwrap();
        match client.next().await {
            Some(Ok(Message::Text(reply))) => codec::decode_response(&reply).unwrap(),
            other => panic!("Expected text reply, got {:?}", other),
        }
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<SessionState>) -> Vec<SessionState> {
        let mut states = Vec::new();
        while let Ok(state) = rx.try_recv() {
            states.push(state);
        }
        states
    }

    #[tokio::test]
    async fn test_states_follow_read_process_write() {
        use SessionState::*;

        let (client_io, handle, rx) = spawn_session(SessionConfig::default());
        let mut client = connect(client_io).await;

        let reply = roundtrip(&mut client, "not json").await;
        assert_eq!(reply.error_code(), Some(ErrorCode::PARSE_ERROR));

        let reply = roundtrip(&mut client, r#"{"method":"ping","id":1}"#).await;
        assert_eq!(reply.error_code(), Some(ErrorCode::NOT_DISPATCHED));
        assert_eq!(reply.id, Id::from(1i64));

        client.close(None).await.unwrap();
        assert_eq!(handle.await.unwrap(), CloseReason::Peer);

        assert_eq!(
            drain(rx),
            vec![
                Connecting,
                Handshaking,
                Reading,
                Processing,
                Writing,
                Reading,
                Processing,
                Writing,
                Reading,
                Closed,
            ]
        );
    }

    #[tokio::test]
    async fn test_each_message_is_validated_alone() {
        let (client_io, handle, _rx) = spawn_session(SessionConfig::default());
        let mut client = connect(client_io).await;

        let long_id = "x".repeat(4096);
        let request = format!(r#"{{"method":"first","id":"{}"}}"#, long_id);
        let reply = roundtrip(&mut client, &request).await;
        assert_eq!(reply.id, Id::from(long_id.as_str()));

        // A leftover prefix would make this parse
        let reply = roundtrip(&mut client, "}").await;
        assert_eq!(reply.error_code(), Some(ErrorCode::PARSE_ERROR));
        assert_eq!(reply.id, Id::Null);

        let reply = roundtrip(&mut client, r#"{"method":"second","id":2}"#).await;
        assert_eq!(reply.error_code(), Some(ErrorCode::NOT_DISPATCHED));
        assert_eq!(reply.id, Id::from(2i64));

        client.close(None).await.unwrap();
        assert_eq!(handle.await.unwrap(), CloseReason::Peer);
    }

    #[tokio::test]
    async fn test_binary_frame_closes_normally() {
        let (client_io, handle, rx) = spawn_session(SessionConfig::default());
        let mut client = connect(client_io).await;

        client.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
        match client.next().await {
            Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("Expected close frame, got {:?}", other),
        }

        assert_eq!(handle.await.unwrap(), CloseReason::NonText);
        let states = drain(rx);
        assert_eq!(
            &states[states.len() - 2..],
            &[SessionState::Processing, SessionState::Closed]
        );
        assert!(!states.contains(&SessionState::Writing));
    }

    /// Everything the server puts on the wire until the stream ends.
    async fn frames_until_end(client: &mut Client) -> Vec<Message> {
        let mut frames = Vec::new();
        loop {
            match client.next().await {
                Some(Ok(message)) => frames.push(message),
                Some(Err(WsError::Protocol(e))) => {
                    panic!("protocol error after {:?}: {}", frames, e)
                }
                Some(Err(_)) | None => return frames,
            }
        }
    }

    fn assert_ends_with_normal_close(frames: &[Message]) {
        match frames.last() {
            Some(Message::Close(Some(frame))) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("Expected close frame last, got {:?}", other),
        }
        let closes = frames
            .iter()
            .filter(|m| matches!(m, Message::Close(_)))
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn test_ping_frame_is_rejected() {
        let (client_io, handle, _rx) = spawn_session(SessionConfig::default());
        let mut client = connect(client_io).await;

        client.send(Message::Ping(vec![1])).await.unwrap();
        let frames = frames_until_end(&mut client).await;

        assert_ends_with_normal_close(&frames);
        assert_eq!(frames.len(), 2, "unexpected frames {:?}", frames);
        assert_eq!(frames[0], Message::Pong(vec![1]));
        assert_eq!(handle.await.unwrap(), CloseReason::NonText);
    }

    #[tokio::test]
    async fn test_unsolicited_pong_is_rejected() {
        let (client_io, handle, _rx) = spawn_session(SessionConfig::default());
        let mut client = connect(client_io).await;

        client.send(Message::Pong(vec![2])).await.unwrap();
        let frames = frames_until_end(&mut client).await;

        assert_eq!(frames.len(), 1, "unexpected frames {:?}", frames);
        assert_ends_with_normal_close(&frames);
        assert_eq!(handle.await.unwrap(), CloseReason::NonText);
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_session() {
        let config = SessionConfig {
            idle_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let (client_io, handle, _rx) = spawn_session(config);
        let _client = connect(client_io).await;

        assert_eq!(handle.await.unwrap(), CloseReason::IdleTimeout);
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let config = SessionConfig {
            handshake_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let (_client_io, handle, rx) = spawn_session(config);

        assert_eq!(handle.await.unwrap(), CloseReason::Handshake);
        assert_eq!(
            drain(rx),
            vec![
                SessionState::Connecting,
                SessionState::Handshaking,
                SessionState::Closed
            ]
        );
    }

    #[tokio::test]
    async fn test_garbage_upgrade_request() {
        let (mut client_io, handle, _rx) = spawn_session(SessionConfig::default());
        client_io
            .write_all(b"hello there\r\n\r\n")
            .await
            .unwrap();

        assert_eq!(handle.await.unwrap(), CloseReason::Handshake);
    }

    #[tokio::test]
    async fn test_peer_vanishing_is_a_quiet_close() {
        let (client_io, handle, _rx) = spawn_session(SessionConfig::default());
        let client = connect(client_io).await;
        drop(client);

        let reason = handle.await.unwrap();
        assert!(
            matches!(reason, CloseReason::Peer | CloseReason::Read),
            "unexpected reason {:?}",
            reason
        );
    }

    #[test]
    fn test_names() {
        assert_eq!(SessionState::Processing.to_string(), "processing");
        assert_eq!(CloseReason::IdleTimeout.as_str(), "idle_timeout");
    }
}

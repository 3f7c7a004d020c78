//! WebSocket and HTTP surface for the arena service
//!
//! The transport owns everything socket-shaped: accepting upgrades, assigning
//! connection identities, pumping decoded text frames into the lifecycle
//! controller, and draining its outbound events back onto the wire. The core
//! never sees a socket; it sees a [`ClientConnection`] handle.
//!
//! The same listener also serves the health and metrics endpoints, and
//! answers 200 "OK" on every other path for liveness probes.

use crate::connection::handle::{ClientConnection, ConnectionId, SharedConnection};
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::session::controller::{ClientEventHandler, SessionController};
use crate::types::ServerEvent;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use prometheus::TextEncoder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct TransportContext {
    handler: Arc<dyn ClientEventHandler>,
    controller: SessionController,
    metrics: Arc<MetricsCollector>,
    service_name: String,
    started_at: DateTime<Utc>,
}

impl TransportContext {
    pub fn new(
        controller: SessionController,
        metrics: Arc<MetricsCollector>,
        service_name: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            handler: Arc::new(controller.clone()),
            controller,
            metrics,
            service_name,
            started_at,
        }
    }
}

/// Frames queued for delivery to one socket
enum OutboundFrame {
    Event(ServerEvent),
    Close { code: u16, reason: String },
}

/// Connection handle backed by a per-socket outbound channel.
///
/// `send` and `close` only enqueue; the socket's writer task drains the
/// queue, so the core never waits on a peer.
struct WsConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    open: AtomicBool,
}

impl WsConnection {
    fn new(outbound: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self {
            id: ConnectionId::new(),
            outbound,
            open: AtomicBool::new(true),
        }
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl ClientConnection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, event: ServerEvent) {
        if !self.is_open() {
            return;
        }
        if self.outbound.send(OutboundFrame::Event(event)).is_err() {
            debug!("Outbound queue gone for connection {}", self.id);
        }
    }

    fn close(&self, code: u16, reason: &str) {
        self.mark_closed();
        let _ = self.outbound.send(OutboundFrame::Close {
            code,
            reason: reason.to_string(),
        });
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }
}

/// Build the service router
pub fn router(context: TransportContext) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(ok_handler)
        .with_state(context)
}

/// Serve the router until the shutdown signal flips
pub async fn serve(
    listener: TcpListener,
    context: TransportContext,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app = router(context);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(context): State<TransportContext>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(socket, context))
}

/// Pump one client socket until either side goes away.
///
/// The socket splits into a writer task draining the outbound queue and a
/// reader task feeding the controller; when either stops, the other is
/// aborted and teardown runs exactly once.
async fn client_session(socket: WebSocket, context: TransportContext) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let connection = Arc::new(WsConnection::new(outbound_tx));
    let shared: SharedConnection = connection.clone();
    let connection_id = connection.id();

    if let Err(e) = context.handler.handle_connect(shared.clone()).await {
        warn!("Connect handling failed for {}: {}", connection_id, e);
        return;
    }

    let (ws_tx, ws_rx) = socket.split();
    let mut send_task = tokio::spawn(write_outbound(ws_tx, outbound_rx, connection_id));
    let reader_handler = context.handler.clone();
    let mut recv_task = tokio::spawn(read_inbound(ws_rx, shared, reader_handler));

    let errored = tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            false
        }
        result = &mut recv_task => {
            send_task.abort();
            result.unwrap_or(false)
        }
    };

    connection.mark_closed();

    let teardown = if errored {
        context.handler.handle_error(connection_id).await
    } else {
        context.handler.handle_disconnect(connection_id).await
    };
    if let Err(e) = teardown {
        warn!("Teardown failed for {}: {}", connection_id, e);
    }

    debug!("Client session ended for {}", connection_id);
}

/// Drain the outbound queue onto the wire; a queued close frame ends the task
async fn write_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
    connection_id: ConnectionId,
) {
    while let Some(frame) = outbound_rx.recv().await {
        match frame {
            OutboundFrame::Event(event) => match serde_json::to_string(&event) {
                Ok(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to serialize event for {}: {}", connection_id, e),
            },
            OutboundFrame::Close { code, reason } => {
                let _ = ws_tx
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            }
        }
    }
}

/// Feed inbound frames to the controller; returns true when the socket errored
async fn read_inbound(
    mut ws_rx: SplitStream<WebSocket>,
    shared: SharedConnection,
    handler: Arc<dyn ClientEventHandler>,
) -> bool {
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Err(e) = handler.handle_message(&shared, text.as_str()).await {
                    warn!("Message handling failed for {}: {}", shared.id(), e);
                }
            }
            Ok(Message::Binary(bytes)) => {
                // Binary frames are decoded as text the same way the JSON
                // layer would see them; garbage yields the usual
                // invalid-input notice.
                let text = String::from_utf8_lossy(&bytes).into_owned();
                if let Err(e) = handler.handle_message(&shared, &text).await {
                    warn!("Message handling failed for {}: {}", shared.id(), e);
                }
            }
            Ok(Message::Close(_)) => return false,
            Ok(_) => {} // ping/pong handled at the protocol layer
            Err(e) => {
                debug!("Socket error on {}: {}", shared.id(), e);
                return true;
            }
        }
    }
    false
}

async fn health_handler(State(context): State<TransportContext>) -> impl IntoResponse {
    let health = HealthCheck::evaluate(
        &context.controller,
        &context.service_name,
        context.started_at,
    );

    let status_code = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn metrics_handler(State(context): State<TransportContext>) -> impl IntoResponse {
    let families = context.metrics.registry().gather();
    match TextEncoder::new().encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Plain 200 responder for liveness probes on any other path
async fn ok_handler() -> &'static str {
    "OK"
}

/// Bind the configured listener, logging the bound address
pub async fn bind(addr: std::net::SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server is running on ws://{}/ws", addr);
    Ok(listener)
}

//! Per-connection streaming loop.
//!
//! One task per WebSocket connection, processing inbound messages strictly
//! in arrival order: receive, decode, detect, compute, annotate, send.
//! One message at a time, never two concurrently on the same connection.
//! Session state is task-local, so connections cannot interfere with each
//! other's calibration.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use facerange_core::codec::data_uri::decode_data_uri;
use facerange_core::detection::domain::face_detector::FaceDetector;
use facerange_core::measure::session::Session;
use facerange_core::measure::MeasureConfig;

use crate::gate::FrameGate;
use crate::protocol::{self, ClientMessage, Inbound, ServerMessage};

/// Process-wide context shared by all connections.
///
/// The detection model is expensive to load, so it is loaded once at
/// startup and shared; the mutex serializes only the inference call.
/// Everything session-scoped (mode, focal length, frame gate) lives in the
/// connection task instead.
pub struct ServerContext {
    pub detector: Mutex<Box<dyn FaceDetector>>,
    pub config: MeasureConfig,
    pub frame_interval: Duration,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerContext>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<ServerContext>) {
    log::info!("client connected");
    let mut session = Session::new(state.config);
    let mut gate = FrameGate::new(state.frame_interval);
    let (mut sender, mut receiver) = socket.split();

    while let Some(result) = receiver.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("websocket error: {e}");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let parsed: ClientMessage = match serde_json::from_str(&text) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        // Unreadable inbound traffic is a transport fault,
                        // not a per-frame error: end the session
                        log::warn!("malformed inbound message: {e}");
                        break;
                    }
                };

                let reply = match protocol::classify(&parsed) {
                    Inbound::Command(command) => {
                        session.handle_command(command);
                        Some(ServerMessage::ack(protocol::ack_message(
                            command,
                            &state.config,
                        )))
                    }
                    Inbound::Capture(image) => {
                        Some(process_image(image, &mut session, &state).await)
                    }
                    Inbound::Frame(image) => {
                        if gate.admit() {
                            Some(process_image(image, &mut session, &state).await)
                        } else {
                            // Dropped: not queued, not acknowledged
                            None
                        }
                    }
                    Inbound::Ignored => None,
                };

                if let Some(reply) = reply {
                    let json = match serde_json::to_string(&reply) {
                        Ok(json) => json,
                        Err(e) => {
                            log::error!("failed to serialize response: {e}");
                            break;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => {
                log::info!("client disconnected");
                break;
            }
            _ => {}
        }
    }
    // Session, gate and socket drop here; nothing survives the connection
}

/// Run one frame through the session. Every failure is contained to this
/// message's response; only transport faults may end the loop.
async fn process_image(
    payload: &str,
    session: &mut Session,
    state: &ServerContext,
) -> ServerMessage {
    let frame = match decode_data_uri(payload) {
        Ok(frame) => frame,
        Err(e) => {
            log::debug!("frame decode failed: {e}");
            return ServerMessage::error("Invalid image");
        }
    };

    let mut detector = state.detector.lock().await;
    match session.process_frame(&frame, detector.as_mut()) {
        Ok(outcome) => ServerMessage::from_outcome(outcome),
        Err(e) => {
            log::error!("frame processing failed: {e}");
            ServerMessage::error(e.to_string())
        }
    }
}

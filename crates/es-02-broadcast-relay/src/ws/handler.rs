//! Per-connection WebSocket handling.
//!
//! A connection runs two halves:
//!
//! - the writer task drains the connection's [`SinkReceiver`] into the socket,
//!   each send bounded by `send_timeout`;
//! - the reader loop logs inbound frames and ends the connection on close,
//!   transport error, oversized or malformed input.
//!
//! Whichever half finishes first ends the other, and the connection is
//! unregistered on the way out.

use crate::domain::{ConnectionId, Envelope, RelayConfig};
use crate::registry::{ChannelSink, ConnectionRegistry, Frame, FrameSink, SinkReceiver};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What to do after an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Continue,
    /// The viewer closed the connection.
    Closed,
    /// End the connection, with the reason.
    Drop(String),
}

/// Serve one upgraded socket until it closes.
pub async fn handle_socket(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    config: Arc<RelayConfig>,
) {
    let (sender, mut receiver) = socket.split();
    let (sink, outbound) = ChannelSink::channel(config.channel_capacity);

    // Queued before registration so it precedes any broadcast frame.
    match Envelope::welcome(config.server_name.as_str()).to_json() {
        Ok(welcome) => {
            let _ = sink.try_send(Frame::from(welcome));
        }
        Err(e) => warn!(error = %e, "Failed to encode welcome frame"),
    }

    let id = registry.register(Arc::new(sink));
    let mut writer = tokio::spawn(write_frames(id, sender, outbound, config.send_timeout));

    loop {
        tokio::select! {
            next = receiver.next() => {
                let message = match next {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "Viewer transport error");
                        break;
                    }
                    None => break,
                };
                match inspect_inbound(id, &message, config.max_message_size) {
                    Inbound::Continue => {}
                    Inbound::Closed => break,
                    Inbound::Drop(reason) => {
                        warn!(connection_id = %id, reason = %reason, "Dropping viewer connection");
                        break;
                    }
                }
            }
            _ = &mut writer => break,
        }
    }

    registry.unregister(id);
    writer.abort();
}

/// Classify one inbound frame. Valid JSON is logged and otherwise ignored.
pub fn inspect_inbound(id: ConnectionId, message: &Message, max_message_size: usize) -> Inbound {
    let text = match message {
        Message::Text(text) => text.as_str(),
        Message::Binary(data) => match std::str::from_utf8(data) {
            Ok(text) => text,
            Err(_) => return Inbound::Drop("binary frame is not UTF-8".into()),
        },
        Message::Close(_) => return Inbound::Closed,
        Message::Ping(_) | Message::Pong(_) => return Inbound::Continue,
    };

    if text.len() > max_message_size {
        return Inbound::Drop(format!(
            "frame of {} bytes exceeds {}",
            text.len(),
            max_message_size
        ));
    }

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            info!(connection_id = %id, message = %value, "Received viewer message");
            Inbound::Continue
        }
        Err(e) => Inbound::Drop(format!("malformed frame: {e}")),
    }
}

async fn write_frames(
    id: ConnectionId,
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: SinkReceiver,
    send_timeout: Duration,
) {
    loop {
        let (message, last) = tokio::select! {
            biased;
            _ = &mut outbound.closed => (Message::Close(None), true),
            frame = outbound.frames.recv() => match frame {
                Some(frame) => (Message::Text(frame.to_string()), false),
                None => (Message::Close(None), true),
            },
        };

        match tokio::time::timeout(send_timeout, sender.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection_id = %id, error = %e, "Send to viewer failed");
                break;
            }
            Err(_) => {
                warn!(connection_id = %id, timeout = ?send_timeout, "Send to viewer timed out");
                break;
            }
        }
        if last {
            break;
        }
    }
    debug!(connection_id = %id, "Viewer writer stopped");
}

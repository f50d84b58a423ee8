//! Fan-out of moments and media chunks.

use crate::domain::Envelope;
use crate::error::{RelayError, SendFailure};
use crate::registry::{ConnectionRegistry, Frame};
use shared_types::{MediaChunk, SignificantMoment};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Connections the frame was handed to.
    pub delivered: usize,
    /// Connections whose queue was full; they miss this frame.
    pub skipped: usize,
    /// Connections found closed and unregistered.
    pub dropped: usize,
}

/// Serialises frames once and hands them to every open connection.
pub struct BroadcastRelay {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastRelay {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn relay_moment(&self, moment: &SignificantMoment) -> Result<RelayReport, RelayError> {
        self.broadcast(&Envelope::moment(moment))
    }

    pub fn relay_chunk(&self, chunk: &MediaChunk) -> Result<RelayReport, RelayError> {
        self.broadcast(&Envelope::chunk(chunk))
    }

    pub fn broadcast(&self, envelope: &Envelope) -> Result<RelayReport, RelayError> {
        let frame: Frame = Arc::from(envelope.to_json()?);
        let report = self.fan_out(frame);
        debug!(
            kind = envelope.kind(),
            delivered = report.delivered,
            skipped = report.skipped,
            dropped = report.dropped,
            "Broadcast frame"
        );
        Ok(report)
    }

    /// Send one frame to a snapshot of the registry.
    ///
    /// A failure on one connection never stops delivery to the others.
    fn fan_out(&self, frame: Frame) -> RelayReport {
        let mut report = RelayReport::default();
        let snapshot = self.registry.active_connections();

        for (id, sink) in snapshot.iter() {
            if !sink.is_open() {
                self.registry.unregister(*id);
                report.dropped += 1;
                continue;
            }
            match sink.try_send(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(SendFailure::Full) => {
                    debug!(connection_id = %id, "Viewer lagging, frame skipped");
                    report.skipped += 1;
                }
                Err(SendFailure::Closed) => {
                    warn!(connection_id = %id, "Send to viewer failed, dropping connection");
                    self.registry.unregister(*id);
                    report.dropped += 1;
                }
            }
        }
        report
    }
}

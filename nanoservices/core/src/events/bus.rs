use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use etlflow_utils::EtlResult;
use crate::events::sink::LineageSink;
use crate::events::types::LineageEvent;

/// Channel-based event bus exposing lineage as a structured event stream.
pub struct EventBus {
    sender: mpsc::Sender<LineageEvent>,
    receiver: mpsc::Receiver<LineageEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self { sender, receiver }
    }

    /// A sink handle that can be cloned and attached to engines.
    pub fn sink(&self) -> ChannelSink {
        ChannelSink { sender: self.sender.clone() }
    }

    /// Receive the next event. Returns None when all sinks are dropped.
    pub async fn recv(&mut self) -> Option<LineageEvent> {
        self.receiver.recv().await
    }

    /// Split into a sink and the receiving end (consumes self).
    pub fn split(self) -> (ChannelSink, mpsc::Receiver<LineageEvent>) {
        (ChannelSink { sender: self.sender }, self.receiver)
    }
}

/// Publishes events onto a bounded channel without waiting. Events that do
/// not fit are dropped with a warning.
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<LineageEvent>,
}

#[async_trait]
impl LineageSink for ChannelSink {
    async fn emit(&self, event: &LineageEvent) -> EtlResult<()> {
        match self.sender.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    execution = %dropped.execution_id(),
                    event = dropped.kind(),
                    "lineage channel full, event dropped"
                );
            }
            Err(TrySendError::Closed(dropped)) => {
                tracing::warn!(
                    execution = %dropped.execution_id(),
                    event = dropped.kind(),
                    "lineage channel closed, event dropped"
                );
            }
        }
        Ok(())
    }
}

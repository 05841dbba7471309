use async_trait::async_trait;
use std::sync::Arc;

use etlflow_utils::EtlResult;
use crate::events::types::LineageEvent;

/// Receiver of lineage events.
///
/// Delivery is best-effort: the runner logs a failed `emit` and carries on,
/// so an implementation should never hold up a run for long.
#[async_trait]
pub trait LineageSink: Send + Sync {
    async fn emit(&self, event: &LineageEvent) -> EtlResult<()>;
}

/// Forwards every event to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanOut {
    sinks: Vec<Arc<dyn LineageSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Arc<dyn LineageSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl LineageSink for FanOut {
    /// Every sink sees the event even if an earlier one fails; the first
    /// error is returned.
    async fn emit(&self, event: &LineageEvent) -> EtlResult<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::state::Execution;
    use etlflow_utils::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    #[async_trait]
    impl LineageSink for Counting {
        async fn emit(&self, _: &LineageEvent) -> EtlResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl LineageSink for Broken {
        async fn emit(&self, _: &LineageEvent) -> EtlResult<()> {
            Err(Error::Graph("store offline".into()))
        }
    }

    #[tokio::test]
    async fn fan_out_reaches_every_sink() {
        let a = Arc::new(Counting(AtomicUsize::new(0)));
        let b = Arc::new(Counting(AtomicUsize::new(0)));
        let mut fan = FanOut::new();
        fan.push(a.clone());
        fan.push(Arc::new(Broken));
        fan.push(b.clone());

        let event = LineageEvent::ExecutionStarted(Execution::start("people"));
        assert!(fan.emit(&event).await.is_err());
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_fan_out_is_ok() {
        let fan = FanOut::new();
        assert!(fan.is_empty());
        let event = LineageEvent::ExecutionStarted(Execution::start("people"));
        fan.emit(&event).await.unwrap();
    }
}
